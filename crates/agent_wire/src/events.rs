use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend activity announced by a `phase` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Thinking,
    Validating,
    Regenerating,
}

impl AgentPhase {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "thinking" => Self::Thinking,
            "validating" => Self::Validating,
            "regenerating" => Self::Regenerating,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::Validating => "validating",
            Self::Regenerating => "regenerating",
        }
    }
}

/// Claims-compliance report carried by the terminal `done` record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClaimsValidation {
    pub is_compliant: bool,
    pub violated_claims: Vec<String>,
    pub allowed_claims: Vec<String>,
    pub suggestions: Vec<String>,
    pub compliance_score: f64,
    pub was_regenerated: bool,
    pub original_response: Option<String>,
    pub regenerated_response: Option<String>,
}

impl ClaimsValidation {
    /// Read a report field by field. A field with the wrong type falls back to
    /// its default; only a non-object report is rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let flag = |key: &str| object.get(key).and_then(Value::as_bool).unwrap_or(false);
        let claims = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(ToString::to_string);

        Some(Self {
            is_compliant: flag("isCompliant"),
            violated_claims: claims("violatedClaims"),
            allowed_claims: claims("allowedClaims"),
            suggestions: claims("suggestions"),
            compliance_score: object
                .get("complianceScore")
                .and_then(Value::as_f64)
                .map_or(0.0, |score| score.clamp(0.0, 1.0)),
            was_regenerated: flag("wasRegenerated"),
            original_response: text("originalResponse"),
            regenerated_response: text("regeneratedResponse"),
        })
    }
}

/// Structured side content for the finished answer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendData {
    /// Raw product payloads; normalization happens downstream.
    pub products: Vec<Value>,
}

impl FrontendData {
    /// A missing or non-array `products` reads as empty.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            products: object
                .get("products")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        })
    }
}

/// One decoded record of the message stream.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    Phase {
        phase: AgentPhase,
        msg: Option<String>,
    },
    AssistantOutputStart,
    Delta {
        delta: String,
    },
    /// Tool output forwarded by the backend.
    Item {
        name: Option<String>,
        item: Value,
    },
    AssistantOutputEnd,
    SessionState {
        thread_token: Option<String>,
    },
    Done {
        claims_validation: Option<ClaimsValidation>,
        frontend_data: Option<FrontendData>,
        thread_token: Option<String>,
    },
    Error {
        msg: Option<String>,
    },
    /// Record with a `type` this client does not understand.
    Unknown {
        event_type: String,
    },
}

impl WireEvent {
    /// Map one parsed JSON record. Records without a string `type` yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        let event_type = value.get("type")?.as_str()?;

        let event = match event_type {
            "phase" => {
                let Some(phase) = string_field(&value, "phase")
                    .as_deref()
                    .and_then(AgentPhase::parse)
                else {
                    return Some(Self::Unknown {
                        event_type: event_type.to_owned(),
                    });
                };
                Self::Phase {
                    phase,
                    msg: string_field(&value, "msg"),
                }
            }
            "assistant_output_start" => Self::AssistantOutputStart,
            "delta" => Self::Delta {
                delta: string_field(&value, "delta").unwrap_or_default(),
            },
            "item" => Self::Item {
                name: string_field(&value, "name"),
                item: value.get("item").cloned().unwrap_or(Value::Null),
            },
            "assistant_output_end" => Self::AssistantOutputEnd,
            "session_state" => Self::SessionState {
                thread_token: string_field(&value, "threadToken"),
            },
            "done" => Self::Done {
                claims_validation: value
                    .get("claimsValidation")
                    .and_then(ClaimsValidation::from_value),
                frontend_data: value.get("frontendData").and_then(FrontendData::from_value),
                thread_token: string_field(&value, "threadToken"),
            },
            "error" => Self::Error {
                msg: string_field(&value, "msg").or_else(|| string_field(&value, "message")),
            },
            other => Self::Unknown {
                event_type: other.to_owned(),
            },
        };

        Some(event)
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::Phase { .. } => "phase",
            Self::AssistantOutputStart => "assistant_output_start",
            Self::Delta { .. } => "delta",
            Self::Item { .. } => "item",
            Self::AssistantOutputEnd => "assistant_output_end",
            Self::SessionState { .. } => "session_state",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::Unknown { event_type } => event_type,
        }
    }

    /// Continuation token carried by this record, if any.
    pub fn thread_token(&self) -> Option<&str> {
        match self {
            Self::SessionState { thread_token } | Self::Done { thread_token, .. } => {
                thread_token.as_deref()
            }
            _ => None,
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
