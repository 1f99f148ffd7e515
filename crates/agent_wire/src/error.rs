use std::fmt;

use reqwest::StatusCode;
use serde_json::{Error as JsonError, Value};

#[derive(Debug)]
pub enum AgentWireError {
    InvalidBaseUrl(String),
    InvalidHeader(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Serde(JsonError),
    Cancelled,
}

impl AgentWireError {
    /// True when the failure happened before any response byte arrived.
    pub fn is_pre_stream(&self) -> bool {
        matches!(
            self,
            Self::InvalidBaseUrl(_) | Self::InvalidHeader(_) | Self::Status(..)
        )
    }
}

impl fmt::Display for AgentWireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl(value) => write!(f, "invalid base URL: {value:?}"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::Cancelled => write!(f, "request was cancelled"),
        }
    }
}

impl std::error::Error for AgentWireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(error) => Some(error),
            Self::Serde(error) => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AgentWireError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for AgentWireError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Extract a readable message from a non-2xx response body.
///
/// Accepts `{"error":"..."}`, `{"error":{"message":"..."}}`, `{"msg":"..."}`
/// and `{"message":"..."}`; otherwise falls back to the raw body, then to the
/// canonical status reason.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = message_from_json(&value) {
            return message;
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

fn message_from_json(value: &Value) -> Option<String> {
    let candidates = [
        value.get("error").and_then(Value::as_str),
        value
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str),
        value.get("msg").and_then(Value::as_str),
        value.get("message").and_then(Value::as_str),
    ];

    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|message| !message.is_empty())
        .map(ToString::to_string)
}
