use serde::{Deserialize, Serialize};

/// Body of `POST /api/agent/message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessageRequest {
    pub message: String,
    /// Session token issued by the host page.
    pub jwt: String,
    pub local_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_token: Option<String>,
}

impl AgentMessageRequest {
    pub fn new(
        message: impl Into<String>,
        jwt: impl Into<String>,
        local_language: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            jwt: jwt.into(),
            local_language: local_language.into(),
            thread_token: None,
        }
    }

    /// Attach a continuation token. Blank tokens are dropped.
    pub fn with_thread_token(mut self, thread_token: Option<String>) -> Self {
        self.thread_token = thread_token
            .map(|token| token.trim().to_owned())
            .filter(|token| !token.is_empty());
        self
    }
}
