use serde::{Deserialize, Serialize};

pub const SESSION_DOCUMENT_VERSION: u32 = 1;

/// On-disk shape of a [`crate::FileSessionStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_token: Option<String>,
    /// RFC3339 instant after which `thread_token` is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_token_expires_at: Option<String>,
}

impl Default for SessionDocument {
    fn default() -> Self {
        Self {
            version: SESSION_DOCUMENT_VERSION,
            session_token: None,
            thread_token: None,
            thread_token_expires_at: None,
        }
    }
}
