use std::collections::BTreeMap;
use std::time::Duration;

/// Transport configuration for agent message requests.
#[derive(Debug, Clone)]
pub struct AgentWireConfig {
    /// API base, e.g. `https://shop.example.com`.
    pub base_url: String,
    /// Language hint sent as `localLanguage`.
    pub local_language: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional whole-request timeout. A stalled stream otherwise never resolves.
    pub timeout: Option<Duration>,
    /// Lifetime handed to session persistence with each new thread token.
    pub thread_token_ttl: Option<Duration>,
}

impl Default for AgentWireConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            local_language: "en".to_string(),
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
            thread_token_ttl: None,
        }
    }
}

impl AgentWireConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_local_language(mut self, local_language: impl Into<String>) -> Self {
        self.local_language = local_language.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_thread_token_ttl(mut self, ttl: Duration) -> Self {
        self.thread_token_ttl = Some(ttl);
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}
