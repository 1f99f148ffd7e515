//! Environment configuration.

use std::env;
use std::path::PathBuf;

use agent_wire::AgentWireConfig;

pub const API_BASE_VAR: &str = "ASSISTANT_API_BASE";
pub const SESSION_TOKEN_VAR: &str = "ASSISTANT_SESSION_TOKEN";
pub const LANGUAGE_VAR: &str = "ASSISTANT_LANGUAGE";
pub const SESSION_FILE_VAR: &str = "ASSISTANT_SESSION_FILE";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub api_base: String,
    pub session_token: Option<String>,
    pub language: String,
    /// Persist tokens here; in-memory when unset.
    pub session_file: Option<PathBuf>,
}

impl CliConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: env_string_opt(API_BASE_VAR).ok_or(ConfigError::Missing(API_BASE_VAR))?,
            session_token: env_string_opt(SESSION_TOKEN_VAR),
            language: env_string_opt(LANGUAGE_VAR).unwrap_or_else(|| "en".to_string()),
            session_file: env_string_opt(SESSION_FILE_VAR).map(PathBuf::from),
        })
    }

    pub fn wire_config(&self) -> AgentWireConfig {
        AgentWireConfig::new(self.api_base.clone())
            .with_local_language(self.language.clone())
            .with_user_agent(concat!("assistant_cli/", env!("CARGO_PKG_VERSION")))
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    })
}
