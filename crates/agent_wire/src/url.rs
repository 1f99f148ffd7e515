use crate::error::AgentWireError;

/// Path of the streaming message endpoint relative to the API base.
pub const MESSAGE_PATH: &str = "/api/agent/message";

/// Normalize an API base URL to the streaming message endpoint.
///
/// Trailing slashes are dropped and [`MESSAGE_PATH`] is appended unless the
/// input already points at it.
pub fn normalize_message_url(input: &str) -> Result<String, AgentWireError> {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AgentWireError::InvalidBaseUrl(input.to_owned()));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(AgentWireError::InvalidBaseUrl(input.to_owned()));
    }
    if trimmed.ends_with(MESSAGE_PATH) {
        return Ok(trimmed.to_owned());
    }
    Ok(format!("{trimmed}{MESSAGE_PATH}"))
}
