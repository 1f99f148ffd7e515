use std::collections::BTreeMap;

use crate::config::AgentWireConfig;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_USER_AGENT: &str = "user-agent";

pub const NDJSON_MEDIA_TYPE: &str = "application/x-ndjson";

/// Build a deterministic header map for message requests.
///
/// Extra headers are applied last and win over the defaults.
pub fn build_headers(config: &AgentWireConfig) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );
    headers.insert(HEADER_ACCEPT.to_owned(), NDJSON_MEDIA_TYPE.to_owned());

    if let Some(user_agent) = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        headers.insert(HEADER_USER_AGENT.to_owned(), user_agent.to_owned());
    }

    for (key, value) in &config.extra_headers {
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        headers.insert(key, value.trim().to_owned());
    }

    headers
}
