use std::time::Duration;

use time::OffsetDateTime;

use crate::error::SessionStoreError;

/// Source of the current instant; injectable so expiry is testable.
pub type Clock = fn() -> OffsetDateTime;

/// Storage for the tokens a conversation needs across page loads.
pub trait SessionPersistence {
    /// Host-issued session token sent as `jwt`.
    fn session_token(&self) -> Option<String>;

    /// Live (unexpired) continuation token, if any.
    fn thread_token(&self) -> Option<String>;

    /// Store a continuation token; `ttl` of `None` never expires.
    fn set_thread_token(
        &mut self,
        token: &str,
        ttl: Option<Duration>,
    ) -> Result<(), SessionStoreError>;

    fn clear_thread_token(&mut self) -> Result<(), SessionStoreError>;
}

/// A continuation token with its optional expiry instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadToken {
    pub value: String,
    pub expires_at: Option<OffsetDateTime>,
}

impl ThreadToken {
    pub fn issue(
        value: &str,
        ttl: Option<Duration>,
        now: OffsetDateTime,
    ) -> Result<Self, SessionStoreError> {
        let expires_at = match ttl {
            Some(ttl) => {
                let ttl =
                    time::Duration::try_from(ttl).map_err(|_| SessionStoreError::TtlOutOfRange)?;
                Some(now.checked_add(ttl).ok_or(SessionStoreError::TtlOutOfRange)?)
            }
            None => None,
        };

        Ok(Self {
            value: value.to_owned(),
            expires_at,
        })
    }

    /// Expiry is exclusive: a token is dead at its `expires_at` instant.
    pub fn is_live(&self, now: OffsetDateTime) -> bool {
        !matches!(self.expires_at, Some(expires_at) if now >= expires_at)
    }
}
