use std::time::Duration;

use time::OffsetDateTime;

use crate::error::SessionStoreError;
use crate::persistence::{Clock, SessionPersistence, ThreadToken};

#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    session_token: Option<String>,
    thread_token: Option<ThreadToken>,
    clock: Clock,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self {
            session_token: None,
            thread_token: None,
            clock: OffsetDateTime::now_utc,
        }
    }
}

impl MemorySessionStore {
    pub fn new(session_token: Option<String>) -> Self {
        Self {
            session_token: session_token
                .map(|token| token.trim().to_owned())
                .filter(|token| !token.is_empty()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn thread_token_record(&self) -> Option<&ThreadToken> {
        self.thread_token.as_ref()
    }
}

impl SessionPersistence for MemorySessionStore {
    fn session_token(&self) -> Option<String> {
        self.session_token.clone()
    }

    fn thread_token(&self) -> Option<String> {
        let now = (self.clock)();
        self.thread_token
            .as_ref()
            .filter(|token| token.is_live(now))
            .map(|token| token.value.clone())
    }

    fn set_thread_token(
        &mut self,
        token: &str,
        ttl: Option<Duration>,
    ) -> Result<(), SessionStoreError> {
        self.thread_token = Some(ThreadToken::issue(token, ttl, (self.clock)())?);
        Ok(())
    }

    fn clear_thread_token(&mut self) -> Result<(), SessionStoreError> {
        self.thread_token = None;
        Ok(())
    }
}
