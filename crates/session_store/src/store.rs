use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::SessionStoreError;
use crate::persistence::{Clock, SessionPersistence, ThreadToken};
use crate::schema::{SessionDocument, SESSION_DOCUMENT_VERSION};

/// JSON-file backed token storage. The file is rewritten on every change.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    session_token: Option<String>,
    thread_token: Option<ThreadToken>,
    clock: Clock,
}

impl FileSessionStore {
    /// Open `path`, treating a missing file as an empty document.
    pub fn open(path: &Path) -> Result<Self, SessionStoreError> {
        Self::open_with_clock(path, OffsetDateTime::now_utc)
    }

    pub fn open_with_clock(path: &Path, clock: Clock) -> Result<Self, SessionStoreError> {
        let path = path.to_path_buf();
        let document = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str::<SessionDocument>(&text)
                .map_err(|source| SessionStoreError::json_parse(&path, source))?,
            Err(error) if error.kind() == ErrorKind::NotFound => SessionDocument::default(),
            Err(source) => {
                return Err(SessionStoreError::io(
                    "reading session document",
                    &path,
                    source,
                ))
            }
        };

        if document.version != SESSION_DOCUMENT_VERSION {
            return Err(SessionStoreError::UnsupportedVersion {
                path,
                found: document.version,
            });
        }

        let thread_token = match document.thread_token {
            Some(value) => Some(ThreadToken {
                value,
                expires_at: parse_expiry(&path, document.thread_token_expires_at)?,
            }),
            None => None,
        };

        Ok(Self {
            path,
            session_token: document.session_token,
            thread_token,
            clock,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_session_token(&mut self, token: &str) -> Result<(), SessionStoreError> {
        let token = token.trim();
        self.session_token = (!token.is_empty()).then(|| token.to_owned());
        self.persist()
    }

    fn document(&self) -> Result<SessionDocument, SessionStoreError> {
        let thread_token_expires_at = self
            .thread_token
            .as_ref()
            .and_then(|token| token.expires_at)
            .map(|expires_at| expires_at.format(&Rfc3339))
            .transpose()
            .map_err(SessionStoreError::ClockFormat)?;

        Ok(SessionDocument {
            version: SESSION_DOCUMENT_VERSION,
            session_token: self.session_token.clone(),
            thread_token: self.thread_token.as_ref().map(|token| token.value.clone()),
            thread_token_expires_at,
        })
    }

    fn persist(&self) -> Result<(), SessionStoreError> {
        let document = self.document()?;
        let text = serde_json::to_string_pretty(&document)
            .map_err(|source| SessionStoreError::json_serialize(&self.path, source))?;

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| {
                SessionStoreError::io("creating session directory", parent, source)
            })?;
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, text).map_err(|source| {
            SessionStoreError::io("writing session document", &temp_path, source)
        })?;
        fs::rename(&temp_path, &self.path).map_err(|source| {
            SessionStoreError::io("replacing session document", &self.path, source)
        })?;

        tracing::debug!(path = %self.path.display(), "session document written");
        Ok(())
    }
}

impl SessionPersistence for FileSessionStore {
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
        self.persist()
    }

    fn clear_thread_token(&mut self) -> Result<(), SessionStoreError> {
        if self.thread_token.take().is_none() {
            return Ok(());
        }
        self.persist()
    }
}

fn parse_expiry(
    path: &Path,
    value: Option<String>,
) -> Result<Option<OffsetDateTime>, SessionStoreError> {
    let Some(value) = value else {
        return Ok(None);
    };

    OffsetDateTime::parse(&value, &Rfc3339)
        .map(Some)
        .map_err(|_| SessionStoreError::InvalidTimestamp {
            path: path.to_path_buf(),
            field: "threadTokenExpiresAt",
            value,
        })
}
