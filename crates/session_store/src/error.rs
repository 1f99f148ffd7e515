use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse session document {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize session document for {path}: {source}")]
    JsonSerialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} has unsupported session document version {found}; expected 1")]
    UnsupportedVersion { path: PathBuf, found: u32 },

    #[error("{path} has invalid RFC3339 timestamp in field '{field}': {value}")]
    InvalidTimestamp {
        path: PathBuf,
        field: &'static str,
        value: String,
    },

    #[error("thread token lifetime is out of range")]
    TtlOutOfRange,

    #[error("failed to format timestamp as RFC3339: {0}")]
    ClockFormat(#[source] time::error::Format),
}

impl SessionStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn json_parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::JsonParse {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn json_serialize(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::JsonSerialize {
            path: path.into(),
            source,
        }
    }
}
