use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the catalog sync core.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid snapshot {location}: {message}")]
    Format { location: String, message: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot has no entries, cannot compute a watermark")]
    EmptyInput,

    #[error("entry {id} has an unparseable modification date '{value}': {source}")]
    Parse {
        id: i64,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("page {page} still failing after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        page: u32,
        attempts: u32,
        last_error: Box<SyncError>,
    },

    #[error("invalid fetch parameters: {0}")]
    InvalidParams(String),

    #[error("missing API credentials (set TENABLE_ACCESS_KEY and TENABLE_SECRET_KEY)")]
    MissingCredentials,
}

impl SyncError {
    pub fn transport<U: Into<String>, M: std::fmt::Display>(url: U, message: M) -> Self {
        SyncError::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn format<L: Into<String>, M: Into<String>>(location: L, message: M) -> Self {
        SyncError::Format {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Whether `fetch_all` may retry the page that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
