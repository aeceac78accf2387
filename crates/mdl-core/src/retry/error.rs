//! Error type for a single network fetch.

use super::policy::ErrorKind;

/// Failure of one HTTP request (or of writing its body to disk).
///
/// Kept separate from `anyhow` so callers can classify and decide retries,
/// and so the runner can tell a network outage from a logic error.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The transfer itself failed (timeout, refused connection, DNS, proxy).
    #[error("{message}")]
    Transport { kind: ErrorKind, message: String },
    /// Response arrived with a non-2xx status.
    #[error("HTTP {0}")]
    Http(u16),
    /// Disk write failed (disk full, permission denied). Not retried.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
    #[error("cancelled")]
    Cancelled,
}

impl From<curl::Error> for FetchError {
    fn from(e: curl::Error) -> Self {
        FetchError::from_curl(&e)
    }
}

impl FetchError {
    pub fn from_curl(e: &curl::Error) -> Self {
        FetchError::Transport {
            kind: super::classify_curl_error(e),
            message: e.to_string(),
        }
    }

    pub fn transport(kind: ErrorKind, message: impl Into<String>) -> Self {
        FetchError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Whether a later run could plausibly succeed (network or server-side trouble).
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Http(code) => super::classify_http_status(*code).is_transient(),
            FetchError::Storage(_) | FetchError::Cancelled => false,
        }
    }
}
