//! Error types for HTTP transfers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors that can occur while talking to a remote store.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Connect or read timed out. Fatal to the current product.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The server answered with an unexpected status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// Local file I/O failed.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The HTTP client could not be built (bad proxy settings, TLS setup).
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

impl TransferError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransferError::Timeout { .. })
    }

    /// HTTP status of a `Status` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransferError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TransferError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = TransferError::Timeout {
            url: "https://example.com/a".to_string(),
            timeout_secs: 30,
        };
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "request to https://example.com/a timed out after 30s"
        );
    }

    #[test]
    fn test_status_accessor() {
        let err = TransferError::Status {
            url: "u".to_string(),
            status: 401,
        };
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_timeout());
    }
}
