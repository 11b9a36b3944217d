//! Error types for product downloads.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::state::ReturnCode;
use crate::descriptor::DescriptorError;
use crate::transfer::TransferError;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that end the download of one product (or, for
/// [`DownloadError::Fatal`], the whole batch).
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Nothing could be retrieved from any backend.
    #[error("{product}: no data could be retrieved ({reason})")]
    EmptyProduct { product: String, reason: String },

    /// The tile filter removed every granule of the product.
    #[error("{product}: no granule matches the requested tiles")]
    NoMatchingTiles { product: String },

    /// Transfer fault, including timeouts.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Local filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Compressing the finished product failed.
    #[error("failed to archive {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },

    /// Caller-supplied input is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unrecoverable setup error; aborts the batch.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl DownloadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn empty(product: &str, reason: impl Into<String>) -> Self {
        Self::EmptyProduct {
            product: product.to_string(),
            reason: reason.into(),
        }
    }

    /// Per-product outcome this error maps to.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            Self::EmptyProduct { .. } | Self::NoMatchingTiles { .. } => ReturnCode::EmptyProduct,
            Self::Transfer(_) | Self::Io { .. } | Self::Archive { .. } => ReturnCode::DownloadError,
            Self::InvalidInput(_) | Self::Fatal(_) => ReturnCode::Fatal,
        }
    }

    /// Whether another backend may still succeed.
    pub fn is_soft_miss(&self) -> bool {
        matches!(self, Self::EmptyProduct { .. })
    }
}

impl From<DescriptorError> for DownloadError {
    fn from(e: DescriptorError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}
