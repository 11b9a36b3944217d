//! HTTP transfer primitives.
//!
//! This module provides the pieces every remote backend builds on:
//! - An injectable HTTP client (`http`)
//! - Resumable single-file downloads (`resume`)
//! - File progress callbacks and throughput accounting (`progress`)

mod error;
mod http;
mod progress;
mod resume;

use std::fmt;
use std::str::FromStr;

pub use error::{TransferError, TransferResult};
pub use http::{
    Credentials, HttpClient, HttpResponse, NetworkConfig, ProxyConfig, ProxyKind, ReqwestClient,
    RequestOptions, DEFAULT_TIMEOUT_SECS,
};
pub use progress::{FileProgressCallback, ThroughputTracker, TransferState};
pub use resume::ResumableDownloader;

#[cfg(test)]
pub use http::tests::MockHttpClient;

/// How a file or product is materialized locally.
///
/// Orthogonal to the backend: remote stores honor `Overwrite` and `Resume`,
/// the local mirror honors `Copy`, `Symlink` and `FilteredSymlink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadMode {
    /// Discard any local file and start over.
    Overwrite,
    /// Continue a partial local file with a Range request.
    #[default]
    Resume,
    /// Copy the product tree from a local mirror.
    Copy,
    /// Symlink the whole product directory from a local mirror.
    Symlink,
    /// Recreate the directory tree and symlink only selected files.
    FilteredSymlink,
}

impl DownloadMode {
    pub fn name(&self) -> &'static str {
        match self {
            DownloadMode::Overwrite => "overwrite",
            DownloadMode::Resume => "resume",
            DownloadMode::Copy => "copy",
            DownloadMode::Symlink => "symlink",
            DownloadMode::FilteredSymlink => "filtered-symlink",
        }
    }

    /// Whether the mode applies to remote transfers (as opposed to the
    /// local mirror).
    pub fn is_remote(&self) -> bool {
        matches!(self, DownloadMode::Overwrite | DownloadMode::Resume)
    }
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DownloadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "overwrite" => Ok(DownloadMode::Overwrite),
            "resume" => Ok(DownloadMode::Resume),
            "copy" => Ok(DownloadMode::Copy),
            "symlink" => Ok(DownloadMode::Symlink),
            "filtered-symlink" => Ok(DownloadMode::FilteredSymlink),
            other => Err(format!("unknown download mode: {}", other)),
        }
    }
}
