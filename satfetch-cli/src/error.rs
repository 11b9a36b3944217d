//! CLI error type.

use std::fmt;

use satfetch::config::ConfigError;
use satfetch::download::{DownloadError, ReturnCode};
use satfetch::search::SearchError;

/// Errors that end a CLI command.
#[derive(Debug)]
pub enum CliError {
    /// Bad or missing setting.
    Config(String),
    /// Configuration file could not be read or written.
    ConfigFile(ConfigError),
    /// Invalid command-line input.
    InvalidArgument(String),
    Search(SearchError),
    Download(DownloadError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Download(e) => e.return_code().exit_code(),
            _ => ReturnCode::Fatal.exit_code(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "Configuration file error: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Search(e) => write!(f, "Search failed: {}", e),
            CliError::Download(e) => write!(f, "Download failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Search(e) => Some(e),
            CliError::Download(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<SearchError> for CliError {
    fn from(e: SearchError) -> Self {
        CliError::Search(e)
    }
}

impl From<DownloadError> for CliError {
    fn from(e: DownloadError) -> Self {
        CliError::Download(e)
    }
}
