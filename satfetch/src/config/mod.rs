//! Persistent settings.
//!
//! Settings live in `<config_dir>/satfetch/config.ini`. Command-line flags
//! take precedence over the file; the file takes precedence over built-in
//! defaults.

mod file;
mod keys;

pub use file::{
    config_dir, config_file_path, AwsSettings, ConfigError, ConfigFile, DownloadSettings,
    LandsatSettings, LocalSettings, ProxySettings, SciHubSettings,
};
pub use keys::ConfigKey;
