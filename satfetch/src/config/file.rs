//! INI configuration file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use super::keys::ConfigKey;
use crate::collab::RepairMode;
use crate::download::{
    DownloadConfig, ProductStore, AWS_LANDSAT8_URL, AWS_SENTINEL2_URL, SCIHUB_ODATA_URL,
};
use crate::search::{LANDSAT_CATALOG_URL, SCIHUB_URL};
use crate::transfer::{Credentials, DownloadMode, ProxyConfig, ProxyKind, DEFAULT_TIMEOUT_SECS};

/// Errors reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: ini::Error },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("unknown configuration key: {0}")]
    UnknownKey(String),
}

/// `<config_dir>/satfetch`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("satfetch")
}

/// `<config_dir>/satfetch/config.ini`.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.ini")
}

/// `[scihub]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SciHubSettings {
    /// OpenSearch endpoint root.
    pub search_url: String,
    /// OData service root.
    pub odata_url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for SciHubSettings {
    fn default() -> Self {
        Self {
            search_url: SCIHUB_URL.to_string(),
            odata_url: SCIHUB_ODATA_URL.to_string(),
            user: None,
            password: None,
        }
    }
}

/// `[aws]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSettings {
    /// Sentinel-2 bucket, used for both listing and download.
    pub url: String,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            url: AWS_SENTINEL2_URL.to_string(),
        }
    }
}

/// `[landsat]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandsatSettings {
    /// Scene bucket.
    pub url: String,
    /// Search catalog.
    pub catalog_url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for LandsatSettings {
    fn default() -> Self {
        Self {
            url: AWS_LANDSAT8_URL.to_string(),
            catalog_url: LANDSAT_CATALOG_URL.to_string(),
            user: None,
            password: None,
        }
    }
}

/// `[local]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSettings {
    /// Root of the date-partitioned mirror.
    pub root: Option<PathBuf>,
}

/// `[download]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub target_dir: Option<PathBuf>,
    pub store: ProductStore,
    pub mode: DownloadMode,
    pub timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
    pub fetch_aux: bool,
    pub repair_mode: RepairMode,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            target_dir: None,
            store: ProductStore::default(),
            mode: DownloadMode::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_dir: None,
            fetch_aux: true,
            repair_mode: RepairMode::default(),
        }
    }
}

/// `[proxy]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySettings {
    pub kind: ProxyKind,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub scihub: SciHubSettings,
    pub aws: AwsSettings,
    pub landsat: LandsatSettings,
    pub local: LocalSettings,
    pub download: DownloadSettings,
    pub proxy: ProxySettings,
}

impl ConfigFile {
    /// Load from the default location. A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            source: ini::Error::Parse(e),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        self.to_ini().write_to_file(path).map_err(write_error)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section())).set(key.key_name(), value);
            }
        }
        ini
    }

    pub fn scihub_credentials(&self) -> Option<Credentials> {
        credentials(&self.scihub.user, &self.scihub.password)
    }

    pub fn landsat_credentials(&self) -> Option<Credentials> {
        credentials(&self.landsat.user, &self.landsat.password)
    }

    /// Proxy, when a host and port are configured.
    pub fn proxy_config(&self) -> Option<ProxyConfig> {
        Some(ProxyConfig {
            kind: self.proxy.kind,
            host: self.proxy.host.clone()?,
            port: self.proxy.port?,
            credentials: credentials(&self.proxy.user, &self.proxy.password),
        })
    }

    /// Download configuration seeded from the file.
    ///
    /// `target_dir` overrides `[download] target_dir`; without either the
    /// current directory is used.
    pub fn download_config(&self, target_dir: Option<PathBuf>) -> DownloadConfig {
        let target = target_dir
            .or_else(|| self.download.target_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = DownloadConfig::new(target)
            .with_store(self.download.store)
            .with_mode(self.download.mode)
            .with_aws_url(&self.aws.url)
            .with_landsat_url(&self.landsat.url)
            .with_scihub_url(&self.scihub.odata_url)
            .with_fetch_aux(self.download.fetch_aux)
            .with_repair_mode(self.download.repair_mode)
            .with_timeout(Duration::from_secs(self.download.timeout_secs));

        if let Some(root) = &self.local.root {
            config = config.with_local_root(root);
        }
        if let Some(dir) = &self.download.log_dir {
            config = config.with_log_dir(dir);
        }
        if let (ProductStore::SciHub, Some(credentials)) =
            (self.download.store, self.scihub_credentials())
        {
            config = config.with_credentials(credentials);
        }
        if let Some(proxy) = self.proxy_config() {
            config = config.with_proxy(proxy);
        }
        config
    }
}

fn credentials(user: &Option<String>, password: &Option<String>) -> Option<Credentials> {
    Some(Credentials::new(user.as_deref()?, password.as_deref().unwrap_or_default()))
}
