//! Addressable configuration keys (`section.key`).

use std::path::PathBuf;
use std::str::FromStr;

use super::file::{ConfigError, ConfigFile};

/// One setting of the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    SciHubSearchUrl,
    SciHubODataUrl,
    SciHubUser,
    SciHubPassword,
    AwsUrl,
    LandsatUrl,
    LandsatCatalogUrl,
    LandsatUser,
    LandsatPassword,
    LocalRoot,
    DownloadTargetDir,
    DownloadStore,
    DownloadMode,
    DownloadTimeout,
    DownloadLogDir,
    DownloadFetchAux,
    DownloadRepairMode,
    ProxyType,
    ProxyHost,
    ProxyPort,
    ProxyUser,
    ProxyPassword,
}

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        use ConfigKey::*;
        &[
            SciHubSearchUrl,
            SciHubODataUrl,
            SciHubUser,
            SciHubPassword,
            AwsUrl,
            LandsatUrl,
            LandsatCatalogUrl,
            LandsatUser,
            LandsatPassword,
            LocalRoot,
            DownloadTargetDir,
            DownloadStore,
            DownloadMode,
            DownloadTimeout,
            DownloadLogDir,
            DownloadFetchAux,
            DownloadRepairMode,
            ProxyType,
            ProxyHost,
            ProxyPort,
            ProxyUser,
            ProxyPassword,
        ]
    }

    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            SciHubSearchUrl | SciHubODataUrl | SciHubUser | SciHubPassword => "scihub",
            AwsUrl => "aws",
            LandsatUrl | LandsatCatalogUrl | LandsatUser | LandsatPassword => "landsat",
            LocalRoot => "local",
            DownloadTargetDir | DownloadStore | DownloadMode | DownloadTimeout | DownloadLogDir
            | DownloadFetchAux | DownloadRepairMode => "download",
            ProxyType | ProxyHost | ProxyPort | ProxyUser | ProxyPassword => "proxy",
        }
    }

    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            SciHubSearchUrl => "search_url",
            SciHubODataUrl => "odata_url",
            SciHubUser | LandsatUser | ProxyUser => "user",
            SciHubPassword | LandsatPassword | ProxyPassword => "password",
            AwsUrl | LandsatUrl => "url",
            LandsatCatalogUrl => "catalog_url",
            LocalRoot => "root",
            DownloadTargetDir => "target_dir",
            DownloadStore => "store",
            DownloadMode => "mode",
            DownloadTimeout => "timeout",
            DownloadLogDir => "log_dir",
            DownloadFetchAux => "fetch_aux",
            DownloadRepairMode => "repair_mode",
            ProxyType => "type",
            ProxyHost => "host",
            ProxyPort => "port",
        }
    }

    /// `section.key`
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Whether the value should be hidden when listing.
    pub fn is_secret(&self) -> bool {
        matches!(
            self,
            ConfigKey::SciHubPassword | ConfigKey::LandsatPassword | ConfigKey::ProxyPassword
        )
    }

    /// Current value as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        let text = |s: &Option<String>| s.clone().unwrap_or_default();

        match self {
            SciHubSearchUrl => config.scihub.search_url.clone(),
            SciHubODataUrl => config.scihub.odata_url.clone(),
            SciHubUser => text(&config.scihub.user),
            SciHubPassword => text(&config.scihub.password),
            AwsUrl => config.aws.url.clone(),
            LandsatUrl => config.landsat.url.clone(),
            LandsatCatalogUrl => config.landsat.catalog_url.clone(),
            LandsatUser => text(&config.landsat.user),
            LandsatPassword => text(&config.landsat.password),
            LocalRoot => path(&config.local.root),
            DownloadTargetDir => path(&config.download.target_dir),
            DownloadStore => config.download.store.name().to_string(),
            DownloadMode => config.download.mode.name().to_string(),
            DownloadTimeout => config.download.timeout_secs.to_string(),
            DownloadLogDir => path(&config.download.log_dir),
            DownloadFetchAux => config.download.fetch_aux.to_string(),
            DownloadRepairMode => config.download.repair_mode.name().to_string(),
            ProxyType => match config.proxy.kind {
                crate::transfer::ProxyKind::Http => "http".to_string(),
                crate::transfer::ProxyKind::Https => "https".to_string(),
            },
            ProxyHost => text(&config.proxy.host),
            ProxyPort => config.proxy.port.map(|p| p.to_string()).unwrap_or_default(),
            ProxyUser => text(&config.proxy.user),
            ProxyPassword => text(&config.proxy.password),
        }
    }

    /// Set from text. An empty value clears optional settings.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());
        let optional_path = |v: &str| (!v.is_empty()).then(|| PathBuf::from(v));

        match self {
            SciHubSearchUrl => config.scihub.search_url = value.to_string(),
            SciHubODataUrl => config.scihub.odata_url = value.to_string(),
            SciHubUser => config.scihub.user = optional(value),
            SciHubPassword => config.scihub.password = optional(value),
            AwsUrl => config.aws.url = value.to_string(),
            LandsatUrl => config.landsat.url = value.to_string(),
            LandsatCatalogUrl => config.landsat.catalog_url = value.to_string(),
            LandsatUser => config.landsat.user = optional(value),
            LandsatPassword => config.landsat.password = optional(value),
            LocalRoot => config.local.root = optional_path(value),
            DownloadTargetDir => config.download.target_dir = optional_path(value),
            DownloadStore => config.download.store = self.parse(value)?,
            DownloadMode => config.download.mode = self.parse(value)?,
            DownloadTimeout => config.download.timeout_secs = self.parse(value)?,
            DownloadLogDir => config.download.log_dir = optional_path(value),
            DownloadFetchAux => config.download.fetch_aux = self.parse_bool(value)?,
            DownloadRepairMode => config.download.repair_mode = self.parse(value)?,
            ProxyType => config.proxy.kind = self.parse(value)?,
            ProxyHost => config.proxy.host = optional(value),
            ProxyPort => {
                config.proxy.port = match value {
                    "" => None,
                    v => Some(self.parse(v)?),
                }
            }
            ProxyUser => config.proxy.user = optional(value),
            ProxyPassword => config.proxy.password = optional(value),
        }
        Ok(())
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        value.parse().map_err(|e: T::Err| self.invalid(e.to_string()))
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            other => Err(self.invalid(format!("expected a boolean, got '{}'", other))),
        }
    }

    fn invalid(&self, reason: String) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            reason,
        }
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or(ConfigError::UnknownKey(wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::ProductStore;

    #[test]
    fn test_parse_key() {
        assert_eq!("download.store".parse::<ConfigKey>().unwrap(), ConfigKey::DownloadStore);
        assert_eq!("Proxy.Port".parse::<ConfigKey>().unwrap(), ConfigKey::ProxyPort);
        assert!("download.nope".parse::<ConfigKey>().is_err());
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<String> = ConfigKey::all().iter().map(ConfigKey::name).collect();
        let count = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), count);
    }

    #[test]
    fn test_set_and_get() {
        let mut config = ConfigFile::default();
        ConfigKey::DownloadStore.set(&mut config, "local").unwrap();
        ConfigKey::LocalRoot.set(&mut config, "/mirror").unwrap();
        ConfigKey::ProxyPort.set(&mut config, "8080").unwrap();

        assert_eq!(config.download.store, ProductStore::Local);
        assert_eq!(ConfigKey::LocalRoot.get(&config), "/mirror");
        assert_eq!(ConfigKey::ProxyPort.get(&config), "8080");

        ConfigKey::LocalRoot.set(&mut config, "").unwrap();
        assert!(config.local.root.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::DownloadMode.set(&mut config, "teleport").is_err());
        assert!(ConfigKey::ProxyPort.set(&mut config, "99999").is_err());
        assert!(ConfigKey::DownloadFetchAux.set(&mut config, "maybe").is_err());
    }
}
