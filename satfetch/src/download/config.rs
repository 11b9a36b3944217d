//! Configuration for a product downloader.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::collab::RepairMode;
use crate::descriptor::{normalize_tile, PlatformType};
use crate::transfer::{
    Credentials, DownloadMode, NetworkConfig, ProxyConfig, DEFAULT_TIMEOUT_SECS,
};

/// Default Sentinel-2 object store.
pub const AWS_SENTINEL2_URL: &str = "https://sentinel-s2-l1c.s3.amazonaws.com";

/// Default Landsat-8 object store.
pub const AWS_LANDSAT8_URL: &str = "https://landsat-pds.s3.amazonaws.com";

/// Default SciHub OData service.
pub const SCIHUB_ODATA_URL: &str = "https://scihub.copernicus.eu/apihub/odata/v1";

/// Which backend products are fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductStore {
    /// Date-partitioned local mirror.
    Local,
    /// Public object store over HTTPS.
    #[default]
    Aws,
    /// SciHub OData service.
    SciHub,
}

impl ProductStore {
    pub fn name(&self) -> &'static str {
        match self {
            ProductStore::Local => "local",
            ProductStore::Aws => "aws",
            ProductStore::SciHub => "scihub",
        }
    }
}

impl fmt::Display for ProductStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProductStore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(ProductStore::Local),
            "aws" => Ok(ProductStore::Aws),
            "scihub" => Ok(ProductStore::SciHub),
            other => Err(format!("unknown product store: {}", other)),
        }
    }
}

/// Configuration for a [`ProductDownloader`](super::ProductDownloader).
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Directory receiving downloaded products.
    pub target_dir: PathBuf,

    /// Backend to fetch from.
    pub store: ProductStore,

    /// How files are materialized locally.
    pub mode: DownloadMode,

    /// Sentinel-2 object store root.
    pub aws_url: String,

    /// Landsat-8 object store root.
    pub landsat_url: String,

    /// OData service root.
    pub scihub_url: String,

    /// Root of the local mirror for [`ProductStore::Local`].
    pub local_root: Option<PathBuf>,

    /// Tiles to keep; empty keeps every granule.
    pub tiles: BTreeSet<String>,

    /// Bands to fetch; empty fetches every band.
    pub bands: Vec<String>,

    /// Viewing-angle repair applied to granule metadata.
    pub repair_mode: RepairMode,

    /// Fetch the per-granule ECMWF auxiliary file.
    pub fetch_aux: bool,

    /// Zip the finished product.
    pub compress: bool,

    /// Delete the product directory after zipping.
    pub delete_after_compress: bool,

    /// Connect/read timeout.
    pub timeout: Duration,

    /// Directory for per-product log files.
    pub log_dir: Option<PathBuf>,

    /// Catalog credentials.
    pub credentials: Option<Credentials>,

    /// Proxy applied to every connection.
    pub proxy: Option<ProxyConfig>,

    /// Platforms this downloader serves when used as a fallback; empty
    /// means every platform.
    pub platforms: BTreeSet<PlatformType>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("."),
            store: ProductStore::default(),
            mode: DownloadMode::default(),
            aws_url: AWS_SENTINEL2_URL.to_string(),
            landsat_url: AWS_LANDSAT8_URL.to_string(),
            scihub_url: SCIHUB_ODATA_URL.to_string(),
            local_root: None,
            tiles: BTreeSet::new(),
            bands: Vec::new(),
            repair_mode: RepairMode::default(),
            fetch_aux: true,
            compress: false,
            delete_after_compress: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            log_dir: None,
            credentials: None,
            proxy: None,
            platforms: BTreeSet::new(),
        }
    }
}

impl DownloadConfig {
    /// Create a configuration downloading into `target_dir`.
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_store(mut self, store: ProductStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_mode(mut self, mode: DownloadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_aws_url(mut self, url: impl Into<String>) -> Self {
        self.aws_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_landsat_url(mut self, url: impl Into<String>) -> Self {
        self.landsat_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_scihub_url(mut self, url: impl Into<String>) -> Self {
        self.scihub_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = Some(root.into());
        self
    }

    /// Keep only granules of these tiles. `T35TLK` and `35tlk` are equivalent.
    pub fn with_tiles<I, S>(mut self, tiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tiles = tiles.into_iter().map(|t| normalize_tile(t.as_ref())).collect();
        self
    }

    /// Fetch only these bands. Short names such as `B1` are accepted.
    pub fn with_bands<I, S>(mut self, bands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bands = bands.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_repair_mode(mut self, mode: RepairMode) -> Self {
        self.repair_mode = mode;
        self
    }

    pub fn with_fetch_aux(mut self, fetch: bool) -> Self {
        self.fetch_aux = fetch;
        self
    }

    /// Zip finished products, optionally removing the directory afterwards.
    pub fn with_compression(mut self, compress: bool, delete_after: bool) -> Self {
        self.compress = compress;
        self.delete_after_compress = delete_after;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_platforms<I: IntoIterator<Item = PlatformType>>(mut self, platforms: I) -> Self {
        self.platforms = platforms.into_iter().collect();
        self
    }

    /// Network settings for building an HTTP client.
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            timeout: self.timeout,
            proxy: self.proxy.clone(),
        }
    }

    pub fn has_tile_filter(&self) -> bool {
        !self.tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DownloadConfig::default();
        assert_eq!(config.store, ProductStore::Aws);
        assert_eq!(config.mode, DownloadMode::Resume);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.fetch_aux);
        assert!(!config.compress);
        assert!(!config.has_tile_filter());
    }

    #[test]
    fn test_builder_pattern() {
        let config = DownloadConfig::new("/data/s2")
            .with_store(ProductStore::SciHub)
            .with_mode(DownloadMode::Overwrite)
            .with_tiles(["T35TLK", "35tll"])
            .with_bands(["B1", "B8A"])
            .with_compression(true, true)
            .with_scihub_url("http://hub/odata/v1/")
            .with_platforms([PlatformType::S2B])
            .with_timeout(Duration::from_secs(60));

        assert_eq!(config.target_dir, PathBuf::from("/data/s2"));
        assert_eq!(config.store, ProductStore::SciHub);
        assert!(config.tiles.contains("35TLK"));
        assert!(config.tiles.contains("35TLL"));
        assert_eq!(config.bands, vec!["B1", "B8A"]);
        assert!(config.delete_after_compress);
        assert_eq!(config.scihub_url, "http://hub/odata/v1");
        assert_eq!(config.network().timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_store_parse() {
        assert_eq!("SciHub".parse(), Ok(ProductStore::SciHub));
        assert_eq!("local".parse(), Ok(ProductStore::Local));
        assert!("ftp".parse::<ProductStore>().is_err());
    }
}
