//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use satfetch::collab::{TableTileIndex, TileIndex};
use satfetch::config::ConfigFile;
use satfetch::descriptor::{PlatformType, Sensor};
use satfetch::download::ProductStore;
use satfetch::geo::{Polygon, Rect};
use satfetch::search::{
    AwsSearch, LandsatSearch, ProviderChain, Query, SciHubSearch, SearchProvider,
};
use satfetch::transfer::{HttpClient, NetworkConfig, ReqwestClient};

use crate::error::CliError;

/// Sensor selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum SensorArg {
    /// Sentinel-2 MSI Level-1C
    S2,
    /// Landsat-8 OLI/TIRS
    L8,
}

impl From<SensorArg> for Sensor {
    fn from(arg: SensorArg) -> Self {
        match arg {
            SensorArg::S2 => Sensor::Sentinel2,
            SensorArg::L8 => Sensor::Landsat8,
        }
    }
}

/// Search catalog selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ProviderArg {
    /// SciHub OpenSearch (Sentinel-2, credentials required)
    Scihub,
    /// Public Sentinel-2 bucket listing (tiles required)
    Aws,
    /// Landsat-8 scene catalog
    Landsat,
}

/// Product store selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum StoreArg {
    /// Date-partitioned local mirror
    Local,
    /// Public object store
    Aws,
    /// SciHub OData service
    Scihub,
}

impl From<StoreArg> for ProductStore {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Local => ProductStore::Local,
            StoreArg::Aws => ProductStore::Aws,
            StoreArg::Scihub => ProductStore::SciHub,
        }
    }
}

/// Search filters shared by `search` and `download`.
#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// Sensor to search for
    #[arg(long, value_enum, default_value = "s2")]
    pub sensor: SensorArg,

    /// Area of interest as a WKT polygon
    #[arg(long, conflicts_with = "bbox")]
    pub area: Option<String>,

    /// Area of interest as min_lon,min_lat,max_lon,max_lat
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub bbox: Option<Vec<f64>>,

    /// Tiles to keep (e.g. 35TLK), comma separated
    #[arg(long, value_delimiter = ',')]
    pub tiles: Vec<String>,

    /// Tile table used to turn the area into tiles
    #[arg(long)]
    pub tile_index: Option<PathBuf>,

    /// First sensing day (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last sensing day (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Maximum cloud cover in percent
    #[arg(long)]
    pub clouds: Option<f64>,

    /// Relative orbit number
    #[arg(long)]
    pub orbit: Option<u32>,

    /// Platform (S2A, S2B, L8)
    #[arg(long)]
    pub platform: Option<PlatformType>,

    /// Results per page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Catalog to search
    #[arg(long, value_enum)]
    pub provider: Option<ProviderArg>,

    /// Catalog searched after the first one, with the same filters
    #[arg(long, value_enum)]
    pub secondary: Option<ProviderArg>,
}

impl FilterArgs {
    /// Area of interest from `--area` or `--bbox`.
    pub fn polygon(&self) -> Result<Option<Polygon>, CliError> {
        if let Some(wkt) = &self.area {
            return Polygon::parse(wkt).map(Some).map_err(CliError::InvalidArgument);
        }
        match self.bbox.as_deref() {
            Some([min_lon, min_lat, max_lon, max_lat]) => Ok(Some(
                Rect::new(*min_lon, *min_lat, *max_lon, *max_lat).to_polygon(),
            )),
            Some(_) => Err(CliError::InvalidArgument(
                "--bbox takes four values".to_string(),
            )),
            None => Ok(None),
        }
    }

    /// Tiles given directly, plus those the tile table finds in the area.
    pub fn resolve_tiles(&self, area: Option<&Polygon>) -> Result<Vec<String>, CliError> {
        let mut tiles = self.tiles.clone();
        if let (Some(path), Some(area)) = (&self.tile_index, area) {
            let index = TableTileIndex::load(path)
                .map_err(|e| CliError::Config(format!("tile index: {}", e)))?;
            tiles.extend(index.intersecting(&area.bounding_box()));
        }
        Ok(tiles)
    }

    /// Build the catalog query.
    pub fn query(&self) -> Result<Query, CliError> {
        let area = self.polygon()?;
        let tiles = self.resolve_tiles(area.as_ref())?;

        let mut query = Query::new(self.sensor.into()).with_tiles(tiles);
        if let Some(area) = area {
            query = query.with_area(area);
        }
        query.start = self.start;
        query.end = self.end;
        if let Some(clouds) = self.clouds {
            query = query.with_cloud_ceiling(clouds);
        }
        if let Some(orbit) = self.orbit {
            query = query.with_relative_orbit(orbit);
        }
        if let Some(platform) = self.platform {
            query = query.with_platform(platform);
        }
        if let Some(size) = self.page_size {
            query = query.with_page(size, 0);
        }

        query.validate()?;
        Ok(query)
    }

    /// Primary catalog: `--provider`, else the natural one for the sensor.
    pub fn primary_provider(&self) -> ProviderArg {
        self.provider.unwrap_or(match self.sensor {
            SensorArg::S2 => ProviderArg::Scihub,
            SensorArg::L8 => ProviderArg::Landsat,
        })
    }
}

/// Network settings: CLI timeout, then the file.
pub fn network_config(config: &ConfigFile, timeout: Option<u64>) -> NetworkConfig {
    NetworkConfig {
        timeout: Duration::from_secs(timeout.unwrap_or(config.download.timeout_secs)),
        proxy: config.proxy_config(),
    }
}

/// HTTP client shared by every provider and downloader of a command.
pub fn http_client(network: &NetworkConfig) -> Result<Arc<dyn HttpClient>, CliError> {
    let client = ReqwestClient::with_config(network)
        .map_err(|e| CliError::Config(format!("HTTP client: {}", e)))?;
    Ok(Arc::new(client))
}

/// Instantiate one catalog.
pub fn provider(
    kind: ProviderArg,
    config: &ConfigFile,
    client: Arc<dyn HttpClient>,
) -> Arc<dyn SearchProvider> {
    match kind {
        ProviderArg::Scihub => {
            let mut search = SciHubSearch::new(client).with_base_url(&config.scihub.search_url);
            if let Some(credentials) = config.scihub_credentials() {
                search = search.with_credentials(credentials);
            }
            Arc::new(search)
        }
        ProviderArg::Aws => Arc::new(AwsSearch::new(client).with_base_url(&config.aws.url)),
        ProviderArg::Landsat => {
            let mut search = LandsatSearch::new(client, &config.landsat.catalog_url);
            if let Some(credentials) = config.landsat_credentials() {
                search = search.with_credentials(credentials);
            }
            Arc::new(search)
        }
    }
}

/// Primary catalog plus the optional secondary.
pub fn provider_chain(
    filters: &FilterArgs,
    config: &ConfigFile,
    client: Arc<dyn HttpClient>,
) -> ProviderChain {
    let primary = provider(filters.primary_provider(), config, client.clone());
    let chain = ProviderChain::new(primary);
    match filters.secondary {
        Some(kind) => chain.with_secondary(provider(kind, config, client)),
        None => chain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        filters: FilterArgs,
    }

    fn parse(args: &[&str]) -> FilterArgs {
        let mut full = vec!["test"];
        full.extend_from_slice(args);
        Harness::parse_from(full).filters
    }

    #[test]
    fn test_query_from_args() {
        let filters = parse(&[
            "--bbox",
            "24.0,44.5,25.5,45.5",
            "--start",
            "2017-07-01",
            "--end",
            "2017-07-14",
            "--clouds",
            "30",
            "--tiles",
            "T35TLK,35tll",
        ]);
        let query = filters.query().unwrap();
        assert_eq!(query.sensor, Sensor::Sentinel2);
        assert!(query.area.is_some());
        assert_eq!(query.cloud_ceiling, 30.0);
        assert!(query.tiles.contains("35TLK"));
        assert!(query.tiles.contains("35TLL"));
        assert_eq!(filters.primary_provider(), ProviderArg::Scihub);
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let filters = parse(&["--start", "2017-07-14", "--end", "2017-07-01"]);
        assert!(filters.query().is_err());
    }

    #[test]
    fn test_landsat_defaults_to_landsat_catalog() {
        let filters = parse(&["--sensor", "l8"]);
        assert_eq!(filters.primary_provider(), ProviderArg::Landsat);
    }
}
