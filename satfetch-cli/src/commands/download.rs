//! `download` command: fetch products by name, or search then fetch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use satfetch::collab::RepairMode;
use satfetch::config::ConfigFile;
use satfetch::descriptor::PlatformType;
use satfetch::download::{DownloadConfig, ProductDownloader, ProductStore};
use satfetch::transfer::{DownloadMode, HttpClient};
use satfetch::{BatchReport, ReturnCode};
use tracing::{info, warn};

use super::common::{http_client, network_config, provider_chain, FilterArgs, StoreArg};
use crate::error::CliError;
use crate::progress::progress_sinks;

/// Arguments for `satfetch download`.
#[derive(Debug, Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Product names to download instead of searching (repeatable)
    #[arg(long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    /// Catalog ids, in the same order as --name
    #[arg(long = "id", value_name = "ID", requires = "names")]
    pub ids: Vec<String>,

    /// Directory receiving the products
    #[arg(long, short = 'o')]
    pub target_dir: Option<PathBuf>,

    /// Store to fetch from
    #[arg(long, value_enum)]
    pub store: Option<StoreArg>,

    /// overwrite, resume, copy, symlink or filtered-symlink
    #[arg(long)]
    pub mode: Option<DownloadMode>,

    /// Bands to fetch (e.g. B02,B03,B04), comma separated
    #[arg(long, value_delimiter = ',')]
    pub bands: Vec<String>,

    /// Viewing-angle repair: none, nan or interpolate
    #[arg(long)]
    pub repair: Option<RepairMode>,

    /// Skip the per-granule auxiliary file
    #[arg(long)]
    pub no_aux: bool,

    /// Zip each finished product
    #[arg(long)]
    pub compress: bool,

    /// Remove the product directory once zipped
    #[arg(long, requires = "compress")]
    pub delete_uncompressed: bool,

    /// Connect/read timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Root of the local mirror
    #[arg(long)]
    pub local_root: Option<PathBuf>,

    /// Store tried when the first one has nothing to deliver
    #[arg(long, value_enum)]
    pub fallback: Option<StoreArg>,

    /// Platforms the fallback store serves (e.g. S2A), comma separated
    #[arg(long, value_delimiter = ',', requires = "fallback")]
    pub fallback_platforms: Vec<PlatformType>,

    /// Directory for per-product logs
    #[arg(long)]
    pub product_log_dir: Option<PathBuf>,

    /// Hide progress bars
    #[arg(long)]
    pub quiet: bool,
}

impl DownloadArgs {
    /// Downloader configuration: file settings overridden by flags.
    fn download_config(
        &self,
        config: &ConfigFile,
        tiles: &[String],
    ) -> DownloadConfig {
        let mut download = config
            .download_config(self.target_dir.clone())
            .with_tiles(tiles)
            .with_bands(self.bands.iter().cloned())
            .with_compression(self.compress, self.delete_uncompressed);

        if let Some(store) = self.store {
            download = with_store(download, store.into(), config);
        }
        if let Some(mode) = self.mode {
            download = download.with_mode(mode);
        }
        if let Some(repair) = self.repair {
            download = download.with_repair_mode(repair);
        }
        if self.no_aux {
            download = download.with_fetch_aux(false);
        }
        if let Some(secs) = self.timeout {
            download = download.with_timeout(Duration::from_secs(secs));
        }
        if let Some(root) = &self.local_root {
            download = download.with_local_root(root);
        }
        if let Some(dir) = &self.product_log_dir {
            download = download.with_log_dir(dir);
        }
        download
    }

    /// Configuration of the fallback downloader, if one was requested.
    fn fallback_config(&self, primary: &DownloadConfig, config: &ConfigFile) -> Option<DownloadConfig> {
        let store: ProductStore = self.fallback?.into();
        let mut fallback = with_store(primary.clone(), store, config)
            .with_platforms(self.fallback_platforms.iter().copied());
        if store != ProductStore::Local && !fallback.mode.is_remote() {
            fallback = fallback.with_mode(DownloadMode::Resume);
        }
        Some(fallback)
    }
}

/// Switch stores, picking up the catalog credentials SciHub needs.
fn with_store(download: DownloadConfig, store: ProductStore, config: &ConfigFile) -> DownloadConfig {
    let mut download = download.with_store(store);
    download.credentials = match store {
        ProductStore::SciHub => config.scihub_credentials(),
        _ => None,
    };
    download
}

/// Run the download and return the batch's worst code.
pub fn run(args: DownloadArgs) -> Result<ReturnCode, CliError> {
    let config = ConfigFile::load().unwrap_or_default();
    let client = http_client(&network_config(&config, args.timeout))?;

    let query = args.filters.query()?;
    let products = if args.names.is_empty() {
        let chain = provider_chain(&args.filters, &config, client.clone());
        let found = if chain.secondary().is_some() {
            chain.search_all(&query)?
        } else {
            chain.search(&query)?
        };
        Some(found)
    } else {
        None
    };
    let tiles: Vec<String> = query.tiles.into_iter().collect();

    let total = products.as_ref().map_or(args.names.len(), Vec::len);
    if total == 0 {
        warn!("No products match the filters");
        println!("No products to download");
        return Ok(ReturnCode::Ok);
    }

    let primary = args.download_config(&config, &tiles);
    let fallback = args.fallback_config(&primary, &config);
    let downloader = build_downloader(primary, fallback, client, args.quiet, total)?;

    let report = match products {
        Some(products) => downloader.download_all(&products),
        None => downloader.download_names(&args.names, &args.ids)?,
    };

    print_summary(&report);
    Ok(report.worst())
}

fn build_downloader(
    primary: DownloadConfig,
    fallback: Option<DownloadConfig>,
    client: Arc<dyn HttpClient>,
    quiet: bool,
    total: usize,
) -> Result<ProductDownloader, CliError> {
    let sinks = if quiet {
        Default::default()
    } else {
        progress_sinks(total)
    };

    let mut downloader = ProductDownloader::new(primary, client.clone())?;
    if let Some(fallback) = fallback {
        info!(store = %fallback.store, "Fallback store enabled");
        let alternate = ProductDownloader::new(fallback, client)?.with_progress(sinks.clone());
        downloader = downloader.with_alternate(alternate);
    }
    Ok(downloader.with_progress(sinks))
}

fn print_summary(report: &BatchReport) {
    println!();
    println!(
        "{} of {} product(s) downloaded ({})",
        report.succeeded(),
        report.len(),
        report.worst()
    );
    for failure in report.failures() {
        println!("  {}", failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: DownloadArgs,
    }

    fn parse(args: &[&str]) -> DownloadArgs {
        let mut full = vec!["test"];
        full.extend_from_slice(args);
        Harness::parse_from(full).args
    }

    #[test]
    fn test_flags_override_file() {
        let file = ConfigFile::parse("[download]\nstore = local\nmode = copy\n").unwrap();
        let args = parse(&[
            "--name",
            "S2A_MSIL1C_20170703T092031_N0205_R093_T35TLK_20170703T092030",
            "--store",
            "aws",
            "--mode",
            "overwrite",
            "--bands",
            "B02,B03",
            "--no-aux",
            "-o",
            "/tmp/out",
        ]);

        let config = args.download_config(&file, &["T35TLK".to_string()]);
        assert_eq!(config.store, ProductStore::Aws);
        assert_eq!(config.mode, DownloadMode::Overwrite);
        assert_eq!(config.bands, vec!["B02", "B03"]);
        assert!(!config.fetch_aux);
        assert!(config.tiles.contains("35TLK"));
        assert_eq!(config.target_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_fallback_switches_to_remote_mode() {
        let file = ConfigFile::default();
        let args = parse(&[
            "--store",
            "local",
            "--mode",
            "symlink",
            "--fallback",
            "aws",
            "--fallback-platforms",
            "S2A",
        ]);

        let primary = args.download_config(&file, &[]);
        let fallback = args.fallback_config(&primary, &file).unwrap();
        assert_eq!(fallback.store, ProductStore::Aws);
        assert_eq!(fallback.mode, DownloadMode::Resume);
        assert!(fallback.platforms.contains(&PlatformType::S2A));
    }

    #[test]
    fn test_no_fallback_by_default() {
        let args = parse(&[]);
        let file = ConfigFile::default();
        let primary = args.download_config(&file, &[]);
        assert!(args.fallback_config(&primary, &file).is_none());
    }
}
