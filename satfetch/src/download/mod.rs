//! Product download engine.
//!
//! This module turns product descriptors into local products:
//! - Backend addressing for object stores and OData catalogs (`layout`)
//! - The local mirror backend (`local`)
//! - Top-level metadata parsing and tile filtering (`metadata`)
//! - The per-product state machine and batch driver (`orchestrator`)
//!
//! # Example
//!
//! ```no_run
//! use satfetch::descriptor::ProductDescriptor;
//! use satfetch::download::{DownloadConfig, ProductDownloader};
//!
//! let config = DownloadConfig::new("/data/s2")
//!     .with_tiles(["35TLK"])
//!     .with_bands(["B02", "B03", "B04"]);
//! let downloader = ProductDownloader::from_config(config).unwrap();
//! let product = ProductDescriptor::parse(
//!     "S2A_MSIL1C_20170703T092031_N0205_R093_T35TLK_20170703T092030",
//! ).unwrap();
//! let report = downloader.download_all(&[product]);
//! println!("worst outcome: {}", report.worst());
//! ```

mod archive;
mod config;
mod error;
mod layout;
mod local;
mod log;
mod metadata;
mod orchestrator;
mod progress;
mod safe;
mod state;

pub use archive::{archive_path, compress_dir};
pub use config::{
    DownloadConfig, ProductStore, AWS_LANDSAT8_URL, AWS_SENTINEL2_URL, SCIHUB_ODATA_URL,
};
pub use error::{DownloadError, DownloadResult};
pub use layout::{AwsLayout, GranuleRef, ODataLayout, RemoteLayout};
pub use local::{FileFilter, LocalMirror};
pub use log::ProductLog;
pub use metadata::{
    filter_granules, mask_files, mask_selected, scan_granules, GranuleRecord,
};
pub use orchestrator::ProductDownloader;
pub use progress::{BatchProgress, BatchProgressCallback, ProgressSinks};
pub use safe::SafeLayout;
pub use state::{BatchReport, ProductOutcome, ReturnCode, Step};
