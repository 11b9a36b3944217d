//! satfetch - Sentinel-2 and Landsat-8 product search and download
//!
//! This library resolves satellite-imagery product names into every path
//! they imply, searches several catalogs through one interface, and
//! reassembles products locally from object stores, OData catalogs or a
//! local mirror, fetching only the tiles and bands asked for.
//!
//! # Modules
//!
//! - [`descriptor`]: product naming grammars and derived paths
//! - [`search`]: catalog search providers
//! - [`download`]: per-product download state machine and batch driver
//! - [`transfer`]: resumable HTTP file transfer
//! - [`odata`]: OData resource path builder
//! - [`collab`]: tile index and metadata repair collaborators
//! - [`config`]: INI configuration file

pub mod collab;
pub mod config;
pub mod descriptor;
pub mod download;
pub mod geo;
pub mod odata;
pub mod search;
pub mod transfer;

pub use descriptor::{DescriptorError, PlatformType, ProductDescriptor, SchemaVersion, Sensor};
pub use download::{BatchReport, DownloadConfig, ProductDownloader, ReturnCode};
pub use search::{ProviderChain, Query, SearchError, SearchProvider};
