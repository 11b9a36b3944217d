//! Remote addressing of product files.
//!
//! A [`RemoteLayout`] maps each logical file of a product (top-level
//! metadata, granule metadata, band raster, quality mask, ...) to the URL a
//! backend serves it at. Local file names always come from the descriptor
//! grammar; only the remote side differs between backends.

use std::sync::OnceLock;

use regex::Regex;

use crate::descriptor::{ProductDescriptor, Sensor};
use crate::odata::ODataPath;
use crate::search::tile_prefix;

use super::safe::{AUX_DATA_DIR, DATASTRIP_DIR, GRANULE_DIR, IMG_DATA_DIR, QI_DATA_DIR};

fn legacy_mask_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(MSK_[A-Z]+)_.*_(B\d{2}|B8A)_MSIL1C\.gml$").unwrap()
    })
}

/// Identifiers of one granule, resolved from product metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GranuleRef {
    pub datastrip_id: String,
    pub granule_id: String,
    /// Granule folder name inside `GRANULE/`.
    pub folder: String,
}

/// Where a backend serves each file of a product.
pub trait RemoteLayout: Send + Sync {
    /// Short backend name used in logs and outcomes.
    fn name(&self) -> &'static str;

    /// Top-level product metadata.
    fn product_metadata(&self, product: &ProductDescriptor) -> Option<String>;

    /// Shared datastrip metadata.
    fn datastrip_metadata(&self, product: &ProductDescriptor, datastrip_id: &str) -> Option<String>;

    fn granule_metadata(&self, product: &ProductDescriptor, granule: &GranuleRef) -> Option<String>;

    /// Band raster; `band` is canonical (e.g. `B01`).
    fn band(&self, product: &ProductDescriptor, granule: &GranuleRef, band: &str) -> Option<String>;

    /// Quality mask named `mask` in the granule metadata.
    fn mask(&self, product: &ProductDescriptor, granule: &GranuleRef, mask: &str) -> Option<String>;

    /// Per-granule ECMWF auxiliary file.
    fn aux(&self, product: &ProductDescriptor, granule: &GranuleRef) -> Option<String>;

    /// Whole-product archive, where the backend offers one.
    fn archive(&self, _product: &ProductDescriptor) -> Option<String> {
        None
    }

    /// File of a product delivered as a flat folder (Landsat-8).
    fn flat_file(&self, _product: &ProductDescriptor, _file_name: &str) -> Option<String> {
        None
    }
}

/// Object-store layout of the public Sentinel-2 and Landsat-8 buckets.
///
/// Sentinel-2 product metadata lives under `products/{y}/{m}/{d}/{name}/`
/// and granules under `tiles/{utm}/{band}/{square}/{y}/{m}/{d}/0/` with
/// short file names (`B01.jp2`, `metadata.xml`, `qi/`, `auxiliary/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsLayout {
    sentinel2_url: String,
    landsat8_url: String,
}

impl AwsLayout {
    pub fn new(sentinel2_url: impl Into<String>, landsat8_url: impl Into<String>) -> Self {
        Self {
            sentinel2_url: sentinel2_url.into().trim_end_matches('/').to_string(),
            landsat8_url: landsat8_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn product_dir(&self, product: &ProductDescriptor) -> Option<String> {
        Some(format!(
            "{}/products/{}",
            self.sentinel2_url,
            product.relative_path()?
        ))
    }

    /// `tiles/.../{y}/{m}/{d}/0/` for a granule.
    fn tile_dir(&self, product: &ProductDescriptor, granule: &GranuleRef) -> Option<String> {
        let tile = crate::descriptor::granule_tile(&granule.granule_id)?;
        let date = product.relative_path()?;
        // relative_path is `y/m/d/name/`
        let date_part: Vec<&str> = date.splitn(4, '/').take(3).collect();
        Some(format!(
            "{}/{}{}/0/",
            self.sentinel2_url,
            tile_prefix(&tile)?,
            date_part.join("/")
        ))
    }

    /// Bucket name of a mask referenced in granule metadata.
    fn mask_name(mask: &str) -> String {
        match legacy_mask_pattern().captures(mask) {
            Some(c) => format!("{}_{}.gml", &c[1], &c[2]),
            None => mask.to_string(),
        }
    }
}

impl RemoteLayout for AwsLayout {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn product_metadata(&self, product: &ProductDescriptor) -> Option<String> {
        match product.sensor() {
            Sensor::Sentinel2 => Some(format!("{}metadata.xml", self.product_dir(product)?)),
            Sensor::Landsat8 => self.flat_file(product, &product.metadata_file_name()?),
        }
    }

    fn datastrip_metadata(&self, product: &ProductDescriptor, _datastrip_id: &str) -> Option<String> {
        (product.sensor() == Sensor::Sentinel2)
            .then(|| self.product_dir(product))
            .flatten()
            .map(|dir| format!("{}datastrip/0/metadata.xml", dir))
    }

    fn granule_metadata(&self, product: &ProductDescriptor, granule: &GranuleRef) -> Option<String> {
        Some(format!("{}metadata.xml", self.tile_dir(product, granule)?))
    }

    fn band(&self, product: &ProductDescriptor, granule: &GranuleRef, band: &str) -> Option<String> {
        Some(format!("{}{}.jp2", self.tile_dir(product, granule)?, band))
    }

    fn mask(&self, product: &ProductDescriptor, granule: &GranuleRef, mask: &str) -> Option<String> {
        Some(format!(
            "{}qi/{}",
            self.tile_dir(product, granule)?,
            Self::mask_name(mask)
        ))
    }

    fn aux(&self, product: &ProductDescriptor, granule: &GranuleRef) -> Option<String> {
        Some(format!("{}auxiliary/ECMWFT", self.tile_dir(product, granule)?))
    }

    fn flat_file(&self, product: &ProductDescriptor, file_name: &str) -> Option<String> {
        (product.sensor() == Sensor::Landsat8)
            .then(|| product.relative_path())
            .flatten()
            .map(|dir| format!("{}/{}{}", self.landsat8_url, dir, file_name))
    }
}

/// OData layout of a hierarchical catalog such as SciHub.
///
/// Every address starts at `Products('{uuid}')`, so products without a
/// catalog id cannot be addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ODataLayout {
    service_url: String,
}

impl ODataLayout {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// `Products('{uuid}')`
    fn product_root(&self, product: &ProductDescriptor) -> Option<ODataPath> {
        Some(ODataPath::product(&self.service_url, product.id()?))
    }

    /// `Products('{uuid}')/Nodes('{name}.SAFE')`
    fn safe_root(&self, product: &ProductDescriptor) -> Option<ODataPath> {
        Some(self.product_root(product)?.node(&product.product_folder()))
    }

    fn granule_root(&self, product: &ProductDescriptor, granule: &GranuleRef) -> Option<ODataPath> {
        Some(self.safe_root(product)?.nodes([GRANULE_DIR, granule.folder.as_str()]))
    }

    /// OData query resolving a product name to its catalog id.
    pub fn lookup_url(&self, name: &str) -> String {
        format!(
            "{}/Products?$filter=Name%20eq%20'{}'&$select=Id&$format=json",
            self.service_url, name
        )
    }
}

impl RemoteLayout for ODataLayout {
    fn name(&self) -> &'static str {
        "scihub"
    }

    fn product_metadata(&self, product: &ProductDescriptor) -> Option<String> {
        Some(
            self.safe_root(product)?
                .node(&product.metadata_file_name()?)
                .value(),
        )
    }

    fn datastrip_metadata(&self, product: &ProductDescriptor, datastrip_id: &str) -> Option<String> {
        let folder = product.datastrip_folder(datastrip_id)?;
        let file = product.datastrip_metadata_file_name(datastrip_id)?;
        Some(
            self.safe_root(product)?
                .nodes([DATASTRIP_DIR, folder.as_str(), file.as_str()])
                .value(),
        )
    }

    fn granule_metadata(&self, product: &ProductDescriptor, granule: &GranuleRef) -> Option<String> {
        let file = product.granule_metadata_file_name(&granule.granule_id)?;
        Some(self.granule_root(product, granule)?.node(&file).value())
    }

    fn band(&self, product: &ProductDescriptor, granule: &GranuleRef, band: &str) -> Option<String> {
        let file = product.band_file_name(&granule.granule_id, band)?;
        Some(
            self.granule_root(product, granule)?
                .nodes([IMG_DATA_DIR, file.as_str()])
                .value(),
        )
    }

    fn mask(&self, product: &ProductDescriptor, granule: &GranuleRef, mask: &str) -> Option<String> {
        Some(
            self.granule_root(product, granule)?
                .nodes([QI_DATA_DIR, mask])
                .value(),
        )
    }

    fn aux(&self, product: &ProductDescriptor, granule: &GranuleRef) -> Option<String> {
        let file = product.aux_file_name(&granule.granule_id)?;
        Some(
            self.granule_root(product, granule)?
                .nodes([AUX_DATA_DIR, file.as_str()])
                .value(),
        )
    }

    fn archive(&self, product: &ProductDescriptor) -> Option<String> {
        Some(self.product_root(product)?.value())
    }
}
