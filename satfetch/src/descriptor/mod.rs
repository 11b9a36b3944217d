//! Product descriptors and the naming grammars behind them.
//!
//! A [`ProductDescriptor`] is built from a raw catalog name. Construction
//! tries every known [`NameGrammar`] in turn and keeps the one that matched;
//! a name no grammar accepts yields [`DescriptorError::InvalidName`] and no
//! descriptor. Every derived attribute (sensing date, relative path,
//! internal file names) is recomputed from the stored name on each call.
//!
//! # Example
//!
//! ```
//! use satfetch::descriptor::{ProductDescriptor, SchemaVersion};
//!
//! let product = ProductDescriptor::parse(
//!     "S2A_MSIL1C_20170703T092031_N0205_R093_T35TLK_20170703T092030.SAFE",
//! ).unwrap();
//! assert_eq!(product.version(), SchemaVersion::Modern);
//! assert_eq!(product.metadata_file_name().as_deref(), Some("MTD_MSIL1C.xml"));
//! assert!(product.relative_path().unwrap().starts_with("2017/7/3/"));
//! ```

mod grammar;
mod landsat8;
mod platform;
mod sentinel2;

pub use grammar::{granule_tile, normalize_tile, strip_safe_suffix, NameGrammar, SAFE_SUFFIX};
pub use landsat8::{Landsat8Collection1, Landsat8PreCollection, LANDSAT8_BANDS};
pub use platform::{PlatformType, SchemaVersion, Sensor};
pub use sentinel2::{Sentinel2Legacy, Sentinel2Modern, SENTINEL2_BANDS};

use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while building descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// The name matched none of the known grammars.
    #[error("invalid product name: {0}")]
    InvalidName(String),

    /// Names and catalog ids were supplied as lists of different length.
    #[error("got {names} product names but {ids} product ids")]
    MismatchedLists { names: usize, ids: usize },
}

/// Every grammar a name is tried against, in order.
fn grammars() -> [&'static dyn NameGrammar; 4] {
    [
        &Sentinel2Modern,
        &Sentinel2Legacy,
        &Landsat8Collection1,
        &Landsat8PreCollection,
    ]
}

/// A validated catalog product.
#[derive(Clone)]
pub struct ProductDescriptor {
    name: String,
    grammar: &'static dyn NameGrammar,
    id: Option<String>,
    clouds_percentage: Option<f64>,
}

impl ProductDescriptor {
    /// Validate `name` against the known grammars.
    ///
    /// A trailing `.SAFE` is accepted and stripped. The sensing token must
    /// be a real calendar day.
    pub fn parse(name: &str) -> Result<Self, DescriptorError> {
        let stripped = strip_safe_suffix(name.trim());
        grammars()
            .into_iter()
            .find(|g| g.matches(stripped))
            .map(|grammar| Self {
                name: stripped.to_string(),
                grammar,
                id: None,
                clouds_percentage: None,
            })
            .filter(|descriptor| descriptor.sensing_date().is_some())
            .ok_or_else(|| DescriptorError::InvalidName(name.to_string()))
    }

    /// Build descriptors from parallel lists of names and catalog UUIDs.
    ///
    /// An empty `ids` list means no UUIDs are known. Otherwise both lists
    /// must have the same length; the check happens before any name is
    /// parsed so a malformed request fails without side effects.
    pub fn from_names_and_ids(names: &[String], ids: &[String]) -> Result<Vec<Self>, DescriptorError> {
        if !ids.is_empty() && ids.len() != names.len() {
            return Err(DescriptorError::MismatchedLists {
                names: names.len(),
                ids: ids.len(),
            });
        }

        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let descriptor = Self::parse(name)?;
                Ok(match ids.get(i) {
                    Some(id) => descriptor.with_id(id.clone()),
                    None => descriptor,
                })
            })
            .collect()
    }

    /// Attach the catalog UUID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach the cloud coverage reported by a catalog.
    pub fn with_clouds_percentage(mut self, clouds: f64) -> Self {
        self.clouds_percentage = Some(clouds);
        self
    }

    /// The catalog name without any `.SAFE` suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn clouds_percentage(&self) -> Option<f64> {
        self.clouds_percentage
    }

    pub fn grammar(&self) -> &'static dyn NameGrammar {
        self.grammar
    }

    pub fn version(&self) -> SchemaVersion {
        self.grammar.version()
    }

    pub fn sensor(&self) -> Sensor {
        self.grammar.sensor()
    }

    pub fn platform(&self) -> Option<PlatformType> {
        self.grammar.platform(&self.name)
    }

    /// Sensing start token (`20170703T092031`, or `20170630` for Landsat).
    pub fn sensing_token(&self) -> Option<String> {
        self.grammar.sensing_token(&self.name)
    }

    /// Sensing day derived from the name.
    pub fn sensing_date(&self) -> Option<NaiveDate> {
        let token = self.sensing_token()?;
        NaiveDate::parse_from_str(token.get(..8)?, "%Y%m%d").ok()
    }

    /// `year/month/day/name/` for Sentinel-2 (no zero padding),
    /// `[c1/]L8/path/row/name/` for Landsat-8.
    pub fn relative_path(&self) -> Option<String> {
        self.grammar.relative_path(&self.name)
    }

    /// Destination directory name (`<name>.SAFE` for Sentinel-2).
    pub fn product_folder(&self) -> String {
        self.grammar.product_folder(&self.name)
    }

    pub fn relative_orbit(&self) -> Option<u32> {
        self.grammar.relative_orbit(&self.name)
    }

    pub fn tile_id(&self) -> Option<String> {
        self.grammar.tile_id(&self.name)
    }

    pub fn metadata_file_name(&self) -> Option<String> {
        self.grammar.metadata_file_name(&self.name)
    }

    pub fn datastrip_folder(&self, datastrip_id: &str) -> Option<String> {
        self.grammar.datastrip_folder(&self.name, datastrip_id)
    }

    pub fn datastrip_metadata_file_name(&self, datastrip_id: &str) -> Option<String> {
        self.grammar.datastrip_metadata_file_name(&self.name, datastrip_id)
    }

    pub fn granule_folder(&self, datastrip_id: &str, granule_id: &str) -> Option<String> {
        self.grammar.granule_folder(&self.name, datastrip_id, granule_id)
    }

    pub fn granule_metadata_file_name(&self, granule_id: &str) -> Option<String> {
        self.grammar.granule_metadata_file_name(&self.name, granule_id)
    }

    pub fn band_file_name(&self, granule_id: &str, band: &str) -> Option<String> {
        self.grammar.band_file_name(&self.name, granule_id, band)
    }

    pub fn aux_file_name(&self, granule_id: &str) -> Option<String> {
        self.grammar.aux_file_name(&self.name, granule_id)
    }

    pub fn band_names(&self) -> &'static [&'static str] {
        self.grammar.band_names()
    }

    pub fn canonical_band(&self, band: &str) -> Option<String> {
        self.grammar.canonical_band(band)
    }
}

impl fmt::Debug for ProductDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductDescriptor")
            .field("name", &self.name)
            .field("version", &self.version())
            .field("id", &self.id)
            .field("clouds_percentage", &self.clouds_percentage)
            .finish()
    }
}

impl fmt::Display for ProductDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq for ProductDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ProductDescriptor {}

impl std::str::FromStr for ProductDescriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
