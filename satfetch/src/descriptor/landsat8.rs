//! Landsat-8 scene identifiers.
//!
//! Pre-collection scene ids pack every token into a fixed-width string
//! (`LC81830292017181LGN00`: sensor, WRS path, WRS row, year, day of year,
//! ground station, archive version). Collection-1 product ids are
//! underscore-delimited (`LC08_L1TP_183029_20170630_20170715_01_T1`).
//!
//! Landsat products have no granules or datastrips; all files live flat in
//! one folder named after the scene.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use super::grammar::{capture, NameGrammar};
use super::platform::{PlatformType, SchemaVersion, Sensor};

/// Canonical Landsat-8 band names as used in file names.
pub const LANDSAT8_BANDS: &[&str] = &[
    "B1", "B2", "B3", "B4", "B5", "B6", "B7", "B8", "B9", "B10", "B11", "BQA",
];

fn pre_collection_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(L[COT]8)(\d{3})(\d{3})(\d{4})(\d{3})([A-Z]{3})(\d{2})$").unwrap()
    })
}

fn collection1_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(L[COT]08)_(L1TP|L1GT|L1GS)_(\d{3})(\d{3})_(\d{8})_(\d{8})_(\d{2})_(RT|T1|T2)$",
        )
        .unwrap()
    })
}

/// Normalize a Landsat band name: `B01` -> `B1`, `qa` -> `BQA`.
pub fn normalize_band(band: &str) -> Option<String> {
    let upper = band.trim().to_uppercase();
    let token = upper.strip_prefix('B').unwrap_or(&upper);
    if token == "QA" {
        return Some("BQA".to_string());
    }
    let number: u8 = token.parse().ok()?;
    (1..=11).contains(&number).then(|| format!("B{}", number))
}

fn scene_file(name: &str, band: &str) -> Option<String> {
    normalize_band(band).map(|b| format!("{}_{}.TIF", name, b))
}

/// `LC81830292017181LGN00`-style scene ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct Landsat8PreCollection;

impl NameGrammar for Landsat8PreCollection {
    fn sensor(&self) -> Sensor {
        Sensor::Landsat8
    }

    fn version(&self) -> SchemaVersion {
        SchemaVersion::Legacy
    }

    fn pattern(&self) -> &'static Regex {
        pre_collection_pattern()
    }

    fn platform(&self, name: &str) -> Option<PlatformType> {
        capture(pre_collection_pattern(), name, 1).and_then(|t| PlatformType::from_token(&t))
    }

    fn sensing_token(&self, name: &str) -> Option<String> {
        let captures = pre_collection_pattern().captures(name)?;
        let year: i32 = captures[4].parse().ok()?;
        let day_of_year: u32 = captures[5].parse().ok()?;
        NaiveDate::from_yo_opt(year, day_of_year).map(|d| d.format("%Y%m%d").to_string())
    }

    fn relative_path(&self, name: &str) -> Option<String> {
        let captures = pre_collection_pattern().captures(name)?;
        Some(format!("L8/{}/{}/{}/", &captures[2], &captures[3], name))
    }

    fn product_folder(&self, name: &str) -> String {
        name.to_string()
    }

    fn metadata_file_name(&self, name: &str) -> Option<String> {
        self.matches(name).then(|| format!("{}_MTL.txt", name))
    }

    fn relative_orbit(&self, name: &str) -> Option<u32> {
        capture(pre_collection_pattern(), name, 2).and_then(|p| p.parse().ok())
    }

    fn band_file_name(&self, name: &str, _granule_id: &str, band: &str) -> Option<String> {
        scene_file(name, band)
    }

    fn aux_file_name(&self, name: &str, _granule_id: &str) -> Option<String> {
        Some(format!("{}_ANG.txt", name))
    }

    fn band_names(&self) -> &'static [&'static str] {
        LANDSAT8_BANDS
    }

    fn canonical_band(&self, band: &str) -> Option<String> {
        normalize_band(band)
    }
}

/// `LC08_L1TP_183029_20170630_20170715_01_T1`-style product ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct Landsat8Collection1;

impl NameGrammar for Landsat8Collection1 {
    fn sensor(&self) -> Sensor {
        Sensor::Landsat8
    }

    fn version(&self) -> SchemaVersion {
        SchemaVersion::Modern
    }

    fn pattern(&self) -> &'static Regex {
        collection1_pattern()
    }

    fn platform(&self, name: &str) -> Option<PlatformType> {
        capture(collection1_pattern(), name, 1).and_then(|t| PlatformType::from_token(&t))
    }

    fn sensing_token(&self, name: &str) -> Option<String> {
        capture(collection1_pattern(), name, 5)
    }

    fn relative_path(&self, name: &str) -> Option<String> {
        let captures = collection1_pattern().captures(name)?;
        Some(format!("c1/L8/{}/{}/{}/", &captures[3], &captures[4], name))
    }

    fn product_folder(&self, name: &str) -> String {
        name.to_string()
    }

    fn metadata_file_name(&self, name: &str) -> Option<String> {
        self.matches(name).then(|| format!("{}_MTL.txt", name))
    }

    fn relative_orbit(&self, name: &str) -> Option<u32> {
        capture(collection1_pattern(), name, 3).and_then(|p| p.parse().ok())
    }

    fn band_file_name(&self, name: &str, _granule_id: &str, band: &str) -> Option<String> {
        scene_file(name, band)
    }

    fn aux_file_name(&self, name: &str, _granule_id: &str) -> Option<String> {
        Some(format!("{}_ANG.txt", name))
    }

    fn band_names(&self) -> &'static [&'static str] {
        LANDSAT8_BANDS
    }

    fn canonical_band(&self, band: &str) -> Option<String> {
        normalize_band(band)
    }
}
