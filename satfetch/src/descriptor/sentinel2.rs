//! Sentinel-2 naming conventions.
//!
//! # Legacy (before December 2016)
//!
//! ```text
//! S2A_OPER_PRD_MSIL1C_PDMC_20160716T140931_R036_V20160716T091532_20160716T091532
//! ```
//!
//! Granule and datastrip folders carry the full identifier from the product
//! metadata and every internal file repeats most of it.
//!
//! # Modern (compact)
//!
//! ```text
//! S2A_MSIL1C_20170703T092031_N0205_R093_T35TLK_20170703T092030
//! ```
//!
//! Internal files use short fixed names (`MTD_MSIL1C.xml`, `MTD_TL.xml`) and
//! granule folders are rebuilt from tokens of the granule and datastrip ids.

use std::sync::OnceLock;

use regex::Regex;

use super::grammar::{capture, granule_tile, strip_baseline, unpad, NameGrammar};
use super::platform::{PlatformType, SchemaVersion, Sensor};

/// Canonical Sentinel-2 MSI band names.
pub const SENTINEL2_BANDS: &[&str] = &[
    "B01", "B02", "B03", "B04", "B05", "B06", "B07", "B08", "B8A", "B09", "B10", "B11", "B12",
];

fn legacy_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(S2[AB])_(OPER)_(PRD)_(MSIL1C)_(PDMC)_(\d{8}T\d{6})_R(\d{3})_V(\d{8}T\d{6})_(\d{8}T\d{6})$",
        )
        .unwrap()
    })
}

fn modern_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(S2[AB])_(MSIL1C|MSIL2A)_(\d{8}T\d{6})_(N\d{4})_R(\d{3})_T(\d{2}[A-Z]{3})_(\d{8}T\d{6})$",
        )
        .unwrap()
    })
}

/// Datastrip identifier as listed in the product metadata:
/// `S2B_OPER_MSI_L1C_DS_SGS__20171226T121459_S20171226T101411_N02.06`.
fn datastrip_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"_DS_([A-Z0-9_]{4})_(\d{8}T\d{6})_S(\d{8}T\d{6})(?:_N\d{2}\.\d{2})?$").unwrap()
    })
}

/// Absolute orbit token of a granule id (`A004214`).
fn absolute_orbit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"_(A\d{6})_").unwrap())
}

/// Normalize a Sentinel-2 band name: `B1` -> `B01`, `b8a` -> `B8A`.
pub fn normalize_band(band: &str) -> Option<String> {
    let upper = band.trim().to_uppercase();
    let digits = upper.strip_prefix('B').unwrap_or(&upper);
    let canonical = if digits == "8A" {
        "B8A".to_string()
    } else {
        let number: u8 = digits.parse().ok()?;
        format!("B{:02}", number)
    };
    SENTINEL2_BANDS
        .contains(&canonical.as_str())
        .then_some(canonical)
}

/// `yyyy/M/d/` from a `yyyyMMdd...` token, without zero padding.
fn date_path(token: &str) -> Option<String> {
    if token.len() < 8 || !token[..8].chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!(
        "{}/{}/{}",
        &token[..4],
        unpad(&token[4..6]),
        unpad(&token[6..8])
    ))
}

/// Pre-December-2016 long names.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sentinel2Legacy;

impl NameGrammar for Sentinel2Legacy {
    fn sensor(&self) -> Sensor {
        Sensor::Sentinel2
    }

    fn version(&self) -> SchemaVersion {
        SchemaVersion::Legacy
    }

    fn pattern(&self) -> &'static Regex {
        legacy_pattern()
    }

    fn platform(&self, name: &str) -> Option<PlatformType> {
        capture(legacy_pattern(), name, 1).and_then(|t| PlatformType::from_token(&t))
    }

    fn sensing_token(&self, name: &str) -> Option<String> {
        capture(legacy_pattern(), name, 8)
    }

    fn relative_path(&self, name: &str) -> Option<String> {
        let sensing = self.sensing_token(name)?;
        Some(format!("{}/{}/", date_path(&sensing)?, name))
    }

    fn product_folder(&self, name: &str) -> String {
        format!("{}.SAFE", name)
    }

    fn metadata_file_name(&self, name: &str) -> Option<String> {
        self.matches(name)
            .then(|| format!("{}.xml", name.replace("PRD_MSIL1C", "MTD_SAFL1C")))
    }

    fn relative_orbit(&self, name: &str) -> Option<u32> {
        capture(legacy_pattern(), name, 7).and_then(|o| o.parse().ok())
    }

    fn datastrip_folder(&self, _name: &str, datastrip_id: &str) -> Option<String> {
        Some(datastrip_id.to_string())
    }

    fn datastrip_metadata_file_name(&self, _name: &str, datastrip_id: &str) -> Option<String> {
        Some(format!(
            "{}.xml",
            strip_baseline(datastrip_id).replace("_MSI_", "_MTD_")
        ))
    }

    fn granule_folder(&self, _name: &str, _datastrip_id: &str, granule_id: &str) -> Option<String> {
        Some(granule_id.to_string())
    }

    fn granule_metadata_file_name(&self, _name: &str, granule_id: &str) -> Option<String> {
        Some(format!(
            "{}.xml",
            strip_baseline(granule_id).replace("_MSI_", "_MTD_")
        ))
    }

    fn band_file_name(&self, _name: &str, granule_id: &str, band: &str) -> Option<String> {
        let band = normalize_band(band)?;
        Some(format!("{}_{}.jp2", strip_baseline(granule_id), band))
    }

    fn aux_file_name(&self, _name: &str, granule_id: &str) -> Option<String> {
        Some(strip_baseline(granule_id).replace("_MSI_L1C_TL_", "_AUX_ECMWFT_"))
    }

    fn band_names(&self) -> &'static [&'static str] {
        SENTINEL2_BANDS
    }

    fn canonical_band(&self, band: &str) -> Option<String> {
        normalize_band(band)
    }
}

/// Compact names introduced in December 2016.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sentinel2Modern;

impl Sentinel2Modern {
    /// Processing level (`L1C` or `L2A`) from the product type token.
    fn level(name: &str) -> Option<String> {
        capture(modern_pattern(), name, 2).map(|t| t.trim_start_matches("MSI").to_string())
    }
}

impl NameGrammar for Sentinel2Modern {
    fn sensor(&self) -> Sensor {
        Sensor::Sentinel2
    }

    fn version(&self) -> SchemaVersion {
        SchemaVersion::Modern
    }

    fn pattern(&self) -> &'static Regex {
        modern_pattern()
    }

    fn platform(&self, name: &str) -> Option<PlatformType> {
        capture(modern_pattern(), name, 1).and_then(|t| PlatformType::from_token(&t))
    }

    fn sensing_token(&self, name: &str) -> Option<String> {
        capture(modern_pattern(), name, 3)
    }

    fn relative_path(&self, name: &str) -> Option<String> {
        let sensing = self.sensing_token(name)?;
        Some(format!("{}/{}/", date_path(&sensing)?, name))
    }

    fn product_folder(&self, name: &str) -> String {
        format!("{}.SAFE", name)
    }

    fn metadata_file_name(&self, name: &str) -> Option<String> {
        capture(modern_pattern(), name, 2).map(|t| format!("MTD_{}.xml", t))
    }

    fn relative_orbit(&self, name: &str) -> Option<u32> {
        capture(modern_pattern(), name, 5).and_then(|o| o.parse().ok())
    }

    fn tile_id(&self, name: &str) -> Option<String> {
        capture(modern_pattern(), name, 6)
    }

    fn datastrip_folder(&self, _name: &str, datastrip_id: &str) -> Option<String> {
        let captures = datastrip_pattern().captures(datastrip_id)?;
        Some(format!(
            "DS_{}_{}_S{}",
            captures[1].trim_end_matches('_'),
            &captures[2],
            &captures[3]
        ))
    }

    fn datastrip_metadata_file_name(&self, _name: &str, _datastrip_id: &str) -> Option<String> {
        Some("MTD_DS.xml".to_string())
    }

    fn granule_folder(&self, name: &str, datastrip_id: &str, granule_id: &str) -> Option<String> {
        let level = Self::level(name)?;
        let tile = granule_tile(granule_id)?;
        let orbit = capture(absolute_orbit_pattern(), granule_id, 1)?;
        let datastrip_sensing = capture(datastrip_pattern(), datastrip_id, 3)?;
        Some(format!("{}_T{}_{}_{}", level, tile, orbit, datastrip_sensing))
    }

    fn granule_metadata_file_name(&self, _name: &str, _granule_id: &str) -> Option<String> {
        Some("MTD_TL.xml".to_string())
    }

    fn band_file_name(&self, name: &str, granule_id: &str, band: &str) -> Option<String> {
        let tile = granule_tile(granule_id)?;
        let sensing = self.sensing_token(name)?;
        let band = normalize_band(band)?;
        Some(format!("T{}_{}_{}.jp2", tile, sensing, band))
    }

    fn aux_file_name(&self, _name: &str, _granule_id: &str) -> Option<String> {
        Some("AUX_ECMWFT".to_string())
    }

    fn band_names(&self) -> &'static [&'static str] {
        SENTINEL2_BANDS
    }

    fn canonical_band(&self, band: &str) -> Option<String> {
        normalize_band(band)
    }
}
