//! The naming-grammar strategy shared by every mission and schema generation.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::platform::{PlatformType, SchemaVersion, Sensor};

/// Suffix of the SAFE archive format, optionally present on catalog names.
pub const SAFE_SUFFIX: &str = ".SAFE";

/// One product-naming convention.
///
/// Each implementation owns the regular grammar of a mission/schema pair and
/// every rule that derives a file or folder name from a matched name. A
/// [`ProductDescriptor`](super::ProductDescriptor) keeps a reference to the
/// grammar that matched at construction and delegates all derivations here,
/// so no accessor ever branches on the schema version itself.
///
/// All `name` arguments are already stripped of the [`SAFE_SUFFIX`].
/// Derivations that do not exist for a convention return `None`.
pub trait NameGrammar: Send + Sync + fmt::Debug {
    fn sensor(&self) -> Sensor;

    fn version(&self) -> SchemaVersion;

    /// The anchored pattern a full product name must match.
    fn pattern(&self) -> &'static Regex;

    fn matches(&self, name: &str) -> bool {
        self.pattern().is_match(name)
    }

    fn platform(&self, name: &str) -> Option<PlatformType>;

    /// Sensing start as `yyyyMMdd` (and `THHmmss` when the name carries it).
    fn sensing_token(&self, name: &str) -> Option<String>;

    /// Relative path of the product inside a date- or path/row-partitioned store.
    fn relative_path(&self, name: &str) -> Option<String>;

    /// Name of the directory the product is assembled into.
    fn product_folder(&self, name: &str) -> String;

    fn metadata_file_name(&self, name: &str) -> Option<String>;

    fn relative_orbit(&self, name: &str) -> Option<u32>;

    /// Tile identifier without the leading `T` (e.g. `35TLK`).
    fn tile_id(&self, _name: &str) -> Option<String> {
        None
    }

    fn datastrip_folder(&self, _name: &str, _datastrip_id: &str) -> Option<String> {
        None
    }

    fn datastrip_metadata_file_name(&self, _name: &str, _datastrip_id: &str) -> Option<String> {
        None
    }

    fn granule_folder(&self, _name: &str, _datastrip_id: &str, _granule_id: &str) -> Option<String> {
        None
    }

    fn granule_metadata_file_name(&self, _name: &str, _granule_id: &str) -> Option<String> {
        None
    }

    fn band_file_name(&self, name: &str, granule_id: &str, band: &str) -> Option<String>;

    fn aux_file_name(&self, _name: &str, _granule_id: &str) -> Option<String> {
        None
    }

    /// Every band the mission delivers, in canonical form.
    fn band_names(&self) -> &'static [&'static str];

    /// Normalize a user-supplied band name to the canonical form, or `None`
    /// if the mission has no such band.
    fn canonical_band(&self, band: &str) -> Option<String>;
}

/// Remove the optional archive suffix from a catalog name.
pub fn strip_safe_suffix(name: &str) -> &str {
    name.strip_suffix(SAFE_SUFFIX).unwrap_or(name)
}

/// Capture group `index` of `pattern` against `text`, as an owned string.
pub(crate) fn capture(pattern: &Regex, text: &str, index: usize) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(index))
        .map(|m| m.as_str().to_string())
}

fn granule_tile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"_T(\d{2}[A-Z]{3})(?:_|$)").unwrap())
}

/// Extract the tile identifier (without `T`) embedded in a granule id.
pub fn granule_tile(granule_id: &str) -> Option<String> {
    capture(granule_tile_pattern(), granule_id, 1)
}

/// Normalize a tile id given by a user or a tile index: `T35TLK`, `35tlk`
/// and `35TLK` all become `35TLK`.
pub fn normalize_tile(tile: &str) -> String {
    let upper = tile.trim().to_uppercase();
    match upper.strip_prefix('T') {
        Some(rest) if rest.len() == 5 && rest.starts_with(|c: char| c.is_ascii_digit()) => {
            rest.to_string()
        }
        _ => upper,
    }
}

/// Remove a trailing processing-baseline token (`_N02.04`) from an id.
pub(crate) fn strip_baseline(id: &str) -> &str {
    match id.rfind("_N") {
        Some(pos) if id[pos + 2..].chars().all(|c| c.is_ascii_digit() || c == '.') => &id[..pos],
        _ => id,
    }
}

/// Drop leading zeros of a numeric path segment (`07` -> `7`).
pub(crate) fn unpad(segment: &str) -> String {
    let trimmed = segment.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
