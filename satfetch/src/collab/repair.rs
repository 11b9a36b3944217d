//! Granule metadata repair hook.
//!
//! The angle-grid repair itself lives outside this crate. The orchestrator
//! calls a [`MetadataRepair`] once per downloaded granule metadata file and
//! uses the returned lines to locate the granule's quality masks.

use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

/// How missing viewing-angle values are repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairMode {
    /// Leave the file untouched.
    #[default]
    None,
    /// Replace missing values with NaN.
    Nan,
    /// Interpolate missing values from neighbors.
    Interpolate,
}

impl RepairMode {
    pub fn name(&self) -> &'static str {
        match self {
            RepairMode::None => "none",
            RepairMode::Nan => "nan",
            RepairMode::Interpolate => "interpolate",
        }
    }
}

impl FromStr for RepairMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(RepairMode::None),
            "nan" => Ok(RepairMode::Nan),
            "interpolate" => Ok(RepairMode::Interpolate),
            other => Err(format!("unknown repair mode: {}", other)),
        }
    }
}

/// Service that corrects a granule metadata file.
///
/// Implementations may rewrite the file in place (keeping a backup) and
/// return the corrected content line by line.
pub trait MetadataRepair: Send + Sync {
    fn repair(&self, metadata: &Path, mode: RepairMode) -> io::Result<Vec<String>>;

    /// Whether `mode` actually changes anything with this implementation.
    fn supports(&self, _mode: RepairMode) -> bool {
        true
    }
}

/// Returns the file's lines unchanged, whatever the mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughRepair;

impl MetadataRepair for PassThroughRepair {
    fn repair(&self, metadata: &Path, _mode: RepairMode) -> io::Result<Vec<String>> {
        Ok(fs::read_to_string(metadata)?
            .lines()
            .map(str::to_string)
            .collect())
    }

    fn supports(&self, mode: RepairMode) -> bool {
        mode == RepairMode::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_repair_mode_parse() {
        assert_eq!("NaN".parse(), Ok(RepairMode::Nan));
        assert_eq!("interpolate".parse(), Ok(RepairMode::Interpolate));
        assert!("fix".parse::<RepairMode>().is_err());
    }

    #[test]
    fn test_pass_through_reads_lines() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "<a>\n<b/>\n</a>\n").unwrap();

        let lines = PassThroughRepair.repair(file.path(), RepairMode::Nan).unwrap();
        assert_eq!(lines, vec!["<a>", "<b/>", "</a>"]);
    }

    #[test]
    fn test_pass_through_supports_only_none() {
        assert!(PassThroughRepair.supports(RepairMode::None));
        assert!(!PassThroughRepair.supports(RepairMode::Nan));
        assert!(!PassThroughRepair.supports(RepairMode::Interpolate));
    }
}
