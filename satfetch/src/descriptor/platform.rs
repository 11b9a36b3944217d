//! Mission, platform and schema enumerations derived from product names.

use std::fmt;

/// Mission a product belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    /// Sentinel-2 MSI (L1C/L2A).
    Sentinel2,
    /// Landsat-8 OLI/TIRS.
    Landsat8,
}

impl Sensor {
    /// Short lowercase name used in config keys and log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Sensor::Sentinel2 => "sentinel2",
            Sensor::Landsat8 => "landsat8",
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Individual satellite of a mission, taken from the name's platform token.
///
/// Backends use this to decide whether they are intended to serve a product;
/// for instance one catalog may only host S2B acquisitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlatformType {
    S2A,
    S2B,
    L8,
}

impl PlatformType {
    /// Parse a platform token (`S2A`, `S2B`, `LC8`, `LC08`, ...).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "S2A" => Some(PlatformType::S2A),
            "S2B" => Some(PlatformType::S2B),
            t if t.starts_with('L') && (t.ends_with('8') || t.ends_with("08")) => {
                Some(PlatformType::L8)
            }
            _ => None,
        }
    }

    pub fn sensor(&self) -> Sensor {
        match self {
            PlatformType::S2A | PlatformType::S2B => Sensor::Sentinel2,
            PlatformType::L8 => Sensor::Landsat8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::S2A => "S2A",
            PlatformType::S2B => "S2B",
            PlatformType::L8 => "L8",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlatformType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "L8" => Ok(PlatformType::L8),
            other => {
                PlatformType::from_token(other).ok_or_else(|| format!("unknown platform: {}", s))
            }
        }
    }
}

/// Generation of the naming convention a product name was matched against.
///
/// Sentinel-2 products created before December 2016 use the long
/// fixed-token names (`S2A_OPER_PRD_MSIL1C_PDMC_...`); later products use
/// the compact underscore-delimited form (`S2A_MSIL1C_..._T35TLK_...`).
/// For Landsat-8 the legacy generation is the pre-collection scene id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    Legacy,
    Modern,
}
