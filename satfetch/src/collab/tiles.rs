//! Tile-grid lookup for areas of interest.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::descriptor::normalize_tile;
use crate::geo::Rect;

/// Errors loading a tile table.
#[derive(Debug, Error)]
pub enum TileIndexError {
    #[error("failed to read tile table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Maps areas of interest to tile identifiers and back.
pub trait TileIndex: Send + Sync {
    /// Tiles whose footprint intersects `area`.
    fn intersecting(&self, area: &Rect) -> BTreeSet<String>;

    /// Rectangle covering every known tile of `tiles`, or `None` when none is known.
    fn bounding_box(&self, tiles: &BTreeSet<String>) -> Option<Rect>;
}

/// Tile index backed by a whitespace-separated table.
///
/// Each non-empty, non-`#` line reads `TILE MINLON MINLAT MAXLON MAXLAT`.
#[derive(Debug, Clone, Default)]
pub struct TableTileIndex {
    tiles: BTreeMap<String, Rect>,
}

impl TableTileIndex {
    pub fn parse(table: &str) -> Result<Self, TileIndexError> {
        let mut tiles = BTreeMap::new();
        for (index, raw) in table.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 5 {
                return Err(TileIndexError::Parse {
                    line: index + 1,
                    reason: format!("expected 5 fields, got {}", fields.len()),
                });
            }

            let coords = fields[1..]
                .iter()
                .map(|f| f.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| TileIndexError::Parse {
                    line: index + 1,
                    reason: e.to_string(),
                })?;

            tiles.insert(
                normalize_tile(fields[0]),
                Rect::new(coords[0], coords[1], coords[2], coords[3]),
            );
        }
        Ok(Self { tiles })
    }

    pub fn load(path: &Path) -> Result<Self, TileIndexError> {
        let table = fs::read_to_string(path).map_err(|e| TileIndexError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&table)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl TileIndex for TableTileIndex {
    fn intersecting(&self, area: &Rect) -> BTreeSet<String> {
        self.tiles
            .iter()
            .filter(|(_, rect)| rect.intersects(area))
            .map(|(tile, _)| tile.clone())
            .collect()
    }

    fn bounding_box(&self, tiles: &BTreeSet<String>) -> Option<Rect> {
        tiles
            .iter()
            .filter_map(|tile| self.tiles.get(&normalize_tile(tile)))
            .copied()
            .reduce(|acc, rect| acc.union(&rect))
    }
}
