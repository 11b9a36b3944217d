//! Interfaces to collaborators that live outside the download engine.

mod repair;
mod tiles;

pub use repair::{MetadataRepair, PassThroughRepair, RepairMode};
pub use tiles::{TableTileIndex, TileIndex, TileIndexError};
