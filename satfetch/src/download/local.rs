//! Local mirror backend.
//!
//! Mirrors keep products under `root/yyyy/mm/dd/<name>` (with or without a
//! `.SAFE` suffix, zero-padded or not). A product is materialized by copying
//! its tree, by linking the whole directory, or by recreating the directory
//! tree and linking only the files that pass the tile and band filters.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, info};

use crate::descriptor::{granule_tile, ProductDescriptor};
use crate::transfer::DownloadMode;

use super::error::{DownloadError, DownloadResult};
use super::safe::{GRANULE_DIR, IMG_DATA_DIR};

#[cfg(unix)]
fn link(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn link(source: &Path, target: &Path) -> io::Result<()> {
    if source.is_dir() {
        std::os::windows::fs::symlink_dir(source, target)
    } else {
        std::os::windows::fs::symlink_file(source, target)
    }
}

/// Which files of a mirrored product are linked in `FilteredSymlink` mode.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    /// Tiles to keep; empty keeps all.
    pub tiles: BTreeSet<String>,
    /// Canonical bands to keep; empty keeps all.
    pub bands: Vec<String>,
}

impl FileFilter {
    /// Whether `relative` (a path inside the product directory) is kept.
    pub fn accepts(&self, relative: &Path) -> bool {
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        if parts.first().map(String::as_str) != Some(GRANULE_DIR) {
            return true;
        }

        if let Some(granule) = parts.get(1).filter(|_| !self.tiles.is_empty()) {
            if !granule_tile(granule).is_some_and(|t| self.tiles.contains(&t)) {
                return false;
            }
        }

        let in_img_data = parts.len() > 3 && parts[2] == IMG_DATA_DIR;
        if in_img_data && !self.bands.is_empty() {
            let file = parts[parts.len() - 1].as_str();
            return self.bands.iter().any(|band| file.contains(band.as_str()));
        }

        true
    }
}

/// A date-partitioned directory of products.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the product inside the mirror.
    pub fn locate(&self, product: &ProductDescriptor) -> Option<PathBuf> {
        let date = product.sensing_date()?;
        let escaped_root = Pattern::escape(&self.root.to_string_lossy());
        let padded = date.format("%Y/%m/%d").to_string();
        let unpadded = date.format("%Y/%-m/%-d").to_string();

        for day in [padded, unpadded] {
            let pattern = format!("{}/{}/{}*", escaped_root, day, Pattern::escape(product.name()));
            debug!(pattern = %pattern, "Looking up local mirror");
            let Ok(paths) = glob::glob(&pattern) else {
                continue;
            };
            let found = paths.flatten().find(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n == product.name() || n == product.product_folder())
            });
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Materialize `product` into `target_dir` according to `mode`.
    ///
    /// Returns the created path. A product missing from the mirror is an
    /// empty product.
    pub fn materialize(
        &self,
        product: &ProductDescriptor,
        target_dir: &Path,
        mode: DownloadMode,
        filter: &FileFilter,
    ) -> DownloadResult<PathBuf> {
        let source = self
            .locate(product)
            .ok_or_else(|| DownloadError::empty(product.name(), "not in local mirror"))?;
        let destination = target_dir.join(product.product_folder());

        fs::create_dir_all(target_dir).map_err(|e| DownloadError::io(target_dir, e))?;
        remove_existing(&destination)?;

        info!(
            product = %product.name(),
            source = %source.display(),
            mode = %mode,
            "Materializing from local mirror"
        );

        match mode {
            DownloadMode::Symlink => {
                link(&source, &destination).map_err(|e| DownloadError::io(&destination, e))?;
            }
            DownloadMode::FilteredSymlink => {
                link_tree(&source, &source, &destination, filter)?;
            }
            DownloadMode::Copy | DownloadMode::Overwrite | DownloadMode::Resume => {
                copy_tree(&source, &destination)?;
            }
        }

        Ok(destination)
    }
}

/// Remove a previous result so the product is rebuilt from scratch.
fn remove_existing(path: &Path) -> DownloadResult<()> {
    let Ok(metadata) = path.symlink_metadata() else {
        return Ok(());
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| DownloadError::io(path, e))
}

fn copy_tree(source: &Path, destination: &Path) -> DownloadResult<()> {
    fs::create_dir_all(destination).map_err(|e| DownloadError::io(destination, e))?;
    let entries = fs::read_dir(source).map_err(|e| DownloadError::io(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DownloadError::io(source, e))?;
        let path = entry.path();
        let target = destination.join(entry.file_name());
        if path.is_dir() {
            copy_tree(&path, &target)?;
        } else {
            fs::copy(&path, &target).map_err(|e| DownloadError::io(&target, e))?;
        }
    }
    Ok(())
}

fn link_tree(
    product_root: &Path,
    source: &Path,
    destination: &Path,
    filter: &FileFilter,
) -> DownloadResult<()> {
    fs::create_dir_all(destination).map_err(|e| DownloadError::io(destination, e))?;
    let entries = fs::read_dir(source).map_err(|e| DownloadError::io(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DownloadError::io(source, e))?;
        let path = entry.path();
        let relative = path.strip_prefix(product_root).unwrap_or(&path);
        if !filter.accepts(relative) {
            debug!(path = %relative.display(), "Filtered out");
            continue;
        }
        let target = destination.join(entry.file_name());
        if path.is_dir() {
            link_tree(product_root, &path, &target, filter)?;
        } else {
            link(&path, &target).map_err(|e| DownloadError::io(&target, e))?;
        }
    }
    Ok(())
}
