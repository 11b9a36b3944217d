//! Local SAFE directory layout.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::{DownloadError, DownloadResult};

pub const GRANULE_DIR: &str = "GRANULE";
pub const DATASTRIP_DIR: &str = "DATASTRIP";
pub const AUX_DATA_DIR: &str = "AUX_DATA";
pub const IMG_DATA_DIR: &str = "IMG_DATA";
pub const QI_DATA_DIR: &str = "QI_DATA";

/// Paths inside one product's `<name>.SAFE` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeLayout {
    root: PathBuf,
}

impl SafeLayout {
    /// Layout rooted at `root`, the `<name>.SAFE` directory itself.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn aux_dir(&self) -> PathBuf {
        self.root.join(AUX_DATA_DIR)
    }

    pub fn datastrip_dir(&self, folder: &str) -> PathBuf {
        self.root.join(DATASTRIP_DIR).join(folder)
    }

    pub fn granule_dir(&self, folder: &str) -> PathBuf {
        self.root.join(GRANULE_DIR).join(folder)
    }

    pub fn granule_img_dir(&self, folder: &str) -> PathBuf {
        self.granule_dir(folder).join(IMG_DATA_DIR)
    }

    pub fn granule_qi_dir(&self, folder: &str) -> PathBuf {
        self.granule_dir(folder).join(QI_DATA_DIR)
    }

    pub fn granule_aux_dir(&self, folder: &str) -> PathBuf {
        self.granule_dir(folder).join(AUX_DATA_DIR)
    }

    /// Create the product-level directories.
    pub fn create_root(&self) -> DownloadResult<()> {
        for dir in [
            self.root.clone(),
            self.root.join(GRANULE_DIR),
            self.aux_dir(),
            self.root.join(DATASTRIP_DIR),
        ] {
            create_dir(&dir)?;
        }
        Ok(())
    }

    /// Create one granule's `AUX_DATA`, `IMG_DATA` and `QI_DATA`.
    pub fn create_granule(&self, folder: &str) -> DownloadResult<()> {
        for dir in [
            self.granule_aux_dir(folder),
            self.granule_img_dir(folder),
            self.granule_qi_dir(folder),
        ] {
            create_dir(&dir)?;
        }
        Ok(())
    }

    pub fn create_datastrip(&self, folder: &str) -> DownloadResult<()> {
        create_dir(&self.datastrip_dir(folder))
    }

    /// Build the whole skeleton for the given granule and datastrip folders.
    pub fn create_skeleton(&self, granules: &[String], datastrip: Option<&str>) -> DownloadResult<()> {
        self.create_root()?;
        for folder in granules {
            self.create_granule(folder)?;
        }
        if let Some(folder) = datastrip {
            self.create_datastrip(folder)?;
        }
        Ok(())
    }
}

pub(crate) fn create_dir(path: &Path) -> DownloadResult<()> {
    fs::create_dir_all(path).map_err(|e| DownloadError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_skeleton() {
        let temp = TempDir::new().unwrap();
        let layout = SafeLayout::new(temp.path().join("P.SAFE"));
        layout
            .create_skeleton(&["G1".to_string(), "G2".to_string()], Some("DS1"))
            .unwrap();

        for sub in [
            "AUX_DATA",
            "DATASTRIP/DS1",
            "GRANULE/G1/AUX_DATA",
            "GRANULE/G1/IMG_DATA",
            "GRANULE/G1/QI_DATA",
            "GRANULE/G2/IMG_DATA",
        ] {
            assert!(layout.root().join(sub).is_dir(), "missing {}", sub);
        }
    }

    #[test]
    fn test_paths() {
        let layout = SafeLayout::new("/t/P.SAFE");
        assert_eq!(layout.file("MTD.xml"), PathBuf::from("/t/P.SAFE/MTD.xml"));
        assert_eq!(
            layout.granule_qi_dir("G"),
            PathBuf::from("/t/P.SAFE/GRANULE/G/QI_DATA")
        );
    }
}
