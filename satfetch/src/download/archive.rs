//! Zip compression of finished products.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::error::{DownloadError, DownloadResult};

fn archive_error(path: &Path, reason: impl ToString) -> DownloadError {
    DownloadError::Archive {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Path of the archive written next to `dir`.
pub fn archive_path(dir: &Path) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".zip");
    dir.with_file_name(name)
}

/// Zip `dir` into `<dir>.zip`, entries rooted at the directory's own name.
///
/// With `delete_after`, the directory is removed once the archive is
/// complete. Returns the archive path.
pub fn compress_dir(dir: &Path, delete_after: bool) -> DownloadResult<PathBuf> {
    let zip_path = archive_path(dir);
    let root_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| archive_error(dir, "not a named directory"))?;

    let file = File::create(&zip_path).map_err(|e| DownloadError::io(&zip_path, e))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);

    add_dir(&mut writer, dir, &root_name, options)?;
    writer.finish().map_err(|e| archive_error(&zip_path, e))?;

    info!(archive = %zip_path.display(), "Product compressed");

    if delete_after {
        fs::remove_dir_all(dir).map_err(|e| DownloadError::io(dir, e))?;
        info!(dir = %dir.display(), "Removed uncompressed product");
    }

    Ok(zip_path)
}

fn add_dir<W: io::Write + io::Seek>(
    writer: &mut ZipWriter<W>,
    dir: &Path,
    prefix: &str,
    options: SimpleFileOptions,
) -> DownloadResult<()> {
    writer
        .add_directory(format!("{}/", prefix), options)
        .map_err(|e| archive_error(dir, e))?;

    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| DownloadError::io(dir, e))?
        .collect::<Result<_, _>>()
        .map_err(|e| DownloadError::io(dir, e))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = format!("{}/{}", prefix, entry.file_name().to_string_lossy());
        if path.is_dir() {
            add_dir(writer, &path, &name, options)?;
        } else {
            writer
                .start_file(name, options)
                .map_err(|e| archive_error(&path, e))?;
            let mut source = File::open(&path).map_err(|e| DownloadError::io(&path, e))?;
            io::copy(&mut source, writer).map_err(|e| DownloadError::io(&path, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn product_dir(root: &Path) -> PathBuf {
        let dir = root.join("P.SAFE");
        fs::create_dir_all(dir.join("GRANULE/G/IMG_DATA")).unwrap();
        fs::write(dir.join("MTD.xml"), b"<mtd/>").unwrap();
        fs::write(dir.join("GRANULE/G/IMG_DATA/B01.jp2"), b"raster").unwrap();
        dir
    }

    #[test]
    fn test_archive_path() {
        assert_eq!(
            archive_path(Path::new("/out/P.SAFE")),
            PathBuf::from("/out/P.SAFE.zip")
        );
    }

    #[test]
    fn test_compress_keeps_tree() {
        let temp = TempDir::new().unwrap();
        let dir = product_dir(temp.path());

        let zip_path = compress_dir(&dir, false).unwrap();
        assert!(zip_path.is_file());
        assert!(dir.is_dir());

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name("P.SAFE/GRANULE/G/IMG_DATA/B01.jp2")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "raster");
        assert!(archive.by_name("P.SAFE/MTD.xml").is_ok());
    }

    #[test]
    fn test_compress_and_delete() {
        let temp = TempDir::new().unwrap();
        let dir = product_dir(temp.path());
        let zip_path = compress_dir(&dir, true).unwrap();
        assert!(zip_path.is_file());
        assert!(!dir.exists());
    }
}
