//! Single-file HTTP transfer with resume support.
//!
//! This module provides the download primitive every remote backend uses:
//! - Existing complete files are detected from `Content-Length`
//! - Partial files are resumed via HTTP Range requests
//! - Progress and throughput are reported after every chunk

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::error::{TransferError, TransferResult};
use super::http::{is_timeout_error, HttpClient, HttpResponse, RequestOptions};
use super::progress::{FileProgressCallback, ThroughputTracker, TransferState};
use super::DownloadMode;

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Resumable HTTP downloader bound to one client and one set of credentials.
#[derive(Clone)]
pub struct ResumableDownloader {
    client: Arc<dyn HttpClient>,
    authorization: Option<String>,
    progress: Option<FileProgressCallback>,
}

impl ResumableDownloader {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            authorization: None,
            progress: None,
        }
    }

    /// Send `Authorization: {token}` with every request.
    pub fn with_authorization(mut self, token: Option<String>) -> Self {
        self.authorization = token;
        self
    }

    pub fn with_progress(mut self, progress: Option<FileProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn client(&self) -> &Arc<dyn HttpClient> {
        &self.client
    }

    /// Open a plain GET request with this downloader's credentials.
    pub fn open(&self, url: &str) -> TransferResult<HttpResponse> {
        self.client
            .get(url, &RequestOptions::with_authorization(self.authorization.as_deref()))
    }

    /// Download `url` to `dest`.
    ///
    /// Returns `Ok(None)` when the remote file does not exist (HTTP 404), so
    /// the caller can try another backend. Timeouts and every other failure
    /// are errors; a partially written file is left in place for a later
    /// `Resume`.
    pub fn fetch(
        &self,
        url: &str,
        dest: &Path,
        mode: DownloadMode,
        throughput: &mut ThroughputTracker,
    ) -> TransferResult<Option<PathBuf>> {
        let local_length = fs::metadata(dest).map(|m| m.len()).ok();

        let response = self.open(url)?;
        if response.status == 404 {
            debug!(url, "Remote file not found");
            return Ok(None);
        }
        if !response.is_success() {
            return Err(TransferError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        let mut state = TransferState {
            remote_length: response.content_length,
            local_length: local_length.unwrap_or(0),
            ..Default::default()
        };

        if local_length.is_some() && state.is_complete() {
            debug!(url, path = %dest.display(), "Local file already complete");
            self.report(1.0, 0.0);
            return Ok(Some(dest.to_path_buf()));
        }

        let (response, file) = self.prepare_destination(url, dest, mode, response, &mut state)?;
        let Some(response) = response else {
            // Server refused the range because the local file already covers it
            self.report(1.0, 0.0);
            return Ok(Some(dest.to_path_buf()));
        };

        self.stream(url, dest, response, file, &mut state, throughput)?;
        normalize_permissions(dest);
        Ok(Some(dest.to_path_buf()))
    }

    /// Decide between resuming and starting over, and open the local file.
    ///
    /// Returns the response to stream from, or `None` when nothing is left to
    /// download.
    fn prepare_destination(
        &self,
        url: &str,
        dest: &Path,
        mode: DownloadMode,
        first: HttpResponse,
        state: &mut TransferState,
    ) -> TransferResult<(Option<HttpResponse>, File)> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| TransferError::io(parent, e))?;
        }

        let shorter_than_remote = state
            .remote_length
            .map_or(true, |remote| state.local_length < remote);

        if mode == DownloadMode::Resume && state.local_length > 0 && shorter_than_remote {
            drop(first);
            let options = RequestOptions::with_authorization(self.authorization.as_deref())
                .range_from(state.local_length);
            let ranged = self.client.get(url, &options)?;

            match ranged.status {
                206 => {
                    debug!(url, offset = state.local_length, "Resuming partial download");
                    let file = OpenOptions::new()
                        .append(true)
                        .open(dest)
                        .map_err(|e| TransferError::io(dest, e))?;
                    state.resume_offset = state.local_length;
                    state.written = state.local_length;
                    return Ok((Some(ranged), file));
                }
                416 => {
                    let file = OpenOptions::new()
                        .append(true)
                        .open(dest)
                        .map_err(|e| TransferError::io(dest, e))?;
                    return Ok((None, file));
                }
                status if (200..300).contains(&status) => {
                    // Range ignored by the server; the body is the whole file
                    debug!(url, "Server ignored range request, restarting");
                    let file = File::create(dest).map_err(|e| TransferError::io(dest, e))?;
                    return Ok((Some(ranged), file));
                }
                status => {
                    return Err(TransferError::Status {
                        url: url.to_string(),
                        status,
                    })
                }
            }
        }

        if state.local_length > 0 {
            fs::remove_file(dest).map_err(|e| TransferError::io(dest, e))?;
        }
        let file = File::create(dest).map_err(|e| TransferError::io(dest, e))?;
        Ok((Some(first), file))
    }

    /// Stream the response body to the destination file.
    fn stream(
        &self,
        url: &str,
        dest: &Path,
        mut response: HttpResponse,
        file: File,
        state: &mut TransferState,
        throughput: &mut ThroughputTracker,
    ) -> TransferResult<()> {
        if state.remote_length.is_none() {
            state.remote_length = response.content_length.map(|len| len + state.resume_offset);
        }

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let started = Instant::now();

        loop {
            let bytes_read = match response.body().read(&mut buffer) {
                Ok(n) => n,
                Err(e) if is_timeout_error(&e) => {
                    writer.flush().ok();
                    return Err(TransferError::Timeout {
                        url: url.to_string(),
                        timeout_secs: self.client.timeout().as_secs(),
                    });
                }
                Err(e) => {
                    writer.flush().ok();
                    warn!(url, written = state.written, error = %e, "Transfer interrupted");
                    return Err(TransferError::Request {
                        url: url.to_string(),
                        reason: format!("read error: {}", e),
                    });
                }
            };

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| TransferError::io(dest, e))?;
            state.written += bytes_read as u64;

            let elapsed = started.elapsed().as_secs_f64();
            let session_bytes = (state.written - state.resume_offset) as f64;
            let mb_per_sec = if elapsed > 0.0 {
                session_bytes / BYTES_PER_MB / elapsed
            } else {
                0.0
            };
            throughput.record(mb_per_sec);
            self.report(state.fraction(), mb_per_sec);
        }

        writer.flush().map_err(|e| TransferError::io(dest, e))?;
        Ok(())
    }

    fn report(&self, fraction: f64, mb_per_sec: f64) {
        if let Some(cb) = &self.progress {
            cb(fraction, mb_per_sec);
        }
    }
}

/// Owner rwx, group and world r-x on POSIX filesystems.
#[cfg(unix)]
fn normalize_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o755)) {
        debug!(path = %path.display(), error = %e, "Could not set permissions");
    }
}

#[cfg(not(unix))]
fn normalize_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::http::tests::MockHttpClient;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const URL: &str = "https://store.example.com/file.jp2";

    fn payload() -> Vec<u8> {
        (0..200_000u32).map(|i| (i % 251) as u8).collect()
    }

    fn downloader(mock: MockHttpClient) -> (ResumableDownloader, Arc<MockHttpClient>) {
        let mock = Arc::new(mock);
        let client: Arc<dyn HttpClient> = mock.clone();
        (ResumableDownloader::new(client), mock)
    }

    #[test]
    fn test_fresh_download() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a/b/file.jp2");
        let (downloader, _) = downloader(MockHttpClient::new().with_file(URL, payload()));
        let mut tracker = ThroughputTracker::new();

        let result = downloader
            .fetch(URL, &dest, DownloadMode::Overwrite, &mut tracker)
            .unwrap();

        assert_eq!(result, Some(dest.clone()));
        assert_eq!(fs::read(&dest).unwrap(), payload());
        assert!(tracker.samples() > 0);
    }

    #[test]
    fn test_resume_requests_remaining_range() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("file.jp2");
        let data = payload();
        fs::write(&dest, &data[..70_000]).unwrap();

        let (downloader, mock) = downloader(MockHttpClient::new().with_file(URL, data.clone()));
        let mut tracker = ThroughputTracker::new();

        downloader
            .fetch(URL, &dest, DownloadMode::Resume, &mut tracker)
            .unwrap();

        let requests = mock.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].1.range_start, Some(70_000));
        drop(requests);

        assert_eq!(fs::metadata(&dest).unwrap().len(), data.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), data);
        // only the missing tail went over the wire
        assert_eq!(mock.bytes_served(), data.len() - 70_000);
    }

    #[test]
    fn test_complete_file_is_not_read_again() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("file.jp2");
        let data = payload();
        fs::write(&dest, &data).unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = Arc::clone(&calls);
        let progress: FileProgressCallback = Arc::new(move |fraction, speed| {
            calls_clone.lock().unwrap().push((fraction, speed));
        });

        let (downloader, mock) = downloader(MockHttpClient::new().with_file(URL, data));
        let downloader = downloader.with_progress(Some(progress));
        let mut tracker = ThroughputTracker::new();

        let result = downloader
            .fetch(URL, &dest, DownloadMode::Resume, &mut tracker)
            .unwrap();

        assert_eq!(result, Some(dest));
        assert_eq!(mock.bytes_served(), 0);
        assert_eq!(calls.lock().unwrap().as_slice(), &[(1.0, 0.0)]);
        assert_eq!(tracker.samples(), 0);
    }

    #[test]
    fn test_overwrite_discards_partial_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("file.jp2");
        fs::write(&dest, b"stale partial content").unwrap();

        let (downloader, mock) = downloader(MockHttpClient::new().with_file(URL, payload()));
        let mut tracker = ThroughputTracker::new();

        downloader
            .fetch(URL, &dest, DownloadMode::Overwrite, &mut tracker)
            .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), payload());
        let requests = mock.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1.range_start, None);
    }

    #[test]
    fn test_not_found_is_soft_miss() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("file.jp2");
        let (downloader, _) = downloader(MockHttpClient::new());
        let mut tracker = ThroughputTracker::new();

        let result = downloader
            .fetch(URL, &dest, DownloadMode::Overwrite, &mut tracker)
            .unwrap();

        assert_eq!(result, None);
        assert!(!dest.exists());
    }

    #[test]
    fn test_other_status_is_error() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("file.jp2");
        let (downloader, _) = downloader(MockHttpClient::new().with_status(URL, 500));
        let mut tracker = ThroughputTracker::new();

        let err = downloader
            .fetch(URL, &dest, DownloadMode::Overwrite, &mut tracker)
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_authorization_is_sent() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("file.jp2");
        let (downloader, mock) = downloader(MockHttpClient::new().with_file(URL, b"x".to_vec()));
        let downloader = downloader.with_authorization(Some("Basic abc".to_string()));
        let mut tracker = ThroughputTracker::new();

        downloader
            .fetch(URL, &dest, DownloadMode::Overwrite, &mut tracker)
            .unwrap();

        let requests = mock.requests.lock().unwrap();
        assert_eq!(requests[0].1.authorization.as_deref(), Some("Basic abc"));
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_normalized() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("file.jp2");
        let (downloader, _) = downloader(MockHttpClient::new().with_file(URL, b"x".to_vec()));
        let mut tracker = ThroughputTracker::new();

        downloader
            .fetch(URL, &dest, DownloadMode::Overwrite, &mut tracker)
            .unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
