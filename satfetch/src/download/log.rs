//! Per-product scoped log sink.
//!
//! A [`ProductLog`] is created when a product starts and dropped when it
//! ends, whichever way it ends. While alive it keeps a `tracing` span for
//! the product entered and, when a log directory is configured, appends
//! timestamped lines to `<log_dir>/<name>.log`. Dropping it flushes and
//! closes the file.

use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::span::EnteredSpan;
use tracing::{debug, info, info_span, warn};

use super::state::{ProductOutcome, Step};

/// Scoped log for one product download.
pub struct ProductLog {
    product: String,
    step: Step,
    path: Option<PathBuf>,
    sink: Option<BufWriter<File>>,
    _span: EnteredSpan,
}

impl ProductLog {
    /// Open the log for `product`. A log file that cannot be opened only
    /// disables the file sink.
    pub fn open(product: &str, log_dir: Option<&Path>) -> Self {
        let span = info_span!("product", name = %product).entered();

        let (path, sink) = match log_dir {
            Some(dir) => match open_sink(dir, product) {
                Ok((path, file)) => (Some(path), Some(BufWriter::new(file))),
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Product log disabled");
                    (None, None)
                }
            },
            None => (None, None),
        };

        let mut log = Self {
            product: product.to_string(),
            step: Step::Init,
            path,
            sink,
            _span: span,
        };
        log.line(format_args!("Started {}", product));
        log
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    /// Log file path, when a file sink is open.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn current_step(&self) -> &Step {
        &self.step
    }

    /// Enter a new step.
    pub fn step(&mut self, step: Step) {
        debug!(step = %step, "Step");
        self.step = step;
        let step = self.step.to_string();
        self.write(&step);
    }

    /// Append one line to the file sink.
    pub fn line(&mut self, message: impl Display) {
        let message = message.to_string();
        debug!("{}", message);
        self.write(&message);
    }

    /// Record the product's outcome, naming the step in progress.
    pub fn finish(&mut self, outcome: &ProductOutcome) {
        if outcome.is_ok() {
            info!(outcome = %outcome, "Product finished");
        } else {
            warn!(outcome = %outcome, "Product failed");
        }
        self.write(&outcome.to_string());
    }

    fn write(&mut self, message: &str) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        if let Err(e) = writeln!(sink, "{} [{}] {}", stamp, self.step, message) {
            warn!(error = %e, "Failed to write product log, closing it");
            self.sink = None;
        }
    }
}

impl Drop for ProductLog {
    fn drop(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.flush() {
                warn!(error = %e, "Failed to flush product log");
            }
        }
        debug!(product = %self.product, "Product log closed");
    }
}

fn open_sink(dir: &Path, product: &str) -> std::io::Result<(PathBuf, File)> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.log", product));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::state::ReturnCode;
    use tempfile::TempDir;

    #[test]
    fn test_without_dir_has_no_file() {
        let mut log = ProductLog::open("P", None);
        log.step(Step::Metadata);
        assert!(log.path().is_none());
        assert_eq!(log.current_step(), &Step::Metadata);
    }

    #[test]
    fn test_lines_are_flushed_on_drop() {
        let temp = TempDir::new().unwrap();
        let path = {
            let mut log = ProductLog::open("P", Some(temp.path()));
            log.step(Step::Tile { index: 3, total: 12 });
            let outcome = ProductOutcome::failed(
                "P",
                ReturnCode::DownloadError,
                log.current_step().clone(),
                "timed out",
            );
            log.finish(&outcome);
            log.path().unwrap().to_path_buf()
        };

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("Started P"));
        assert!(content.contains("[Tile 3/12] P DOWNLOAD_ERROR at step Tile 3/12: timed out"));
    }

    #[test]
    fn test_closed_on_early_return() {
        fn failing(dir: &Path) -> Result<(), String> {
            let mut log = ProductLog::open("Q", Some(dir));
            log.step(Step::Dispatch);
            if dir.exists() {
                return Err("boom".to_string());
            }
            log.step(Step::Done);
            Ok(())
        }

        let temp = TempDir::new().unwrap();
        assert!(failing(temp.path()).is_err());
        let content = fs::read_to_string(temp.path().join("Q.log")).unwrap();
        assert!(content.contains("[Dispatch] Dispatch"));
        assert!(!content.contains("Done"));
    }
}
