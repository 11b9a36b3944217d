//! Per-product and batch outcome tracking.
//!
//! A product moves through the steps of [`Step`]; when it ends, its
//! [`ProductOutcome`] records the return code and the step that was in
//! progress. A [`BatchReport`] keeps every outcome and the worst code.

use std::fmt;
use std::path::PathBuf;

/// Outcome of one product, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ReturnCode {
    #[default]
    Ok,
    /// Nothing retrievable. Non-fatal to the batch.
    EmptyProduct,
    /// Transfer or I/O fault. Non-fatal to the batch but recorded.
    DownloadError,
    /// Unrecoverable setup error. Aborts the batch.
    Fatal,
}

impl ReturnCode {
    /// Process exit code.
    pub fn exit_code(self) -> i32 {
        match self {
            ReturnCode::Ok => 0,
            ReturnCode::EmptyProduct => 1,
            ReturnCode::DownloadError => 2,
            ReturnCode::Fatal => 3,
        }
    }

    pub fn worst(self, other: ReturnCode) -> ReturnCode {
        self.max(other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReturnCode::Ok => "OK",
            ReturnCode::EmptyProduct => "EMPTY_PRODUCT",
            ReturnCode::DownloadError => "DOWNLOAD_ERROR",
            ReturnCode::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a product download currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Init,
    Dispatch,
    /// Whole-archive attempt.
    Archive,
    /// Top-level metadata download and granule selection.
    Metadata,
    /// Granule `index` (1-based) of `total`.
    Tile { index: usize, total: usize },
    /// Shared datastrip metadata.
    Datastrip,
    /// Flat file `index` (1-based) of `total`, for products without granules.
    File { index: usize, total: usize },
    /// Local mirror copy or link.
    Local,
    Compress,
    Done,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Init => f.write_str("Init"),
            Step::Dispatch => f.write_str("Dispatch"),
            Step::Archive => f.write_str("Archive"),
            Step::Metadata => f.write_str("Metadata"),
            Step::Tile { index, total } => write!(f, "Tile {}/{}", index, total),
            Step::Datastrip => f.write_str("Datastrip"),
            Step::File { index, total } => write!(f, "File {}/{}", index, total),
            Step::Local => f.write_str("Local"),
            Step::Compress => f.write_str("Compress"),
            Step::Done => f.write_str("Done"),
        }
    }
}

/// Final state of one product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductOutcome {
    pub product: String,
    pub code: ReturnCode,
    /// Step in progress when the product ended.
    pub step: Step,
    /// Local result (product directory, archive, or link).
    pub path: Option<PathBuf>,
    /// Failure description, if any.
    pub message: Option<String>,
    /// Backend that produced the result.
    pub backend: Option<String>,
    /// Average transfer speed in MB/s.
    pub average_speed: f64,
}

impl ProductOutcome {
    pub fn succeeded(product: &str, path: PathBuf, backend: &str) -> Self {
        Self {
            product: product.to_string(),
            code: ReturnCode::Ok,
            step: Step::Done,
            path: Some(path),
            message: None,
            backend: Some(backend.to_string()),
            average_speed: 0.0,
        }
    }

    pub fn failed(product: &str, code: ReturnCode, step: Step, message: impl Into<String>) -> Self {
        Self {
            product: product.to_string(),
            code,
            step,
            path: None,
            message: Some(message.into()),
            backend: None,
            average_speed: 0.0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ReturnCode::Ok
    }
}

impl fmt::Display for ProductOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.path) {
            (Some(message), _) => write!(
                f,
                "{} {} at step {}: {}",
                self.product, self.code, self.step, message
            ),
            (None, Some(path)) => write!(f, "{} {} -> {}", self.product, self.code, path.display()),
            (None, None) => write!(f, "{} {}", self.product, self.code),
        }
    }
}

/// Outcomes of a batch, in processing order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    outcomes: Vec<ProductOutcome>,
    worst: ReturnCode,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: ProductOutcome) {
        self.worst = self.worst.worst(outcome.code);
        self.outcomes.push(outcome);
    }

    /// Worst code seen; `Ok` for an empty batch.
    pub fn worst(&self) -> ReturnCode {
        self.worst
    }

    pub fn outcomes(&self) -> &[ProductOutcome] {
        &self.outcomes
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProductOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
