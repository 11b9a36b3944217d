//! Progress reporting for product batches.
//!
//! Two sinks are supported: a batch sink receiving one update per finished
//! product, and a file sink receiving `(fraction, MB/s)` updates while a
//! single file streams. Either may be unset.

use std::sync::Arc;

use super::state::ReturnCode;
use crate::transfer::FileProgressCallback;

/// One batch-level update.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    /// Products finished so far.
    pub completed: usize,
    pub total: usize,
    /// Product that just finished.
    pub product: String,
    pub code: ReturnCode,
    /// Average throughput of that product in MB/s.
    pub average_speed: f64,
}

impl BatchProgress {
    /// Fraction of the batch finished, 1.0 for an empty batch.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Callback receiving batch-level updates.
pub type BatchProgressCallback = Arc<dyn Fn(&BatchProgress) + Send + Sync>;

/// Optional batch and file progress sinks.
#[derive(Clone, Default)]
pub struct ProgressSinks {
    batch: Option<BatchProgressCallback>,
    file: Option<FileProgressCallback>,
}

impl ProgressSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch(mut self, callback: BatchProgressCallback) -> Self {
        self.batch = Some(callback);
        self
    }

    pub fn with_file(mut self, callback: FileProgressCallback) -> Self {
        self.file = Some(callback);
        self
    }

    /// File sink to hand to the transfer primitive.
    pub fn file(&self) -> Option<FileProgressCallback> {
        self.file.clone()
    }

    pub fn report_batch(&self, progress: &BatchProgress) {
        if let Some(callback) = &self.batch {
            callback(progress);
        }
    }
}

impl std::fmt::Debug for ProgressSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSinks")
            .field("batch", &self.batch.is_some())
            .field("file", &self.file.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn update(completed: usize, total: usize) -> BatchProgress {
        BatchProgress {
            completed,
            total,
            product: "P".to_string(),
            code: ReturnCode::Ok,
            average_speed: 0.0,
        }
    }

    #[test]
    fn test_fraction() {
        assert_eq!(update(1, 4).fraction(), 0.25);
        assert_eq!(update(0, 0).fraction(), 1.0);
    }

    #[test]
    fn test_unset_sinks_are_noops() {
        let sinks = ProgressSinks::new();
        sinks.report_batch(&update(1, 1));
        assert!(sinks.file().is_none());
    }

    #[test]
    fn test_batch_sink_receives_updates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sinks = ProgressSinks::new().with_batch(Arc::new(move |p: &BatchProgress| {
            sink.lock().unwrap().push(p.fraction());
        }));

        sinks.report_batch(&update(1, 2));
        sinks.report_batch(&update(2, 2));
        assert_eq!(*seen.lock().unwrap(), vec![0.5, 1.0]);
    }
}
