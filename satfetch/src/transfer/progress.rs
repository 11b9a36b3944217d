//! File-level progress reporting and throughput accounting.

use std::sync::Arc;

/// Progress callback for a single file.
///
/// # Arguments
///
/// * `fraction` - Completed fraction of the current file (0.0 to 1.0)
/// * `mb_per_sec` - Instantaneous throughput in MB/s
pub type FileProgressCallback = Arc<dyn Fn(f64, f64) + Send + Sync>;

/// Running average of transfer throughput across the files of one product.
///
/// Every sample counts equally: `avg' = (avg * n + current) / (n + 1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThroughputTracker {
    average: f64,
    samples: u64,
}

impl ThroughputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one instantaneous MB/s sample into the average.
    pub fn record(&mut self, mb_per_sec: f64) {
        let n = self.samples as f64;
        self.average = (self.average * n + mb_per_sec) / (n + 1.0);
        self.samples += 1;
    }

    /// Average MB/s, 0 when nothing was recorded.
    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}

/// Transient per-file transfer bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferState {
    /// `Content-Length` of the full remote file, when known.
    pub remote_length: Option<u64>,
    /// Size of the local file before the transfer started.
    pub local_length: u64,
    /// Offset the transfer (re)started from.
    pub resume_offset: u64,
    /// Bytes written to disk so far, including the resume offset.
    pub written: u64,
}

impl TransferState {
    /// Fraction of the remote file present locally.
    pub fn fraction(&self) -> f64 {
        match self.remote_length {
            Some(0) => 1.0,
            Some(total) => (self.written as f64 / total as f64).min(1.0),
            None => 0.0,
        }
    }

    /// Whether the local file already holds the whole remote file.
    pub fn is_complete(&self) -> bool {
        self.remote_length == Some(self.local_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_average() {
        let mut tracker = ThroughputTracker::new();
        assert_eq!(tracker.average(), 0.0);

        tracker.record(2.0);
        assert_eq!(tracker.average(), 2.0);

        tracker.record(4.0);
        assert_eq!(tracker.average(), 3.0);

        tracker.record(6.0);
        assert_eq!(tracker.average(), 4.0);
        assert_eq!(tracker.samples(), 3);
    }

    #[test]
    fn test_transfer_state_fraction() {
        let mut state = TransferState {
            remote_length: Some(200),
            ..Default::default()
        };
        assert_eq!(state.fraction(), 0.0);
        state.written = 50;
        assert_eq!(state.fraction(), 0.25);

        let unknown = TransferState::default();
        assert_eq!(unknown.fraction(), 0.0);
    }

    #[test]
    fn test_transfer_state_complete() {
        let state = TransferState {
            remote_length: Some(10),
            local_length: 10,
            ..Default::default()
        };
        assert!(state.is_complete());
    }
}
