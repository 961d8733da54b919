use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Tracks what a run did, for diagnostics only.
///
/// Clones share the same counters. Engine results never depend on these
/// values; each task still owns its own accumulator.
#[derive(Debug, Clone)]
pub struct AnalysisMetrics {
    files_analyzed: Arc<AtomicU64>,
    files_failed: Arc<AtomicU64>,
    lines_processed: Arc<AtomicU64>,
    batches_flushed: Arc<AtomicU64>,
    records_committed: Arc<AtomicU64>,
    rollbacks: Arc<AtomicU64>,
}

impl AnalysisMetrics {
    /// Creates a new AnalysisMetrics instance
    pub fn new() -> Self {
        Self {
            files_analyzed: Arc::new(AtomicU64::new(0)),
            files_failed: Arc::new(AtomicU64::new(0)),
            lines_processed: Arc::new(AtomicU64::new(0)),
            batches_flushed: Arc::new(AtomicU64::new(0)),
            records_committed: Arc::new(AtomicU64::new(0)),
            rollbacks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_file_analyzed(&self) {
        self.files_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lines(&self, count: u64) {
        self.lines_processed.fetch_add(count, Ordering::Relaxed);
    }

    /// Records one flushed batch of `size` records
    pub fn record_batch(&self, size: u64) {
        let total = self.batches_flushed.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Batch of {} records flushed, {} batches so far", size, total);
    }

    pub fn record_commit(&self, records: u64) {
        self.records_committed.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the current counter values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_analyzed: self.files_analyzed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            lines_processed: self.lines_processed.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            records_committed: self.records_committed.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
        }
    }

    /// Logs current counter values
    pub fn log_stats(&self) {
        let stats = self.snapshot();
        info!(
            "Run stats: files analyzed/failed: {}/{}, lines: {}, batches: {}, records committed: {}, rollbacks: {}",
            stats.files_analyzed,
            stats.files_failed,
            stats.lines_processed,
            stats.batches_flushed,
            stats.records_committed,
            stats.rollbacks
        );
    }
}

impl Default for AnalysisMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub files_analyzed: u64,
    pub files_failed: u64,
    pub lines_processed: u64,
    pub batches_flushed: u64,
    pub records_committed: u64,
    pub rollbacks: u64,
}
