use crossbeam_channel::RecvTimeoutError;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::analyzer::Analyzer;
use super::build_pool;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::metrics::AnalysisMetrics;
use crate::record::AggregateCount;

/// Splits `len` items into `workers` contiguous ranges of `ceil(len / workers)`.
///
/// Ranges are gap-free and non-overlapping. Trailing ranges may be shorter;
/// empty ones are left out.
pub fn partition_bounds(len: usize, workers: NonZeroUsize) -> Vec<Range<usize>> {
    let size = len.div_ceil(workers.get());
    (0..workers.get())
        .map(|i| (i * size).min(len)..((i + 1) * size).min(len))
        .filter(|range| !range.is_empty())
        .collect()
}

/// Sums a line sequence with a fixed pool and one task per partition.
///
/// Tasks report their local [`AggregateCount`] over a channel and the caller
/// waits for all of them until a deadline. Past the deadline the run fails
/// with [`AnalysisError::Timeout`]; tasks still running are abandoned and their
/// results discarded.
#[derive(Debug, Clone)]
pub struct PartitionedAnalysisEngine {
    analyzer: Analyzer,
    workers: NonZeroUsize,
    timeout: Duration,
    metrics: AnalysisMetrics,
}

impl PartitionedAnalysisEngine {
    pub fn new(analyzer: Analyzer, workers: NonZeroUsize, timeout: Duration) -> Self {
        Self {
            analyzer,
            workers,
            timeout,
            metrics: AnalysisMetrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: AnalysisMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Runs every partition and reduces the partial counts.
    ///
    /// The lines are shared with the tasks by `Arc` so that an abandoned task
    /// never borrows from the caller.
    pub fn analyze(&self, lines: Arc<[String]>) -> AnalysisResult<AggregateCount> {
        let analyzer = self.analyzer.clone();
        let work = Arc::new(move |part: &[String]| analyzer.analyze_lines(part));
        self.run_partitions(lines, work)
    }

    /// Runs `work` over every partition and reduces the partial counts
    fn run_partitions<F>(
        &self,
        lines: Arc<[String]>,
        work: Arc<F>,
    ) -> AnalysisResult<AggregateCount>
    where
        F: Fn(&[String]) -> AggregateCount + Send + Sync + 'static,
    {
        let ranges = partition_bounds(lines.len(), self.workers);
        info!(
            "Partitioned run: {} lines across {} partitions",
            lines.len(),
            ranges.len()
        );
        if ranges.is_empty() {
            return Ok(AggregateCount::ZERO);
        }

        let pool = build_pool(self.workers, "partition")?;
        let (sender, receiver) = crossbeam_channel::unbounded();
        let submitted = ranges.len();

        for (index, range) in ranges.into_iter().enumerate() {
            let sender = sender.clone();
            let lines = Arc::clone(&lines);
            let work = Arc::clone(&work);
            let metrics = self.metrics.clone();
            pool.spawn(move || {
                let count = range.len() as u64;
                let partial = work(&lines[range]);
                metrics.record_lines(count);
                // The receiver is gone once the caller timed out
                let _ = sender.send((index, partial));
            });
        }
        drop(sender);

        let deadline = Instant::now() + self.timeout;
        let mut total = AggregateCount::ZERO;
        let mut received = 0;
        while received < submitted {
            match receiver.recv_deadline(deadline) {
                Ok((index, partial)) => {
                    debug!("Partition {} done: {:?}", index, partial);
                    total += partial;
                    received += 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "Abandoning {} of {} partitions after {:?}",
                        submitted - received,
                        submitted,
                        self.timeout
                    );
                    return Err(AnalysisError::Timeout(self.timeout));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(AnalysisError::worker_failure(format!(
                        "{} partition task(s) ended without a result",
                        submitted - received
                    )));
                }
            }
        }

        Ok(total)
    }
}
