use std::num::NonZeroUsize;
use tracing::info;

use super::analyzer::Analyzer;
use super::build_pool;
use crate::errors::AnalysisResult;
use crate::metrics::AnalysisMetrics;
use crate::record::AggregateCount;

/// Sums a line sequence by recursive bisection.
///
/// A range longer than the threshold is split at its midpoint and the two
/// halves run through `rayon::join`: one half in the current thread, the other
/// available to be stolen by an idle worker. A parent's count is the sum of its
/// children, taken only after both have returned. Ranges at or below the
/// threshold are counted sequentially.
#[derive(Debug, Clone)]
pub struct RecursiveAnalysisEngine {
    analyzer: Analyzer,
    threshold: NonZeroUsize,
    thread_count: NonZeroUsize,
    metrics: AnalysisMetrics,
}

impl RecursiveAnalysisEngine {
    pub fn new(analyzer: Analyzer, threshold: NonZeroUsize, thread_count: NonZeroUsize) -> Self {
        Self {
            analyzer,
            threshold,
            thread_count,
            metrics: AnalysisMetrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: AnalysisMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn analyze(&self, lines: &[String]) -> AnalysisResult<AggregateCount> {
        info!(
            "Recursive run: {} lines, threshold {}",
            lines.len(),
            self.threshold
        );
        let pool = build_pool(self.thread_count, "forkjoin")?;
        Ok(pool.install(|| self.split(lines)))
    }

    fn split(&self, lines: &[String]) -> AggregateCount {
        if lines.len() <= self.threshold.get() {
            self.metrics.record_lines(lines.len() as u64);
            return self.analyzer.analyze_lines(lines);
        }

        let (left, right) = lines.split_at(lines.len() / 2);
        let (left, right) = rayon::join(|| self.split(left), || self.split(right));
        left + right
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PartitionedAnalysisEngine;
    use std::sync::Arc;
    use std::time::Duration;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn analyzer() -> Analyzer {
        Analyzer::new("error", false).unwrap()
    }

    #[test]
    fn test_threshold_one_scenario() {
        let lines: Vec<String> = ["hello world", "", "ERROR occurred error here"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let engine = RecursiveAnalysisEngine::new(analyzer(), nz(1), nz(2));
        assert_eq!(engine.analyze(&lines).unwrap(), AggregateCount::new(6, 2));
    }

    #[test]
    fn test_empty_input() {
        let engine = RecursiveAnalysisEngine::new(analyzer(), nz(4), nz(2));
        assert_eq!(engine.analyze(&[]).unwrap(), AggregateCount::ZERO);
    }

    #[test]
    fn test_every_line_visited_once() {
        let lines: Vec<String> = (0..1_337).map(|i| format!("l{}", i)).collect();
        let metrics = AnalysisMetrics::new();
        let engine =
            RecursiveAnalysisEngine::new(analyzer(), nz(7), nz(4)).with_metrics(metrics.clone());

        let total = engine.analyze(&lines).unwrap();
        assert_eq!(total.total_words, 1_337);
        assert_eq!(metrics.snapshot().lines_processed, 1_337);
    }

    #[test]
    fn test_matches_partitioned_strategy() {
        let lines: Vec<String> = (0..2_500)
            .map(|i| match i % 7 {
                0 => format!("ERROR {} failed with error code", i),
                3 => String::new(),
                5 => "   ".to_string(),
                _ => format!("request {} served", i),
            })
            .collect();
        let shared: Arc<[String]> = lines.clone().into();

        for threshold in [1, 2, 17, 500, 10_000] {
            for workers in [1, 3, 8] {
                let recursive = RecursiveAnalysisEngine::new(analyzer(), nz(threshold), nz(workers))
                    .analyze(&lines)
                    .unwrap();
                let partitioned =
                    PartitionedAnalysisEngine::new(analyzer(), nz(workers), Duration::from_secs(30))
                        .analyze(Arc::clone(&shared))
                        .unwrap();
                assert_eq!(
                    recursive, partitioned,
                    "threshold {} workers {}",
                    threshold, workers
                );
            }
        }
    }
}
