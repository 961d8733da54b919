/// Concurrent analysis engines.
///
/// Two input scales are supported:
///
/// 1. **Many small files**: [`DirectoryAnalysisEngine`] runs one task per file
///    and yields one [`Record`](crate::record::Record) per file that could be read.
/// 2. **One large file**: the lines are summed into a single
///    [`AggregateCount`] by one of two strategies.
///    - [`PartitionedAnalysisEngine`] cuts the lines into one contiguous
///      partition per worker and waits for them with a deadline.
///    - [`RecursiveAnalysisEngine`] bisects the lines until a range is at or
///      below a threshold and joins sibling results bottom-up.
///
/// Both large-file strategies return the same totals for the same input; the
/// choice between them is only about scheduling cost. [`Strategy::Auto`] picks
/// the partitioned strategy for moderate inputs and the recursive one above a
/// configurable line count.
///
/// Every engine builds its own bounded rayon pool for the duration of one call
/// and drops it before returning, on success and on failure.
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::AnalyzerConfig;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::metrics::AnalysisMetrics;
use crate::record::{AggregateCount, Record};

pub mod analyzer;
pub mod directory;
pub mod loader;
pub mod partitioned;
pub mod recursive;

pub use analyzer::Analyzer;
pub use directory::DirectoryAnalysisEngine;
pub use loader::{list_regular_files, read_lines, read_text};
pub use partitioned::{partition_bounds, PartitionedAnalysisEngine};
pub use recursive::RecursiveAnalysisEngine;

/// Builds a bounded pool for one engine run
pub(crate) fn build_pool(threads: NonZeroUsize, label: &'static str) -> AnalysisResult<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads.get())
        .thread_name(move |i| format!("logscout-{}-{}", label, i))
        .panic_handler(move |_| error!("A {} worker panicked", label))
        .build()
        .map_err(|e| AnalysisError::config_error(format!("Failed to build thread pool: {}", e)))
}

/// How a large file is decomposed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// One contiguous partition per worker
    Partitioned,
    /// Recursive bisection down to the threshold
    Recursive,
    /// Partitioned below `strategy_line_threshold` lines, recursive at or above
    #[default]
    Auto,
}

impl Strategy {
    /// Resolves `Auto` for an input of `line_count` lines
    pub fn resolve(self, line_count: usize, line_threshold: usize) -> Strategy {
        match self {
            Strategy::Auto if line_count >= line_threshold => Strategy::Recursive,
            Strategy::Auto => Strategy::Partitioned,
            other => other,
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" | "partitioned" => Ok(Strategy::Partitioned),
            "forkjoin" | "recursive" => Ok(Strategy::Recursive),
            "auto" => Ok(Strategy::Auto),
            other => Err(AnalysisError::config_error(format!(
                "Unknown strategy '{}' (expected partitioned|recursive|auto)",
                other
            ))),
        }
    }
}

/// Sums a line sequence with the chosen strategy
pub fn summarize_lines(
    config: &AnalyzerConfig,
    lines: Arc<[String]>,
    strategy: Strategy,
    metrics: &AnalysisMetrics,
) -> AnalysisResult<AggregateCount> {
    let analyzer = Analyzer::from_config(config)?;
    let resolved = strategy.resolve(lines.len(), config.strategy_line_threshold);
    info!(
        "Summarizing {} lines for '{}' with the {:?} strategy",
        lines.len(),
        analyzer.pattern(),
        resolved
    );

    match resolved {
        Strategy::Partitioned => PartitionedAnalysisEngine::new(
            analyzer,
            config.thread_count,
            config.partition_timeout(),
        )
        .with_metrics(metrics.clone())
        .analyze(lines),
        _ => RecursiveAnalysisEngine::new(analyzer, config.recursive_threshold, config.thread_count)
            .with_metrics(metrics.clone())
            .analyze(&lines),
    }
}

/// Reads a large file and summarizes it into a record named after the file
pub fn summarize_file(
    config: &AnalyzerConfig,
    path: &Path,
    strategy: Strategy,
    metrics: &AnalysisMetrics,
) -> AnalysisResult<Record> {
    let lines: Arc<[String]> = read_lines(path, config.encoding_mode)?.into();
    let total = summarize_lines(config, lines, strategy, metrics)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Record::from_aggregate(name, total))
}
