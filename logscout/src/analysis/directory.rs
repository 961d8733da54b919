use rayon::prelude::*;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::analyzer::Analyzer;
use super::build_pool;
use super::loader::{list_regular_files, read_text};
use crate::config::{AnalyzerConfig, EncodingMode};
use crate::errors::AnalysisResult;
use crate::metrics::AnalysisMetrics;
use crate::record::{DirectoryAnalysis, FileFailure, Record};

/// Analyzes every regular file of one directory concurrently.
///
/// Each file is read and counted by its own task. A file that fails to read
/// is logged and listed in [`DirectoryAnalysis::failures`]; it never aborts the
/// run. Only a directory that cannot be opened fails the whole call.
///
/// Record order in the result follows task completion and is unspecified.
#[derive(Debug, Clone)]
pub struct DirectoryAnalysisEngine {
    analyzer: Analyzer,
    thread_count: NonZeroUsize,
    encoding_mode: EncodingMode,
    metrics: AnalysisMetrics,
}

impl DirectoryAnalysisEngine {
    pub fn new(analyzer: Analyzer, thread_count: NonZeroUsize) -> Self {
        Self {
            analyzer,
            thread_count,
            encoding_mode: EncodingMode::default(),
            metrics: AnalysisMetrics::new(),
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> AnalysisResult<Self> {
        Ok(Self::new(Analyzer::from_config(config)?, config.thread_count)
            .with_encoding(config.encoding_mode))
    }

    pub fn with_encoding(mut self, encoding_mode: EncodingMode) -> Self {
        self.encoding_mode = encoding_mode;
        self
    }

    pub fn with_metrics(mut self, metrics: AnalysisMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &AnalysisMetrics {
        &self.metrics
    }

    /// Runs the analysis over `dir` and waits for every file task
    pub fn analyze(&self, dir: &Path) -> AnalysisResult<DirectoryAnalysis> {
        info!(
            "Analyzing directory {} for '{}'",
            dir.display(),
            self.analyzer.pattern()
        );

        let files = list_regular_files(dir)?;
        debug!("Found {} files to analyze", files.len());

        // Dropped at the end of this call on every path
        let pool = build_pool(self.thread_count, "dir")?;

        let outcomes: Vec<(PathBuf, AnalysisResult<Record>)> = pool.install(|| {
            files
                .into_par_iter()
                .map(|path| {
                    let outcome = self.analyze_file(&path);
                    (path, outcome)
                })
                .collect()
        });

        let mut analysis = DirectoryAnalysis::new();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(record) => analysis.records.push(record),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    analysis.failures.push(FileFailure {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Directory analysis complete: {} records, {} failed files",
            analysis.records.len(),
            analysis.failures.len()
        );
        Ok(analysis)
    }

    /// Reads and counts a single file
    pub fn analyze_file(&self, path: &Path) -> AnalysisResult<Record> {
        let outcome = read_text(path, self.encoding_mode).map(|content| {
            let counts = self.analyzer.analyze(&content);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Record::new(name, counts.total_words, counts.total_keywords)
        });

        match &outcome {
            Ok(_) => self.metrics.record_file_analyzed(),
            Err(_) => self.metrics.record_file_failed(),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AnalysisError;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::tempdir;

    fn engine(threads: usize) -> DirectoryAnalysisEngine {
        DirectoryAnalysisEngine::new(
            Analyzer::new("error", false).unwrap(),
            NonZeroUsize::new(threads).unwrap(),
        )
    }

    fn tuples(analysis: &DirectoryAnalysis) -> BTreeSet<(String, u64, u64)> {
        analysis
            .records
            .iter()
            .map(|r| (r.name().to_string(), r.word_count(), r.keyword_count()))
            .collect()
    }

    #[test]
    fn test_analyze_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.log"), "ERROR one\nok two error").unwrap();
        fs::write(dir.path().join("b.log"), "").unwrap();
        fs::write(dir.path().join("c.log"), "Errors: errorerror").unwrap();

        let analysis = engine(2).analyze(dir.path()).unwrap();
        assert!(analysis.failures.is_empty());

        let expected: BTreeSet<_> = [
            ("a.log".to_string(), 5, 2),
            ("b.log".to_string(), 0, 0),
            ("c.log".to_string(), 2, 3),
        ]
        .into_iter()
        .collect();
        assert_eq!(tuples(&analysis), expected);
    }

    #[test]
    fn test_unreadable_file_is_omitted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("good1.log"), "error here").unwrap();
        fs::write(dir.path().join("good2.log"), "fine").unwrap();
        fs::write(dir.path().join("bad.log"), [0xC3, 0x28, 0xFF]).unwrap();

        let engine = engine(3);
        let analysis = engine.analyze(dir.path()).unwrap();

        assert_eq!(analysis.records.len(), 2);
        assert_eq!(analysis.failures.len(), 1);
        assert!(analysis.failures[0].path.ends_with("bad.log"));
        assert_eq!(analysis.files_attempted(), 3);

        let stats = engine.metrics().snapshot();
        assert_eq!(stats.files_analyzed, 2);
        assert_eq!(stats.files_failed, 1);
    }

    #[test]
    fn test_lossy_mode_keeps_invalid_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.log"), [b'e', b'r', b'r', b'o', b'r', b' ', 0xFF]).unwrap();

        let analysis = engine(1)
            .with_encoding(EncodingMode::Lossy)
            .analyze(dir.path())
            .unwrap();
        assert_eq!(analysis.records.len(), 1);
        assert_eq!(analysis.records[0].keyword_count(), 1);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = tempdir().unwrap();
        for i in 0..20 {
            fs::write(
                dir.path().join(format!("f{}.log", i)),
                "error ".repeat(i) + "tail words",
            )
            .unwrap();
        }

        let first = engine(4).analyze(dir.path()).unwrap();
        let second = engine(2).analyze(dir.path()).unwrap();
        assert_eq!(tuples(&first), tuples(&second));
        assert_eq!(first.records.len(), 20);
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = tempdir().unwrap();
        let result = engine(2).analyze(&dir.path().join("missing"));
        assert!(matches!(
            result,
            Err(AnalysisError::DirectoryUnavailable { .. })
        ));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempdir().unwrap();
        let analysis = engine(2).analyze(dir.path()).unwrap();
        assert!(analysis.records.is_empty());
        assert!(analysis.failures.is_empty());
    }
}
