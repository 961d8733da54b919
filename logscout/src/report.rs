//! Plain-text rendering of records and merged views, plus the sinks that
//! receive the rendered text.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{AnalysisError, AnalysisResult};
use crate::record::{Record, TaggedRecord};

/// Fixed-width timestamp used in every report, e.g. `2024-05-01T09:30:00.000`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Default file name for the directory analysis report
pub const ANALYSIS_REPORT: &str = "ana_result.txt";

/// Default file name for the merged two-table report
pub const MERGED_REPORT: &str = "read_result.txt";

fn timestamp(record: &Record) -> String {
    record.processed_at().format(TIMESTAMP_FORMAT).to_string()
}

/// One row per record under a `Filename | Word Count | Keyword Count | Processed At` header
pub fn render_analysis(records: &[Record]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:<12} {:<15} {:<23}",
        "Filename", "Word Count", "Keyword Count", "Processed At"
    );
    for record in records {
        let _ = writeln!(
            out,
            "{:<20} {:<12} {:<15} {:<23}",
            record.name(),
            record.word_count(),
            record.keyword_count(),
            timestamp(record)
        );
    }
    out
}

/// Merged view with the id and source of every row
pub fn render_merged(rows: &[TaggedRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<5} {:<20} {:<12} {:<15} {:<23} {:<12}",
        "ID", "Filename", "Word Count", "Keyword Count", "Processed At", "Source"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<5} {:<20} {:<12} {:<15} {:<23} {:<12}",
            row.id,
            row.record.name(),
            row.record.word_count(),
            row.record.keyword_count(),
            timestamp(&row.record),
            row.source
        );
    }
    out
}

/// Body of the per-record file written by a filesystem transaction
pub fn render_record_file(record: &Record) -> String {
    format!(
        "Filename: {}\nWord Count: {}\nKeyword Count: {}\nProcessed At: {}\n",
        record.name(),
        record.word_count(),
        record.keyword_count(),
        timestamp(record)
    )
}

/// Receives a rendered report
pub trait ReportSink: Send + Sync {
    fn publish(&self, rendered: &str) -> AnalysisResult<()>;
}

/// Writes the report to one path, creating or truncating it
#[derive(Debug, Clone)]
pub struct FileReportSink {
    path: PathBuf,
}

impl FileReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for FileReportSink {
    fn publish(&self, rendered: &str) -> AnalysisResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| AnalysisError::from_io(parent, e))?;
        }
        fs::write(&self.path, rendered).map_err(|e| AnalysisError::from_io(&self.path, e))?;
        debug!("Report written to {}", self.path.display());
        Ok(())
    }
}
