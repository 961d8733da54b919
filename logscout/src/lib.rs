pub mod analysis;
pub mod config;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod persist;
pub mod reader;
pub mod record;
pub mod report;

pub use analysis::{
    summarize_file, summarize_lines, Analyzer, DirectoryAnalysisEngine, PartitionedAnalysisEngine,
    RecursiveAnalysisEngine, Strategy,
};
pub use config::{AnalyzerConfig, CliOverrides, EncodingMode};
pub use errors::{AnalysisError, AnalysisResult};
pub use metrics::{AnalysisMetrics, MetricsSnapshot};
pub use persist::{
    BatchPersistor, DualPersistOutcome, FileSink, FileTransaction, JsonTableStore, LocalFileSink,
    MemoryStore, PersistSummary, SinkTransaction, StorageSink,
};
pub use reader::{ConcurrentReader, MergedView, NamedSource, ReportHandle};
pub use record::{
    generate_records, AggregateCount, DirectoryAnalysis, FileFailure, Record, SourceTag,
    StoredRecord, TaggedRecord,
};
pub use report::{FileReportSink, ReportSink};
