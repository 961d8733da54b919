use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{AnalysisError, AnalysisResult};

/// Configuration for analysis and persistence runs.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag
/// 2. Local `.logscout.yaml` in the current directory
/// 3. Global `logscout/config.yaml` under the platform config directory
///    (`~/.config` on Linux, `~/Library/Application Support` on macOS,
///    `%APPDATA%` on Windows)
///
/// # Configuration Format
///
/// ```yaml
/// # Keyword counted in every file (case-insensitive)
/// keyword: "error"
/// keyword_is_regex: false
///
/// # Worker threads (default: CPU cores)
/// thread_count: 4
///
/// # Records per flush inside one transaction
/// batch_size: 50
///
/// # Lines at or below which recursive splitting stops
/// recursive_threshold: 500
///
/// # Where the default JSON table store keeps its tables
/// data_dir: ".logscout/data"
/// ```
///
/// When using the CLI, command-line arguments take precedence over config file values.
/// The merging behavior is defined in the `merge_with_cli` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Keyword pattern counted case-insensitively
    #[serde(default = "default_keyword")]
    pub keyword: String,

    /// Treat `keyword` as a regular expression instead of a literal
    #[serde(default)]
    pub keyword_is_regex: bool,

    /// Number of worker threads for every engine
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Records flushed per batch inside one transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: NonZeroUsize,

    /// Leaf size for the recursive strategy
    #[serde(default = "default_recursive_threshold")]
    pub recursive_threshold: NonZeroUsize,

    /// Bounded wait for the partitioned strategy, in seconds
    #[serde(default = "default_partition_timeout_secs")]
    pub partition_timeout_secs: u64,

    /// Line count at which `Strategy::Auto` switches to the recursive strategy
    #[serde(default = "default_strategy_line_threshold")]
    pub strategy_line_threshold: usize,

    /// How to handle invalid UTF-8 in analyzed files
    #[serde(default)]
    pub encoding_mode: EncodingMode,

    /// Directory holding the JSON tables
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Table receiving directory analysis results
    #[serde(default = "default_analysis_table")]
    pub analysis_table: String,

    /// Table receiving generated batches
    #[serde(default = "default_batch_table")]
    pub batch_table: String,

    /// Folder receiving one file per record in filesystem transactions
    #[serde(default = "default_output_folder")]
    pub output_folder: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// How to handle files that are not valid UTF-8
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// The file fails and contributes no record
    #[default]
    FailFast,
    /// Invalid sequences are replaced with U+FFFD
    Lossy,
}

impl std::str::FromStr for EncodingMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "failfast" => Ok(EncodingMode::FailFast),
            "lossy" => Ok(EncodingMode::Lossy),
            other => Err(AnalysisError::config_error(format!(
                "Unknown encoding mode '{}'",
                other
            ))),
        }
    }
}

fn default_keyword() -> String {
    "error".to_string()
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_batch_size() -> NonZeroUsize {
    NonZeroUsize::new(50).unwrap_or(NonZeroUsize::MIN)
}

fn default_recursive_threshold() -> NonZeroUsize {
    NonZeroUsize::new(500).unwrap_or(NonZeroUsize::MIN)
}

fn default_partition_timeout_secs() -> u64 {
    60
}

fn default_strategy_line_threshold() -> usize {
    1_000_000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".logscout").join("data")
}

fn default_analysis_table() -> String {
    "log_analysis".to_string()
}

fn default_batch_table() -> String {
    "logs_batch".to_string()
}

fn default_output_folder() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            keyword: default_keyword(),
            keyword_is_regex: false,
            thread_count: default_thread_count(),
            batch_size: default_batch_size(),
            recursive_threshold: default_recursive_threshold(),
            partition_timeout_secs: default_partition_timeout_secs(),
            strategy_line_threshold: default_strategy_line_threshold(),
            encoding_mode: EncodingMode::default(),
            data_dir: default_data_dir(),
            analysis_table: default_analysis_table(),
            batch_table: default_batch_table(),
            output_folder: default_output_folder(),
            log_level: default_log_level(),
        }
    }
}

/// Overrides supplied on the command line; `None` keeps the file value
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub keyword: Option<String>,
    pub keyword_is_regex: bool,
    pub thread_count: Option<NonZeroUsize>,
    pub batch_size: Option<NonZeroUsize>,
    pub recursive_threshold: Option<NonZeroUsize>,
    pub partition_timeout: Option<Duration>,
    pub encoding_mode: Option<EncodingMode>,
    pub data_dir: Option<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// `logscout/config.yaml` under the platform config directory
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("logscout").join("config.yaml"))
}

impl AnalyzerConfig {
    /// Loads configuration from a specific file on top of the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            global_config_path(),
            Some(PathBuf::from(".logscout.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicit file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(keyword) = cli.keyword {
            self.keyword = keyword;
        }
        if cli.keyword_is_regex {
            self.keyword_is_regex = true;
        }
        if let Some(threads) = cli.thread_count {
            self.thread_count = threads;
        }
        if let Some(batch_size) = cli.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(threshold) = cli.recursive_threshold {
            self.recursive_threshold = threshold;
        }
        if let Some(timeout) = cli.partition_timeout {
            self.partition_timeout_secs = timeout.as_secs().max(1);
        }
        if let Some(mode) = cli.encoding_mode {
            self.encoding_mode = mode;
        }
        if let Some(dir) = cli.data_dir {
            self.data_dir = dir;
        }
        if let Some(folder) = cli.output_folder {
            self.output_folder = folder;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Bounded wait used by the partitioned strategy
    pub fn partition_timeout(&self) -> Duration {
        Duration::from_secs(self.partition_timeout_secs)
    }

    /// Rejects values the engines cannot run with
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.keyword.is_empty() {
            return Err(AnalysisError::invalid_pattern("keyword cannot be empty"));
        }
        if self.partition_timeout_secs == 0 {
            return Err(AnalysisError::config_error(
                "partition_timeout_secs must be at least 1",
            ));
        }
        if self.analysis_table.is_empty() || self.batch_table.is_empty() {
            return Err(AnalysisError::config_error("table names cannot be empty"));
        }
        Ok(())
    }
}
