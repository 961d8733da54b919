/// Error types for logscout.
///
/// Every fallible operation in the crate returns [`AnalysisResult`]. The variants
/// fall into a few families:
///
/// - **Resource unavailable**: [`AnalysisError::DirectoryUnavailable`] and
///   [`AnalysisError::SourceUnavailable`] are fatal to the operation that needed
///   the resource.
/// - **Per-unit failures**: a single file failing inside a directory run never
///   surfaces as an error. It is recorded as a `FileFailure` on the run's output
///   and the file simply contributes no record.
/// - **Transactional**: [`AnalysisError::TransactionFailure`] means a flush or a
///   file write failed and everything staged so far was rolled back.
///   [`AnalysisError::RollbackFailure`] describes an undo step that itself failed;
///   it is logged and never retried.
///
/// ```rust,ignore
/// match persistor.persist(&records, "log_analysis") {
///     Ok(summary) => // all records committed,
///     Err(AnalysisError::TransactionFailure { .. }) => // nothing committed,
///     Err(e) => // other errors
/// }
/// ```
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Result type for analysis and persistence operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Errors that can occur while analyzing or persisting logs
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Directory unavailable: {path}: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Source unavailable: {source_id}: {message}")]
    SourceUnavailable { source_id: String, message: String },
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Transaction on '{target}' rolled back at batch {batch}: {message}")]
    TransactionFailure {
        target: String,
        batch: usize,
        message: String,
    },
    #[error("Rollback incomplete for {path}: {message}")]
    RollbackFailure { path: PathBuf, message: String },
    #[error("Timed out after {0:?} waiting for workers")]
    Timeout(Duration),
    #[error("Worker failure: {0}")]
    WorkerFailure(String),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid UTF-8 in file {path}: {source}")]
    EncodingError {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },
}

impl AnalysisError {
    pub fn directory_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn source_unavailable(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn transaction_failure(
        target: impl Into<String>,
        batch: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::TransactionFailure {
            target: target.into(),
            batch,
            message: message.into(),
        }
    }

    pub fn rollback_failure(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::RollbackFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn worker_failure(msg: impl Into<String>) -> Self {
        Self::WorkerFailure(msg.into())
    }

    pub fn store_error(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn encoding_error(path: impl Into<PathBuf>, source: std::string::FromUtf8Error) -> Self {
        Self::EncodingError {
            path: path.into(),
            source,
        }
    }

    /// Maps an I/O error raised while opening `path` onto the matching variant
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }
}
