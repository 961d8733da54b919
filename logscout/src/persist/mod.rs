//! Transactional persistence of records.
//!
//! [`BatchPersistor`] writes records to a [`StorageSink`] table in fixed-size
//! batches inside one transaction, and to a folder of per-record files through
//! a [`FileTransaction`]. Either way the outcome is all-or-nothing.

mod files;
mod store;

pub use files::{FileSink, FileTransaction, LocalFileSink};
pub use store::{JsonTableStore, MemoryStore, SinkTransaction, StorageSink};

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AnalyzerConfig;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::metrics::AnalysisMetrics;
use crate::record::Record;
use crate::report::render_record_file;

/// What one committed table transaction wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub target: String,
    pub records: usize,
    pub batches: usize,
}

/// Outcome of [`BatchPersistor::persist_everywhere`]
#[derive(Debug, Clone, Default)]
pub struct DualPersistOutcome {
    pub table: PersistSummary,
    pub files: Vec<PathBuf>,
}

/// A table transaction whose batches have all been flushed but not committed
struct StagedTable<'a> {
    txn: Box<dyn SinkTransaction + 'a>,
    records: usize,
    batches: usize,
}

/// Persists records to a table sink and to a folder of files
#[derive(Clone)]
pub struct BatchPersistor {
    store: Arc<dyn StorageSink>,
    files: Arc<dyn FileSink>,
    batch_size: NonZeroUsize,
    metrics: AnalysisMetrics,
}

impl BatchPersistor {
    pub fn new(store: Arc<dyn StorageSink>, batch_size: NonZeroUsize) -> Self {
        Self {
            store,
            files: Arc::new(LocalFileSink),
            batch_size,
            metrics: AnalysisMetrics::new(),
        }
    }

    pub fn from_config(store: Arc<dyn StorageSink>, config: &AnalyzerConfig) -> Self {
        Self::new(store, config.batch_size)
    }

    pub fn with_file_sink(mut self, files: Arc<dyn FileSink>) -> Self {
        self.files = files;
        self
    }

    pub fn with_metrics(mut self, metrics: AnalysisMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Writes every record to `target` in one transaction.
    ///
    /// Records are flushed in consecutive batches of `batch_size`; the last
    /// batch may be shorter. The transaction commits only after every flush
    /// succeeded. A failing flush or commit rolls the whole transaction back and
    /// returns [`AnalysisError::TransactionFailure`] naming the batch.
    pub fn persist(&self, records: &[Record], target: &str) -> AnalysisResult<PersistSummary> {
        info!("Persisting {} records to {}", records.len(), target);
        let staged = self.stage(records, target)?;
        self.commit_table(staged)
    }

    /// Writes one file per record into `folder`, all or nothing
    pub fn persist_files(&self, records: &[Record], folder: &Path) -> AnalysisResult<Vec<PathBuf>> {
        info!(
            "Writing {} record files to {}",
            records.len(),
            folder.display()
        );
        let txn = self.stage_files(records, folder)?;
        Ok(txn.commit())
    }

    /// Stages the table transaction and the file transaction concurrently and
    /// keeps both only when both succeeded.
    ///
    /// If either side fails, the other is rolled back and the first failure is
    /// returned. Files are kept only after the table commit went through.
    pub fn persist_everywhere(
        &self,
        records: &[Record],
        target: &str,
        folder: &Path,
    ) -> AnalysisResult<DualPersistOutcome> {
        info!(
            "Persisting {} records to {} and {}",
            records.len(),
            target,
            folder.display()
        );

        let (table, files) = rayon::join(
            || self.stage(records, target),
            || self.stage_files(records, folder),
        );

        match (table, files) {
            (Ok(staged), Ok(mut files)) => match self.commit_table(staged) {
                Ok(summary) => Ok(DualPersistOutcome {
                    table: summary,
                    files: files.commit(),
                }),
                Err(e) => {
                    files.rollback();
                    Err(e)
                }
            },
            (Ok(staged), Err(e)) => {
                self.rollback_table(staged.txn);
                Err(e)
            }
            (Err(e), Ok(mut files)) => {
                files.rollback();
                Err(e)
            }
            (Err(e), Err(other)) => {
                warn!("File transaction failed as well: {}", other);
                Err(e)
            }
        }
    }

    fn stage<'a>(&'a self, records: &[Record], target: &str) -> AnalysisResult<StagedTable<'a>> {
        let mut txn = self.store.begin(target)?;
        let mut batches = 0;

        for (index, chunk) in records.chunks(self.batch_size.get()).enumerate() {
            let batch = index + 1;
            if let Err(e) = txn.append_batch(chunk) {
                warn!("Flush of batch {} to {} failed: {}", batch, txn.target(), e);
                self.rollback_table(txn);
                return Err(AnalysisError::transaction_failure(
                    target,
                    batch,
                    e.to_string(),
                ));
            }
            batches = batch;
            self.metrics.record_batch(chunk.len() as u64);
        }

        debug!("Staged {} batches for {}", batches, txn.target());
        Ok(StagedTable {
            txn,
            records: records.len(),
            batches,
        })
    }

    fn commit_table(&self, staged: StagedTable<'_>) -> AnalysisResult<PersistSummary> {
        let StagedTable {
            txn,
            records,
            batches,
        } = staged;
        let target = txn.target().to_string();

        match txn.commit() {
            Ok(committed) => {
                self.metrics.record_commit(committed as u64);
                info!("Committed {} records to {} in {} batches", committed, target, batches);
                Ok(PersistSummary {
                    target,
                    records,
                    batches,
                })
            }
            Err(e) => {
                // A failed commit leaves nothing visible
                self.metrics.record_rollback();
                warn!("Commit to {} failed: {}", target, e);
                Err(AnalysisError::transaction_failure(
                    target,
                    batches,
                    e.to_string(),
                ))
            }
        }
    }

    fn rollback_table(&self, txn: Box<dyn SinkTransaction + '_>) {
        self.metrics.record_rollback();
        let target = txn.target().to_string();
        match txn.rollback() {
            Ok(()) => info!("Rolled back transaction on {}", target),
            Err(e) => warn!(
                "{}",
                AnalysisError::rollback_failure(&target, e.to_string())
            ),
        }
    }

    fn stage_files<'a>(
        &'a self,
        records: &[Record],
        folder: &Path,
    ) -> AnalysisResult<FileTransaction<'a>> {
        let mut txn = FileTransaction::begin(self.files.as_ref(), folder)?;
        for record in records {
            if let Err(e) = txn.write(record.name(), render_record_file(record).as_bytes()) {
                self.metrics.record_rollback();
                return Err(e);
            }
        }
        debug!("Staged {} files in {}", txn.len(), txn.folder().display());
        Ok(txn)
    }
}
