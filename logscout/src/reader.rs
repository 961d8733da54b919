use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AnalyzerConfig;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::persist::StorageSink;
use crate::record::{SourceTag, TaggedRecord};
use crate::report::{render_merged, ReportSink};

/// A table to read and the tag its rows carry in a merged view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSource {
    pub table: String,
    pub tag: SourceTag,
}

impl NamedSource {
    pub fn new(table: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            tag: SourceTag::new(tag),
        }
    }

    /// The directory analysis table, tagged `log-analysis`
    pub fn analysis(config: &AnalyzerConfig) -> Self {
        Self::new(config.analysis_table.clone(), "log-analysis")
    }

    /// The generated batch table, tagged `logs_batch`
    pub fn batch(config: &AnalyzerConfig) -> Self {
        Self::new(config.batch_table.clone(), "logs_batch")
    }
}

/// Rows of the first source in read order, followed by the rows of the second
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedView {
    pub rows: Vec<TaggedRecord>,
}

impl MergedView {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        render_merged(&self.rows)
    }
}

/// Completion of a background report publication
#[derive(Debug)]
pub struct ReportHandle {
    done: Receiver<AnalysisResult<()>>,
}

impl ReportHandle {
    /// Blocks until the report has been published or has failed
    pub fn wait(self) -> AnalysisResult<()> {
        self.done
            .recv()
            .map_err(|_| AnalysisError::worker_failure("report task ended without a result"))?
    }

    /// Like [`wait`](ReportHandle::wait), giving up after `timeout`
    pub fn wait_timeout(self, timeout: Duration) -> AnalysisResult<()> {
        match self.done.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(AnalysisError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(AnalysisError::worker_failure(
                "report task ended without a result",
            )),
        }
    }
}

/// Reads two sources at the same time and merges them into one view
#[derive(Clone)]
pub struct ConcurrentReader {
    store: Arc<dyn StorageSink>,
}

impl ConcurrentReader {
    pub fn new(store: Arc<dyn StorageSink>) -> Self {
        Self { store }
    }

    /// Reads `first` and `second` concurrently and returns `first ++ second`.
    ///
    /// The order is fixed by the arguments, never by which read finished
    /// first. A failure on either side fails the merge.
    pub fn merge(&self, first: &NamedSource, second: &NamedSource) -> AnalysisResult<MergedView> {
        info!("Merging {} and {}", first.table, second.table);

        let (a, b) = rayon::join(|| self.read_tagged(first), || self.read_tagged(second));
        let mut rows = a?;
        rows.extend(b?);

        debug!("Merged view has {} rows", rows.len());
        Ok(MergedView { rows })
    }

    /// Merges like [`merge`](ConcurrentReader::merge), then hands the rendered
    /// view to `sink` in the background.
    ///
    /// The view is returned without waiting for the sink. A publication
    /// failure, including a panicking sink, is logged and reported through
    /// the returned handle only.
    pub fn merge_and_publish(
        &self,
        first: &NamedSource,
        second: &NamedSource,
        sink: Arc<dyn ReportSink>,
    ) -> AnalysisResult<(MergedView, ReportHandle)> {
        let view = self.merge(first, second)?;
        let rendered = view.render();

        let (sender, done) = crossbeam_channel::bounded(1);
        rayon::spawn(move || {
            // The global pool aborts on an escaped panic
            let outcome = catch_unwind(AssertUnwindSafe(|| sink.publish(&rendered)))
                .unwrap_or_else(|_| Err(AnalysisError::worker_failure("report sink panicked")));
            match &outcome {
                Ok(()) => debug!("Merged report published"),
                Err(e) => warn!("Publishing merged report failed: {}", e),
            }
            // Nobody may be waiting on the handle
            let _ = sender.send(outcome);
        });

        Ok((view, ReportHandle { done }))
    }

    fn read_tagged(&self, source: &NamedSource) -> AnalysisResult<Vec<TaggedRecord>> {
        let rows = self.store.read_all(&source.table).map_err(|e| match e {
            AnalysisError::SourceUnavailable { .. } => e,
            other => AnalysisError::source_unavailable(source.table.clone(), other.to_string()),
        })?;
        debug!("Read {} rows from {}", rows.len(), source.table);

        Ok(rows
            .into_iter()
            .map(|stored| TaggedRecord {
                id: stored.id,
                record: stored.record,
                source: source.tag.clone(),
            })
            .collect())
    }
}
