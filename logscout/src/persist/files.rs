use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::{AnalysisError, AnalysisResult};

/// Filesystem operations used by [`FileTransaction`]
pub trait FileSink: Send + Sync {
    fn ensure_folder_exists(&self, folder: &Path) -> io::Result<()>;

    /// Creates or truncates `folder/name`; returns the written path
    fn write(&self, folder: &Path, name: &str, content: &[u8]) -> io::Result<PathBuf>;

    /// Current content of `path`, `None` when it does not exist
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;

    /// Removes `path`; a file that is already gone is not an error
    fn delete(&self, path: &Path) -> io::Result<()>;
}

/// [`FileSink`] over the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSink;

impl FileSink for LocalFileSink {
    fn ensure_folder_exists(&self, folder: &Path) -> io::Result<()> {
        fs::create_dir_all(folder)
    }

    fn write(&self, folder: &Path, name: &str, content: &[u8]) -> io::Result<PathBuf> {
        let path = folder.join(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// One side effect the transaction has to be able to undo
#[derive(Debug)]
struct LedgerEntry {
    name: String,
    path: PathBuf,
    previous: Option<Vec<u8>>,
}

/// All-or-nothing writes of a sequence of files into one folder.
///
/// Before each write the transaction snapshots whatever the target path
/// held. If a write fails, every entry of the ledger is undone in reverse
/// order: new files are deleted, pre-existing ones get their old bytes back.
/// An undo step that fails is logged as [`AnalysisError::RollbackFailure`]
/// and the remaining steps still run.
///
/// A transaction dropped before [`commit`](FileTransaction::commit) rolls back.
pub struct FileTransaction<'a> {
    sink: &'a dyn FileSink,
    folder: PathBuf,
    ledger: Vec<LedgerEntry>,
    finished: bool,
}

impl<'a> FileTransaction<'a> {
    pub fn begin(sink: &'a dyn FileSink, folder: impl Into<PathBuf>) -> AnalysisResult<Self> {
        let folder = folder.into();
        sink.ensure_folder_exists(&folder)
            .map_err(|e| AnalysisError::from_io(&folder, e))?;
        debug!("File transaction opened on {}", folder.display());
        Ok(Self {
            sink,
            folder,
            ledger: Vec::new(),
            finished: false,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Number of files written so far
    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    /// Writes one file; on failure rolls everything back before returning
    pub fn write(&mut self, name: &str, content: &[u8]) -> AnalysisResult<PathBuf> {
        let path = self.folder.join(name);
        let position = self.ledger.len() + 1;

        let previous = match self.sink.read(&path) {
            Ok(previous) => previous,
            Err(e) => return Err(self.fail(position, &path, e)),
        };

        // Entered first so a partially written file is undone too
        self.ledger.push(LedgerEntry {
            name: name.to_string(),
            path: path.clone(),
            previous,
        });

        match self.sink.write(&self.folder, name, content) {
            Ok(written) => Ok(written),
            Err(e) => Err(self.fail(position, &path, e)),
        }
    }

    /// Keeps every written file; returns their paths in write order
    pub fn commit(mut self) -> Vec<PathBuf> {
        self.finished = true;
        let paths: Vec<PathBuf> = self.ledger.drain(..).map(|entry| entry.path).collect();
        info!(
            "File transaction committed {} files in {}",
            paths.len(),
            self.folder.display()
        );
        paths
    }

    /// Undoes every write in reverse order; returns the undo steps that failed
    pub fn rollback(&mut self) -> Vec<AnalysisError> {
        self.finished = true;
        let mut failures = Vec::new();

        while let Some(entry) = self.ledger.pop() {
            let undo = match &entry.previous {
                Some(bytes) => self.sink.write(&self.folder, &entry.name, bytes).map(|_| ()),
                None => self.sink.delete(&entry.path),
            };
            if let Err(e) = undo {
                let failure = AnalysisError::rollback_failure(&entry.path, e.to_string());
                warn!("{}", failure);
                failures.push(failure);
            }
        }

        debug!(
            "File transaction on {} rolled back ({} undo failures)",
            self.folder.display(),
            failures.len()
        );
        failures
    }

    fn fail(&mut self, position: usize, path: &Path, err: io::Error) -> AnalysisError {
        warn!(
            "Write of {} failed after {} files: {}",
            path.display(),
            position - 1,
            err
        );
        self.rollback();
        AnalysisError::transaction_failure(
            self.folder.display().to_string(),
            position,
            err.to_string(),
        )
    }
}

impl Drop for FileTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.rollback();
        }
    }
}
