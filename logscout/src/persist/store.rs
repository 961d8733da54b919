use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, trace};

use crate::errors::{AnalysisError, AnalysisResult};
use crate::record::{Record, StoredRecord};

/// A durable, transactional sink for records, addressed by table name.
///
/// Nothing appended through a [`SinkTransaction`] may become visible to
/// [`read_all`](StorageSink::read_all) before `commit` returns successfully.
/// Dropping a transaction without committing discards it.
pub trait StorageSink: Send + Sync {
    /// Opens a transaction against one table
    fn begin<'a>(&'a self, target: &str) -> AnalysisResult<Box<dyn SinkTransaction + 'a>>;

    /// Reads every committed record of a table, ordered by creation
    fn read_all(&self, target: &str) -> AnalysisResult<Vec<StoredRecord>>;
}

/// One in-flight, all-or-nothing unit of work on a table
pub trait SinkTransaction: Send {
    fn target(&self) -> &str;

    /// Sends one batch; it stays invisible until commit
    fn append_batch(&mut self, records: &[Record]) -> AnalysisResult<()>;

    /// Makes every appended batch visible at once; returns the record count
    fn commit(self: Box<Self>) -> AnalysisResult<usize>;

    /// Discards every appended batch
    fn rollback(self: Box<Self>) -> AnalysisResult<()>;
}

fn validate_table_name(table: &str) -> AnalysisResult<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AnalysisError::config_error(format!(
            "Invalid table name '{}'",
            table
        )))
    }
}

fn assign_ids(rows: &mut Vec<StoredRecord>, staged: Vec<Record>) -> usize {
    let mut next_id = rows.iter().map(|r| r.id).max().map_or(1, |max| max + 1);
    let count = staged.len();
    for record in staged {
        rows.push(StoredRecord {
            id: next_id,
            record,
        });
        next_id += 1;
    }
    count
}

/// Keeps each table as a JSON array in `<root>/<table>.json`.
///
/// Commits rewrite the whole table through a temporary file in the same
/// directory that is then renamed over the old one, so readers see either the
/// old table or the new one. A missing table reads as empty.
#[derive(Debug)]
pub struct JsonTableStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl JsonTableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{}.json", table))
    }

    fn load(&self, table: &str) -> AnalysisResult<Vec<StoredRecord>> {
        let path = self.table_path(table);
        if !path.exists() {
            trace!("Table {} has no file yet", table);
            return Ok(Vec::new());
        }

        let file = fs::File::open(&path).map_err(|e| AnalysisError::from_io(&path, e))?;
        let rows: Vec<StoredRecord> = serde_json::from_reader(BufReader::new(file))?;
        Ok(rows)
    }

    fn write_atomic(&self, table: &str, rows: &[StoredRecord]) -> AnalysisResult<()> {
        fs::create_dir_all(&self.root)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(self.table_path(table))
            .map_err(|e| AnalysisError::IoError(e.error))?;
        Ok(())
    }
}

impl StorageSink for JsonTableStore {
    fn begin<'a>(&'a self, target: &str) -> AnalysisResult<Box<dyn SinkTransaction + 'a>> {
        validate_table_name(target)?;
        Ok(Box::new(JsonTransaction {
            store: self,
            table: target.to_string(),
            staged: Vec::new(),
        }))
    }

    fn read_all(&self, target: &str) -> AnalysisResult<Vec<StoredRecord>> {
        validate_table_name(target)?;
        let mut rows = self
            .load(target)
            .map_err(|e| AnalysisError::source_unavailable(target, e.to_string()))?;
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }
}

struct JsonTransaction<'a> {
    store: &'a JsonTableStore,
    table: String,
    staged: Vec<Record>,
}

impl SinkTransaction for JsonTransaction<'_> {
    fn target(&self) -> &str {
        &self.table
    }

    fn append_batch(&mut self, records: &[Record]) -> AnalysisResult<()> {
        self.staged.extend_from_slice(records);
        Ok(())
    }

    fn commit(self: Box<Self>) -> AnalysisResult<usize> {
        let JsonTransaction {
            store,
            table,
            staged,
        } = *self;

        let _guard = store
            .lock
            .lock()
            .map_err(|_| AnalysisError::store_error("table lock poisoned"))?;

        let mut rows = store.load(&table)?;
        let count = assign_ids(&mut rows, staged);
        store.write_atomic(&table, &rows)?;
        debug!("Committed {} records to {}", count, table);
        Ok(count)
    }

    fn rollback(self: Box<Self>) -> AnalysisResult<()> {
        debug!(
            "Discarding {} staged records for {}",
            self.staged.len(),
            self.table
        );
        Ok(())
    }
}

/// In-process tables with the same transactional contract as [`JsonTableStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<StoredRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }
}

impl StorageSink for MemoryStore {
    fn begin<'a>(&'a self, target: &str) -> AnalysisResult<Box<dyn SinkTransaction + 'a>> {
        validate_table_name(target)?;
        Ok(Box::new(MemoryTransaction {
            store: self,
            table: target.to_string(),
            staged: Vec::new(),
        }))
    }

    fn read_all(&self, target: &str) -> AnalysisResult<Vec<StoredRecord>> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| AnalysisError::source_unavailable(target, "table lock poisoned"))?;
        Ok(tables.get(target).cloned().unwrap_or_default())
    }
}

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    table: String,
    staged: Vec<Record>,
}

impl SinkTransaction for MemoryTransaction<'_> {
    fn target(&self) -> &str {
        &self.table
    }

    fn append_batch(&mut self, records: &[Record]) -> AnalysisResult<()> {
        self.staged.extend_from_slice(records);
        Ok(())
    }

    fn commit(self: Box<Self>) -> AnalysisResult<usize> {
        let MemoryTransaction {
            store,
            table,
            staged,
        } = *self;
        let mut tables = store
            .tables
            .lock()
            .map_err(|_| AnalysisError::store_error("table lock poisoned"))?;
        Ok(assign_ids(tables.entry(table).or_default(), staged))
    }

    fn rollback(self: Box<Self>) -> AnalysisResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn records(prefix: &str, n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(format!("{}_{}.log", prefix, i), i as u64, 1))
            .collect()
    }

    #[test]
    fn test_json_store_commit_is_visible() {
        let dir = tempdir().unwrap();
        let store = JsonTableStore::new(dir.path().join("data"));

        let mut txn = store.begin("log_analysis").unwrap();
        txn.append_batch(&records("a", 3)).unwrap();
        txn.append_batch(&records("b", 2)).unwrap();
        assert!(store.read_all("log_analysis").unwrap().is_empty());

        assert_eq!(txn.commit().unwrap(), 5);

        let rows = store.read_all("log_analysis").unwrap();
        let ids: Vec<u64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(rows[3].record.name(), "b_0.log");
        assert!(store.table_path("log_analysis").exists());
    }

    #[test]
    fn test_json_store_rollback_and_drop_discard() {
        let dir = tempdir().unwrap();
        let store = JsonTableStore::new(dir.path());

        let mut txn = store.begin("logs_batch").unwrap();
        txn.append_batch(&records("x", 4)).unwrap();
        txn.rollback().unwrap();

        {
            let mut txn = store.begin("logs_batch").unwrap();
            txn.append_batch(&records("y", 4)).unwrap();
        }

        assert!(store.read_all("logs_batch").unwrap().is_empty());
        assert!(!store.table_path("logs_batch").exists());
    }

    #[test]
    fn test_json_store_ids_continue_across_commits() {
        let dir = tempdir().unwrap();
        let store = JsonTableStore::new(dir.path());

        for _ in 0..2 {
            let mut txn = store.begin("t").unwrap();
            txn.append_batch(&records("same", 2)).unwrap();
            txn.commit().unwrap();
        }

        let rows = store.read_all("t").unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows.last().unwrap().id, 4);
        // Same names accumulate as distinct rows
        assert_eq!(rows[0].record.name(), rows[2].record.name());
    }

    #[test]
    fn test_corrupt_table_is_unavailable() {
        let dir = tempdir().unwrap();
        let store = JsonTableStore::new(dir.path());
        fs::write(store.table_path("broken"), "{ not json").unwrap();

        assert!(matches!(
            store.read_all("broken"),
            Err(AnalysisError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_table_names_are_validated() {
        let dir = tempdir().unwrap();
        let store = JsonTableStore::new(dir.path());
        assert!(store.begin("../escape").is_err());
        assert!(store.read_all("").is_err());
    }

    #[test]
    fn test_memory_store_contract() {
        let store = MemoryStore::new();

        let mut txn = store.begin("t").unwrap();
        txn.append_batch(&records("m", 3)).unwrap();
        assert!(store.read_all("t").unwrap().is_empty());
        txn.commit().unwrap();

        let mut txn = store.begin("t").unwrap();
        txn.append_batch(&records("n", 3)).unwrap();
        txn.rollback().unwrap();

        let rows = store.read_all("t").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].id, 3);
    }
}
