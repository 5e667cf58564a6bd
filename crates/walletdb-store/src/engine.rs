//! Persistent engine binding.
//!
//! [`Engine`] is the narrow surface the key-value store needs from the
//! underlying database: single-key get/put/delete and a forward scan over a
//! consistent snapshot. [`RedbEngine`] implements it on top of redb; each
//! engine owns one database file for its whole lifetime.

use crate::tables;
use redb::{Database, ReadableTable, ReadableTableMetadata};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use walletdb_common::{Error, Result};

/// File name of the redb database inside a store directory
pub const DB_FILE_NAME: &str = "store.redb";

/// Minimal ordered key-value engine
pub trait Engine: Send + Sync {
    /// Look up a key; `Ok(None)` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite.
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Insert only if the key is absent. Returns `false` without writing if
    /// a value already exists.
    fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool>;

    /// Remove a key. Absent keys are not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Visit keys in engine order without touching values.
    fn scan_keys(&self, visit: &mut dyn FnMut(&str) -> ControlFlow<()>) -> Result<()>;

    /// Visit key/value pairs in engine order.
    fn scan(&self, visit: &mut dyn FnMut(&str, &[u8]) -> ControlFlow<()>) -> Result<()>;

    /// Number of stored keys
    fn count(&self) -> Result<u64>;
}

/// Error type for redb operations
#[derive(Debug, thiserror::Error)]
pub(crate) enum EngineError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
}

impl From<redb::TransactionError> for EngineError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<EngineError> for Error {
    fn from(e: EngineError) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}

type EngineResult<T> = std::result::Result<T, EngineError>;

/// Engine backed by a single redb database file.
pub struct RedbEngine {
    db: Database,
    path: PathBuf,
}

impl RedbEngine {
    /// Open (or create) the database at `dir/store.redb`.
    ///
    /// `dir` must already exist.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(DB_FILE_NAME);
        Ok(Self::open_file(&path)?)
    }

    fn open_file(path: &Path) -> EngineResult<Self> {
        let db = Database::create(path)?;

        // Create the table eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::RECORDS)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_bytes(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::RECORDS)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn put_bytes(&self, key: &str, value: &[u8]) -> EngineResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::RECORDS)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn put_bytes_if_absent(&self, key: &str, value: &[u8]) -> EngineResult<bool> {
        // Write transactions are exclusive, so the check and the insert
        // cannot interleave with another writer.
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(tables::RECORDS)?;
            let exists = table.get(key)?.is_some();
            if exists {
                false
            } else {
                table.insert(key, value)?;
                true
            }
        };
        if inserted {
            write_txn.commit()?;
        }
        Ok(inserted)
    }

    fn delete_key(&self, key: &str) -> EngineResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::RECORDS)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn scan_table_keys(&self, visit: &mut dyn FnMut(&str) -> ControlFlow<()>) -> EngineResult<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::RECORDS)?;
        for entry in table.iter()? {
            let (key, _) = entry?;
            if visit(key.value()).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn scan_table(&self, visit: &mut dyn FnMut(&str, &[u8]) -> ControlFlow<()>) -> EngineResult<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::RECORDS)?;
        for entry in table.iter()? {
            let (key, value) = entry?;
            if visit(key.value(), value.value()).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn table_len(&self) -> EngineResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::RECORDS)?;
        Ok(table.len()?)
    }
}

impl Engine for RedbEngine {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get_bytes(key)?)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        Ok(self.put_bytes(key, value)?)
    }

    fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool> {
        Ok(self.put_bytes_if_absent(key, value)?)
    }

    fn delete(&self, key: &str) -> Result<()> {
        Ok(self.delete_key(key)?)
    }

    fn scan_keys(&self, visit: &mut dyn FnMut(&str) -> ControlFlow<()>) -> Result<()> {
        Ok(self.scan_table_keys(visit)?)
    }

    fn scan(&self, visit: &mut dyn FnMut(&str, &[u8]) -> ControlFlow<()>) -> Result<()> {
        Ok(self.scan_table(visit)?)
    }

    fn count(&self) -> Result<u64> {
        Ok(self.table_len()?)
    }
}
