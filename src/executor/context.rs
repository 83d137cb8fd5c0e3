//! Execution context: the storage surface operators run against.
//!
//! Operators are generic over [`ExecContext`] so the same tree runs
//! against the in-memory engine in production and against it or a
//! wrapper in tests. Contexts are cheap to clone; every clone addresses
//! the same underlying store.

use std::ops::Bound;

use crate::catalog::IndexMeta;
use crate::storage::{MemoryEngine, Record, RecordId, StorageError};
use crate::tx::WriteRecord;

/// Storage operations available to executor operators.
pub trait ExecContext: Clone {
    /// Takes a shared table-level lock for the running statement.
    fn lock_shared(&self, table: &str);

    /// Appends an undo entry to the transaction write log.
    fn append_undo(&self, entry: WriteRecord);

    /// Returns the positions of all live records, in storage order.
    fn scan_positions(&self, table: &str) -> Result<Vec<RecordId>, StorageError>;

    /// Fetches one record.
    fn get_record(&self, table: &str, rid: RecordId) -> Result<Record, StorageError>;

    /// Stores a new record, returning its position.
    fn insert_record(&self, table: &str, data: &[u8]) -> Result<RecordId, StorageError>;

    /// Overwrites a record in place.
    fn update_record(&self, table: &str, rid: RecordId, data: &[u8])
        -> Result<(), StorageError>;

    /// Removes a record.
    fn delete_record(&self, table: &str, rid: RecordId) -> Result<(), StorageError>;

    /// Returns record ids whose index keys fall within the bounds, in
    /// key order.
    fn index_range(
        &self,
        table: &str,
        columns: &[String],
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
    ) -> Result<Vec<RecordId>, StorageError>;

    /// Adds one index entry.
    fn index_insert(
        &self,
        table: &str,
        columns: &[String],
        key: &[u8],
        rid: RecordId,
    ) -> Result<(), StorageError>;

    /// Removes one index entry.
    fn index_delete(
        &self,
        table: &str,
        columns: &[String],
        key: &[u8],
        rid: RecordId,
    ) -> Result<(), StorageError>;

    /// Creates the backing store for a table.
    fn create_table(&self, table: &str) -> Result<(), StorageError>;

    /// Drops a table store and its indexes.
    fn drop_table(&self, table: &str) -> Result<(), StorageError>;

    /// Creates and backfills an index store.
    fn create_index(&self, index: &IndexMeta) -> Result<(), StorageError>;

    /// Drops an index store.
    fn drop_index(&self, table: &str, columns: &[String]) -> Result<(), StorageError>;
}

impl ExecContext for MemoryEngine {
    fn lock_shared(&self, table: &str) {
        MemoryEngine::lock_shared(self, table)
    }

    fn append_undo(&self, entry: WriteRecord) {
        MemoryEngine::append_undo(self, entry)
    }

    fn scan_positions(&self, table: &str) -> Result<Vec<RecordId>, StorageError> {
        MemoryEngine::scan_positions(self, table)
    }

    fn get_record(&self, table: &str, rid: RecordId) -> Result<Record, StorageError> {
        MemoryEngine::get_record(self, table, rid)
    }

    fn insert_record(&self, table: &str, data: &[u8]) -> Result<RecordId, StorageError> {
        MemoryEngine::insert_record(self, table, data)
    }

    fn update_record(
        &self,
        table: &str,
        rid: RecordId,
        data: &[u8],
    ) -> Result<(), StorageError> {
        MemoryEngine::update_record(self, table, rid, data)
    }

    fn delete_record(&self, table: &str, rid: RecordId) -> Result<(), StorageError> {
        MemoryEngine::delete_record(self, table, rid)
    }

    fn index_range(
        &self,
        table: &str,
        columns: &[String],
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
    ) -> Result<Vec<RecordId>, StorageError> {
        MemoryEngine::index_range(self, table, columns, lower, upper)
    }

    fn index_insert(
        &self,
        table: &str,
        columns: &[String],
        key: &[u8],
        rid: RecordId,
    ) -> Result<(), StorageError> {
        MemoryEngine::index_insert(self, table, columns, key, rid)
    }

    fn index_delete(
        &self,
        table: &str,
        columns: &[String],
        key: &[u8],
        rid: RecordId,
    ) -> Result<(), StorageError> {
        MemoryEngine::index_delete(self, table, columns, key, rid)
    }

    fn create_table(&self, table: &str) -> Result<(), StorageError> {
        MemoryEngine::create_table(self, table)
    }

    fn drop_table(&self, table: &str) -> Result<(), StorageError> {
        MemoryEngine::drop_table(self, table)
    }

    fn create_index(&self, index: &IndexMeta) -> Result<(), StorageError> {
        MemoryEngine::create_index(self, index)
    }

    fn drop_index(&self, table: &str, columns: &[String]) -> Result<(), StorageError> {
        MemoryEngine::drop_index(self, table, columns)
    }
}
