//! In-memory storage engine.
//!
//! [`MemoryEngine`] is the record and index store behind the executor. It
//! keeps each table as a slotted vector of fixed-length byte records and
//! each index as an ordered map from encoded key bytes to record ids.
//! Because index keys use the order-preserving encoding from
//! [`Value::encode_key`](crate::datum::Value::encode_key), byte order of
//! the map is value order of the key columns, and range scans fall out of
//! [`BTreeMap::range`].
//!
//! The engine is internally synchronized and cheap to clone: clones share
//! one underlying store, which is how executor operators and the embedding
//! application see the same data.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::catalog::IndexMeta;
use crate::tx::WriteRecord;

/// Errors from storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// Table has no backing store.
    TableNotFound(String),
    /// Table store already exists.
    TableExists(String),
    /// Record id does not refer to a live record.
    RecordNotFound {
        /// Table searched.
        table: String,
        /// Missing record id.
        rid: RecordId,
    },
    /// No index store for the given column list.
    IndexNotFound {
        /// Table searched.
        table: String,
        /// Key columns of the missing index.
        columns: Vec<String>,
    },
    /// Insert into a unique index with an existing key.
    DuplicateKey {
        /// Table of the index.
        table: String,
        /// Key columns of the index.
        columns: Vec<String>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::TableNotFound(name) => write!(f, "no store for table: {}", name),
            StorageError::TableExists(name) => write!(f, "store already exists: {}", name),
            StorageError::RecordNotFound { table, rid } => {
                write!(f, "record not found: {} at {}", table, rid)
            }
            StorageError::IndexNotFound { table, columns } => {
                write!(f, "no index store: {}({})", table, columns.join(", "))
            }
            StorageError::DuplicateKey { table, columns } => {
                write!(
                    f,
                    "duplicate key on unique index {}({})",
                    table,
                    columns.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for StorageError {}

/// Position of a record within a table store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    /// Page number. The in-memory engine uses a single page.
    pub page_no: u32,
    /// Slot within the page.
    pub slot_no: u32,
}

impl RecordId {
    /// Builds a record id on page zero.
    pub fn new(slot_no: u32) -> Self {
        RecordId { page_no: 0, slot_no }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_no, self.slot_no)
    }
}

/// An immutable record: the raw bytes of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    data: Bytes,
}

impl Record {
    /// Wraps raw record bytes.
    pub fn new(data: Bytes) -> Self {
        Record { data }
    }

    /// Builds a record from a byte vector.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Record { data: data.into() }
    }

    /// Returns the record bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the record length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the record holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

struct IndexStore {
    /// Key columns in index order; identifies the index within its table.
    columns: Vec<String>,
    unique: bool,
    map: BTreeMap<Vec<u8>, Vec<RecordId>>,
}

#[derive(Default)]
struct TableStore {
    /// Slot-addressed records; `None` marks a deleted slot.
    records: Vec<Option<Bytes>>,
    indexes: Vec<IndexStore>,
}

impl TableStore {
    fn record(&self, table: &str, rid: RecordId) -> Result<&Bytes, StorageError> {
        self.records
            .get(rid.slot_no as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| StorageError::RecordNotFound {
                table: table.to_string(),
                rid,
            })
    }

    fn index_mut(
        &mut self,
        table: &str,
        columns: &[String],
    ) -> Result<&mut IndexStore, StorageError> {
        self.indexes
            .iter_mut()
            .find(|ix| ix.columns == columns)
            .ok_or_else(|| StorageError::IndexNotFound {
                table: table.to_string(),
                columns: columns.to_vec(),
            })
    }
}

#[derive(Default)]
struct EngineInner {
    tables: HashMap<String, TableStore>,
    undo: Vec<WriteRecord>,
    locked: BTreeSet<String>,
}

/// Shared in-memory record and index store.
#[derive(Clone, Default)]
pub struct MemoryEngine {
    inner: Arc<Mutex<EngineInner>>,
}

impl MemoryEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        MemoryEngine::default()
    }

    /// Creates the backing store for a table.
    pub fn create_table(&self, table: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.tables.contains_key(table) {
            return Err(StorageError::TableExists(table.to_string()));
        }
        inner.tables.insert(table.to_string(), TableStore::default());
        Ok(())
    }

    /// Drops a table store along with its indexes.
    pub fn drop_table(&self, table: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner
            .tables
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))
    }

    /// Creates an index store and backfills it from existing records.
    pub fn create_index(&self, index: &IndexMeta) -> Result<(), StorageError> {
        self.create_index_with(index, false)
    }

    /// Creates a unique index store. Backfill fails on the first
    /// duplicate key and leaves no partial index behind.
    pub fn create_unique_index(&self, index: &IndexMeta) -> Result<(), StorageError> {
        self.create_index_with(index, true)
    }

    fn create_index_with(&self, index: &IndexMeta, unique: bool) -> Result<(), StorageError> {
        let table = index.columns[0].table.clone();
        let columns = index.column_names();
        let mut inner = self.inner.lock();
        let store = inner
            .tables
            .get_mut(&table)
            .ok_or_else(|| StorageError::TableNotFound(table.clone()))?;

        let mut map: BTreeMap<Vec<u8>, Vec<RecordId>> = BTreeMap::new();
        for (slot, rec) in store.records.iter().enumerate() {
            if let Some(data) = rec {
                let key = index.key_of(data);
                let entry = map.entry(key).or_default();
                if unique && !entry.is_empty() {
                    return Err(StorageError::DuplicateKey {
                        table,
                        columns,
                    });
                }
                entry.push(RecordId::new(slot as u32));
            }
        }
        store.indexes.push(IndexStore {
            columns,
            unique,
            map,
        });
        Ok(())
    }

    /// Drops the index store keyed on `columns`.
    pub fn drop_index(&self, table: &str, columns: &[String]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let store = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        let pos = store.indexes.iter().position(|ix| ix.columns == columns);
        match pos {
            Some(i) => {
                store.indexes.remove(i);
                Ok(())
            }
            None => Err(StorageError::IndexNotFound {
                table: table.to_string(),
                columns: columns.to_vec(),
            }),
        }
    }

    /// Returns the positions of all live records, in slot order.
    pub fn scan_positions(&self, table: &str) -> Result<Vec<RecordId>, StorageError> {
        let inner = self.inner.lock();
        let store = inner
            .tables
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        Ok(store
            .records
            .iter()
            .enumerate()
            .filter(|(_, rec)| rec.is_some())
            .map(|(slot, _)| RecordId::new(slot as u32))
            .collect())
    }

    /// Fetches a record by position.
    pub fn get_record(&self, table: &str, rid: RecordId) -> Result<Record, StorageError> {
        let inner = self.inner.lock();
        let store = inner
            .tables
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        Ok(Record::new(store.record(table, rid)?.clone()))
    }

    /// Appends a record, returning its position.
    pub fn insert_record(&self, table: &str, data: &[u8]) -> Result<RecordId, StorageError> {
        let mut inner = self.inner.lock();
        let store = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        let slot = store.records.len() as u32;
        store.records.push(Some(Bytes::copy_from_slice(data)));
        Ok(RecordId::new(slot))
    }

    /// Overwrites a record in place.
    pub fn update_record(
        &self,
        table: &str,
        rid: RecordId,
        data: &[u8],
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let store = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        store.record(table, rid)?;
        store.records[rid.slot_no as usize] = Some(Bytes::copy_from_slice(data));
        Ok(())
    }

    /// Removes a record, leaving its slot dead.
    pub fn delete_record(&self, table: &str, rid: RecordId) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let store = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        store.record(table, rid)?;
        store.records[rid.slot_no as usize] = None;
        Ok(())
    }

    /// Returns the record ids whose encoded keys fall within the bounds,
    /// in key order. An empty range (lower above upper, or equal bounds
    /// with either side excluded) yields no ids; contradictory
    /// predicates fold into exactly such a range.
    pub fn index_range(
        &self,
        table: &str,
        columns: &[String],
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
    ) -> Result<Vec<RecordId>, StorageError> {
        if range_is_empty(&lower, &upper) {
            return Ok(Vec::new());
        }
        let mut inner = self.inner.lock();
        let store = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        let ix = store.index_mut(table, columns)?;
        let mut rids = Vec::new();
        for (_, entries) in ix.map.range((lower, upper)) {
            rids.extend_from_slice(entries);
        }
        Ok(rids)
    }

    /// Adds one index entry.
    pub fn index_insert(
        &self,
        table: &str,
        columns: &[String],
        key: &[u8],
        rid: RecordId,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let store = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        let ix = store.index_mut(table, columns)?;
        let entry = ix.map.entry(key.to_vec()).or_default();
        if ix.unique && !entry.is_empty() {
            return Err(StorageError::DuplicateKey {
                table: table.to_string(),
                columns: columns.to_vec(),
            });
        }
        entry.push(rid);
        Ok(())
    }

    /// Removes one index entry. Removing an absent entry is a no-op.
    pub fn index_delete(
        &self,
        table: &str,
        columns: &[String],
        key: &[u8],
        rid: RecordId,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let store = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        let ix = store.index_mut(table, columns)?;
        if let Some(entries) = ix.map.get_mut(key) {
            entries.retain(|r| *r != rid);
            if entries.is_empty() {
                ix.map.remove(key);
            }
        }
        Ok(())
    }

    /// Records a shared table-level lock for the running statement.
    pub fn lock_shared(&self, table: &str) {
        self.inner.lock().locked.insert(table.to_string());
    }

    /// Returns the tables currently holding a shared lock, sorted.
    pub fn held_locks(&self) -> Vec<String> {
        self.inner.lock().locked.iter().cloned().collect()
    }

    /// Appends an undo entry to the transaction write log.
    pub fn append_undo(&self, entry: WriteRecord) {
        self.inner.lock().undo.push(entry);
    }

    /// Returns a snapshot of the transaction write log.
    pub fn undo_log(&self) -> Vec<WriteRecord> {
        self.inner.lock().undo.clone()
    }
}

/// `BTreeMap::range` panics on a start above its end; an empty interval
/// has to be caught before the map is consulted.
fn range_is_empty(lower: &Bound<Vec<u8>>, upper: &Bound<Vec<u8>>) -> bool {
    let (lo, lo_inclusive) = match lower {
        Bound::Unbounded => return false,
        Bound::Included(key) => (key, true),
        Bound::Excluded(key) => (key, false),
    };
    let (hi, hi_inclusive) = match upper {
        Bound::Unbounded => return false,
        Bound::Included(key) => (key, true),
        Bound::Excluded(key) => (key, false),
    };
    match lo.cmp(hi) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Equal => !(lo_inclusive && hi_inclusive),
        std::cmp::Ordering::Less => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, ColumnDef};
    use crate::datum::Value;

    fn engine_with_table() -> (MemoryEngine, Catalog) {
        let mut catalog = Catalog::new();
        catalog
            .create_table("t", &[ColumnDef::int("a"), ColumnDef::int("b")])
            .unwrap();
        let engine = MemoryEngine::new();
        engine.create_table("t").unwrap();
        (engine, catalog)
    }

    fn row(a: i32, b: i32) -> Vec<u8> {
        let mut data = vec![0u8; 8];
        Value::Int(a).serialize(&mut data[0..4]).unwrap();
        Value::Int(b).serialize(&mut data[4..8]).unwrap();
        data
    }

    #[test]
    fn test_record_lifecycle() {
        let (engine, _) = engine_with_table();
        let rid = engine.insert_record("t", &row(1, 10)).unwrap();
        assert_eq!(engine.get_record("t", rid).unwrap().data(), &row(1, 10)[..]);

        engine.update_record("t", rid, &row(1, 20)).unwrap();
        assert_eq!(engine.get_record("t", rid).unwrap().data(), &row(1, 20)[..]);

        engine.delete_record("t", rid).unwrap();
        assert!(matches!(
            engine.get_record("t", rid),
            Err(StorageError::RecordNotFound { .. })
        ));
        assert!(engine.scan_positions("t").unwrap().is_empty());
    }

    #[test]
    fn test_scan_skips_dead_slots() {
        let (engine, _) = engine_with_table();
        let r0 = engine.insert_record("t", &row(1, 10)).unwrap();
        let r1 = engine.insert_record("t", &row(2, 20)).unwrap();
        let r2 = engine.insert_record("t", &row(3, 30)).unwrap();
        engine.delete_record("t", r1).unwrap();
        assert_eq!(engine.scan_positions("t").unwrap(), vec![r0, r2]);
    }

    #[test]
    fn test_index_backfill_and_range() {
        let (engine, mut catalog) = engine_with_table();
        for (a, b) in [(3, 30), (1, 10), (2, 20)] {
            engine.insert_record("t", &row(a, b)).unwrap();
        }
        let ix = catalog.create_index("t", &["a".to_string()]).unwrap().clone();
        engine.create_index(&ix).unwrap();

        let mut lower = Vec::new();
        Value::Int(2).encode_key(4, &mut lower);
        let rids = engine
            .index_range(
                "t",
                &["a".to_string()],
                Bound::Included(lower),
                Bound::Unbounded,
            )
            .unwrap();
        // Key order: a=2 (slot 2) before a=3 (slot 0).
        assert_eq!(rids, vec![RecordId::new(2), RecordId::new(0)]);
    }

    #[test]
    fn test_empty_ranges_yield_no_ids() {
        let (engine, mut catalog) = engine_with_table();
        for (a, b) in [(1, 10), (5, 50)] {
            engine.insert_record("t", &row(a, b)).unwrap();
        }
        let ix = catalog.create_index("t", &["a".to_string()]).unwrap().clone();
        engine.create_index(&ix).unwrap();

        let key = |v: i32| {
            let mut key = Vec::new();
            Value::Int(v).encode_key(4, &mut key);
            key
        };
        // Lower above upper.
        let rids = engine
            .index_range(
                "t",
                &["a".to_string()],
                Bound::Excluded(key(5)),
                Bound::Excluded(key(2)),
            )
            .unwrap();
        assert!(rids.is_empty());
        // Equal bounds with one side excluded.
        let rids = engine
            .index_range(
                "t",
                &["a".to_string()],
                Bound::Excluded(key(5)),
                Bound::Included(key(5)),
            )
            .unwrap();
        assert!(rids.is_empty());
        // Equal inclusive bounds stay a point lookup.
        let rids = engine
            .index_range(
                "t",
                &["a".to_string()],
                Bound::Included(key(5)),
                Bound::Included(key(5)),
            )
            .unwrap();
        assert_eq!(rids, vec![RecordId::new(1)]);
    }

    #[test]
    fn test_unique_index_rejects_duplicates() {
        let (engine, mut catalog) = engine_with_table();
        engine.insert_record("t", &row(1, 10)).unwrap();
        let ix = catalog.create_index("t", &["a".to_string()]).unwrap().clone();
        engine.create_unique_index(&ix).unwrap();

        let mut key = Vec::new();
        Value::Int(1).encode_key(4, &mut key);
        assert!(matches!(
            engine.index_insert("t", &["a".to_string()], &key, RecordId::new(9)),
            Err(StorageError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_index_delete_absent_is_noop() {
        let (engine, mut catalog) = engine_with_table();
        let ix = catalog.create_index("t", &["a".to_string()]).unwrap().clone();
        engine.create_index(&ix).unwrap();
        engine
            .index_delete("t", &["a".to_string()], b"missing", RecordId::new(0))
            .unwrap();
    }
}
