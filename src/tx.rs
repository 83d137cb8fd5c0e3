//! Transaction write log.
//!
//! Mutating operators append one [`WriteRecord`] per affected row so a
//! future rollback can restore the pre-image. An insert is undone by
//! deleting the new row, so only updates and deletes carry an old record.

use crate::storage::{Record, RecordId};

/// Kind of write being logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Row inserted; undo deletes it.
    Insert,
    /// Row overwritten; undo restores the old record.
    Update,
    /// Row removed; undo re-inserts the old record.
    Delete,
}

/// One entry in the transaction write log.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    /// Write kind.
    pub kind: WriteKind,
    /// Affected table.
    pub table: String,
    /// Affected row position.
    pub rid: RecordId,
    /// Pre-image for updates and deletes.
    pub old: Option<Record>,
}

impl WriteRecord {
    /// Logs an insert; the undo deletes the row, so no pre-image is kept.
    pub fn insert(table: &str, rid: RecordId) -> Self {
        WriteRecord {
            kind: WriteKind::Insert,
            table: table.to_string(),
            rid,
            old: None,
        }
    }

    /// Logs an update, keeping the overwritten record.
    pub fn update(table: &str, rid: RecordId, old: Record) -> Self {
        WriteRecord {
            kind: WriteKind::Update,
            table: table.to_string(),
            rid,
            old: Some(old),
        }
    }

    /// Logs a delete, keeping the removed record.
    pub fn delete(table: &str, rid: RecordId, old: Record) -> Self {
        WriteRecord {
            kind: WriteKind::Delete,
            table: table.to_string(),
            rid,
            old: Some(old),
        }
    }
}
