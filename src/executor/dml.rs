//! Mutation operators.
//!
//! Insert, Update, and Delete are single-shot: the whole batch of side
//! effects runs during the first `next()` call, after which the operator
//! reports end of stream. They never yield rows.
//!
//! Index maintenance differs per operator. Insert rolls back the base
//! record and any index entries already written when a later index
//! insert fails, then re-raises the error. Update maintains indexes
//! first and stops at the first failure without undoing earlier rows.
//! Delete retracts index entries best-effort.

use tracing::{debug, warn};

use crate::catalog::TableMeta;
use crate::datum::Value;
use crate::executor::context::ExecContext;
use crate::executor::error::ExecutorError;
use crate::query::Assignment;
use crate::storage::RecordId;
use crate::tx::WriteRecord;

/// Single-row insert.
pub struct Insert<C: ExecContext> {
    table: TableMeta,
    row: Vec<u8>,
    ctx: C,
    done: bool,
}

impl<C: ExecContext> Insert<C> {
    /// Validates and encodes the row, taking the shared table lock.
    /// Value-count and type errors surface here, before anything is
    /// written.
    pub fn new(table: &TableMeta, values: Vec<Value>, ctx: C) -> Result<Self, ExecutorError> {
        ctx.lock_shared(&table.name);
        if values.len() != table.columns.len() {
            return Err(ExecutorError::ValueCountMismatch {
                table: table.name.clone(),
                expected: table.columns.len(),
                found: values.len(),
            });
        }
        let mut row = vec![0u8; table.record_len()];
        for (col, value) in table.columns.iter().zip(values) {
            let value = value.coerce_to(col.ty)?;
            value.serialize(&mut row[col.offset..col.offset + col.len])?;
        }
        Ok(Insert {
            table: table.clone(),
            row,
            ctx,
            done: false,
        })
    }

    /// No-op; the work happens in [`Insert::next`].
    pub fn begin_tuple(&mut self) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// No-op.
    pub fn next_tuple(&mut self) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// Returns true once the insert has run.
    pub fn is_end(&self) -> bool {
        self.done
    }

    /// Runs the insert on first call. Never yields a row.
    pub fn next(&mut self) -> Result<Option<crate::storage::Record>, ExecutorError> {
        if !self.done {
            self.done = true;
            self.execute()?;
        }
        Ok(None)
    }

    fn execute(&mut self) -> Result<(), ExecutorError> {
        let rid = self.ctx.insert_record(&self.table.name, &self.row)?;
        let mut written: Vec<(Vec<String>, Vec<u8>)> = Vec::new();
        for index in &self.table.indexes {
            let names = index.column_names();
            let key = index.key_of(&self.row);
            if let Err(err) = self.ctx.index_insert(&self.table.name, &names, &key, rid) {
                // Unwind everything this statement wrote, base record
                // included, then surface the failure.
                for (names, key) in &written {
                    let _ = self.ctx.index_delete(&self.table.name, names, key, rid);
                }
                let _ = self.ctx.delete_record(&self.table.name, rid);
                warn!(table = %self.table.name, error = %err, "insert rolled back");
                return Err(ExecutorError::IndexInsert {
                    table: self.table.name.clone(),
                    columns: names,
                });
            }
            written.push((names, key));
        }
        self.ctx
            .append_undo(WriteRecord::insert(&self.table.name, rid));
        debug!(table = %self.table.name, rid = %rid, "record inserted");
        Ok(())
    }
}

/// Batch update over pre-collected target rows.
pub struct Update<C: ExecContext> {
    table: TableMeta,
    assignments: Vec<Assignment>,
    rids: Vec<RecordId>,
    ctx: C,
    done: bool,
}

impl<C: ExecContext> Update<C> {
    /// Builds an update over the rows in `rids`, collected by the portal
    /// before any write starts.
    pub fn new(
        table: &TableMeta,
        assignments: Vec<Assignment>,
        rids: Vec<RecordId>,
        ctx: C,
    ) -> Result<Self, ExecutorError> {
        for set in &assignments {
            table.column(&set.column)?;
        }
        Ok(Update {
            table: table.clone(),
            assignments,
            rids,
            ctx,
            done: false,
        })
    }

    /// No-op; the work happens in [`Update::next`].
    pub fn begin_tuple(&mut self) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// No-op.
    pub fn next_tuple(&mut self) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// Returns true once the update has run.
    pub fn is_end(&self) -> bool {
        self.done
    }

    /// Runs the update on first call. Never yields a row.
    pub fn next(&mut self) -> Result<Option<crate::storage::Record>, ExecutorError> {
        if !self.done {
            self.done = true;
            self.execute()?;
        }
        Ok(None)
    }

    fn execute(&mut self) -> Result<(), ExecutorError> {
        for rid in self.rids.clone() {
            let old = self.ctx.get_record(&self.table.name, rid)?;
            let mut new = old.data().to_vec();
            for set in &self.assignments {
                let col = self.table.column(&set.column)?;
                let value = set.value.clone().coerce_to(col.ty)?;
                value.serialize(&mut new[col.offset..col.offset + col.len])?;
            }
            for index in &self.table.indexes {
                let old_key = index.key_of(old.data());
                let new_key = index.key_of(&new);
                if old_key == new_key {
                    continue;
                }
                let names = index.column_names();
                self.ctx
                    .index_delete(&self.table.name, &names, &old_key, rid)?;
                self.ctx
                    .index_insert(&self.table.name, &names, &new_key, rid)?;
            }
            self.ctx.update_record(&self.table.name, rid, &new)?;
            self.ctx
                .append_undo(WriteRecord::update(&self.table.name, rid, old));
        }
        debug!(table = %self.table.name, rows = self.rids.len(), "records updated");
        Ok(())
    }
}

/// Batch delete over pre-collected target rows.
pub struct Delete<C: ExecContext> {
    table: TableMeta,
    rids: Vec<RecordId>,
    ctx: C,
    done: bool,
}

impl<C: ExecContext> Delete<C> {
    /// Builds a delete over the rows in `rids`. Takes the shared table
    /// lock up front, before the first write.
    pub fn new(table: &TableMeta, rids: Vec<RecordId>, ctx: C) -> Self {
        ctx.lock_shared(&table.name);
        Delete {
            table: table.clone(),
            rids,
            ctx,
            done: false,
        }
    }

    /// No-op; the work happens in [`Delete::next`].
    pub fn begin_tuple(&mut self) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// No-op.
    pub fn next_tuple(&mut self) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// Returns true once the delete has run.
    pub fn is_end(&self) -> bool {
        self.done
    }

    /// Runs the delete on first call. Never yields a row.
    pub fn next(&mut self) -> Result<Option<crate::storage::Record>, ExecutorError> {
        if !self.done {
            self.done = true;
            self.execute()?;
        }
        Ok(None)
    }

    fn execute(&mut self) -> Result<(), ExecutorError> {
        for rid in self.rids.clone() {
            let old = self.ctx.get_record(&self.table.name, rid)?;
            for index in &self.table.indexes {
                let names = index.column_names();
                let key = index.key_of(old.data());
                // Retraction is best-effort; a missing entry is not fatal.
                let _ = self.ctx.index_delete(&self.table.name, &names, &key, rid);
            }
            self.ctx.delete_record(&self.table.name, rid)?;
            self.ctx
                .append_undo(WriteRecord::delete(&self.table.name, rid, old));
        }
        debug!(table = %self.table.name, rows = self.rids.len(), "records deleted");
        Ok(())
    }
}
