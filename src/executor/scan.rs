//! Table access operators.
//!
//! [`SeqScan`] walks every live record; [`IndexScan`] walks only the
//! records an index range admits. Both evaluate their full predicate
//! list per row, so an index range that is a superset of the matching
//! rows (which it always is) never changes results, only the number of
//! records touched.

use std::ops::Bound;

use crate::catalog::{ColumnMeta, IndexMeta};
use crate::datum::Value;
use crate::executor::context::ExecContext;
use crate::executor::error::ExecutorError;
use crate::executor::eval::eval_conditions;
use crate::planner::ColumnRange;
use crate::query::{CompOp, Condition, Operand};
use crate::storage::{Record, RecordId};

/// Sequential scan over one table.
pub struct SeqScan<C: ExecContext> {
    table: String,
    columns: Vec<ColumnMeta>,
    conditions: Vec<Condition>,
    ctx: C,
    rids: Vec<RecordId>,
    pos: usize,
    current: Option<(RecordId, Record)>,
    begun: bool,
}

impl<C: ExecContext> SeqScan<C> {
    /// Builds a sequential scan. `columns` is the table schema.
    pub fn new(
        table: &str,
        columns: Vec<ColumnMeta>,
        conditions: Vec<Condition>,
        ctx: C,
    ) -> Self {
        SeqScan {
            table: table.to_string(),
            columns,
            conditions,
            ctx,
            rids: Vec::new(),
            pos: 0,
            current: None,
            begun: false,
        }
    }

    /// Positions on the first qualifying record.
    pub fn begin_tuple(&mut self) -> Result<(), ExecutorError> {
        self.ctx.lock_shared(&self.table);
        self.rids = self.ctx.scan_positions(&self.table)?;
        self.pos = 0;
        self.begun = true;
        self.seek_qualifying()
    }

    /// Advances past the current record. A no-op at end of stream.
    pub fn next_tuple(&mut self) -> Result<(), ExecutorError> {
        if self.current.is_none() {
            return Ok(());
        }
        self.pos += 1;
        self.seek_qualifying()
    }

    /// Returns true once the scan is exhausted.
    pub fn is_end(&self) -> bool {
        self.begun && self.current.is_none()
    }

    /// Materializes the current record, self-initializing if the caller
    /// skipped `begin_tuple`.
    pub fn next(&mut self) -> Result<Option<Record>, ExecutorError> {
        if !self.begun {
            self.begin_tuple()?;
        }
        Ok(self.current.as_ref().map(|(_, rec)| rec.clone()))
    }

    /// Returns the position of the current record.
    pub fn current_rid(&self) -> Option<RecordId> {
        self.current.as_ref().map(|(rid, _)| *rid)
    }

    /// Returns the output schema.
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn seek_qualifying(&mut self) -> Result<(), ExecutorError> {
        while self.pos < self.rids.len() {
            let rid = self.rids[self.pos];
            let rec = self.ctx.get_record(&self.table, rid)?;
            if eval_conditions(&self.columns, &self.conditions, rec.data())? {
                self.current = Some((rid, rec));
                return Ok(());
            }
            self.pos += 1;
        }
        self.current = None;
        Ok(())
    }
}

/// Index-assisted scan over one table.
///
/// A single-column index serves a key range folded from the predicates
/// on its column; a composite index serves an equality lookup on the
/// full key, falling back to a full index walk when any key column
/// lacks an equality predicate.
pub struct IndexScan<C: ExecContext> {
    table: String,
    columns: Vec<ColumnMeta>,
    conditions: Vec<Condition>,
    index: IndexMeta,
    ctx: C,
    rids: Vec<RecordId>,
    pos: usize,
    current: Option<(RecordId, Record)>,
    begun: bool,
}

impl<C: ExecContext> IndexScan<C> {
    /// Builds an index scan over `index`. `columns` is the table schema;
    /// `conditions` is the leaf's full predicate list.
    pub fn new(
        table: &str,
        columns: Vec<ColumnMeta>,
        conditions: Vec<Condition>,
        index: IndexMeta,
        ctx: C,
    ) -> Self {
        IndexScan {
            table: table.to_string(),
            columns,
            conditions,
            index,
            ctx,
            rids: Vec::new(),
            pos: 0,
            current: None,
            begun: false,
        }
    }

    /// Positions on the first qualifying record within the key range.
    pub fn begin_tuple(&mut self) -> Result<(), ExecutorError> {
        self.ctx.lock_shared(&self.table);
        let (lower, upper) = self.key_bounds();
        let names = self.index.column_names();
        self.rids = self.ctx.index_range(&self.table, &names, lower, upper)?;
        self.pos = 0;
        self.begun = true;
        self.seek_qualifying()
    }

    /// Advances past the current record. A no-op at end of stream.
    pub fn next_tuple(&mut self) -> Result<(), ExecutorError> {
        if self.current.is_none() {
            return Ok(());
        }
        self.pos += 1;
        self.seek_qualifying()
    }

    /// Returns true once the scan is exhausted.
    pub fn is_end(&self) -> bool {
        self.begun && self.current.is_none()
    }

    /// Materializes the current record, self-initializing if the caller
    /// skipped `begin_tuple`.
    pub fn next(&mut self) -> Result<Option<Record>, ExecutorError> {
        if !self.begun {
            self.begin_tuple()?;
        }
        Ok(self.current.as_ref().map(|(_, rec)| rec.clone()))
    }

    /// Returns the position of the current record.
    pub fn current_rid(&self) -> Option<RecordId> {
        self.current.as_ref().map(|(rid, _)| *rid)
    }

    /// Returns the output schema.
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn key_bounds(&self) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        if let [col] = self.index.columns.as_slice() {
            let range = ColumnRange::fold(&self.conditions, &self.table, &col.name);
            return (
                range.lower.as_storage_bound(col),
                range.upper.as_storage_bound(col),
            );
        }
        // Composite key: equality on every key column, or a full walk.
        let mut key = Vec::new();
        for col in &self.index.columns {
            let Some(value) = self.equality_value(&col.name) else {
                return (Bound::Unbounded, Bound::Unbounded);
            };
            let Ok(coerced) = value.clone().coerce_to(col.ty) else {
                return (Bound::Unbounded, Bound::Unbounded);
            };
            coerced.encode_key(col.len, &mut key);
        }
        (Bound::Included(key.clone()), Bound::Included(key))
    }

    fn equality_value(&self, column: &str) -> Option<&Value> {
        self.conditions.iter().find_map(|cond| {
            if cond.op == CompOp::Eq && cond.lhs.column == column && cond.lhs.table == self.table
            {
                match &cond.rhs {
                    Operand::Value(v) => Some(v),
                    Operand::Column(_) => None,
                }
            } else {
                None
            }
        })
    }

    fn seek_qualifying(&mut self) -> Result<(), ExecutorError> {
        while self.pos < self.rids.len() {
            let rid = self.rids[self.pos];
            let rec = self.ctx.get_record(&self.table, rid)?;
            if eval_conditions(&self.columns, &self.conditions, rec.data())? {
                self.current = Some((rid, rec));
                return Ok(());
            }
            self.pos += 1;
        }
        self.current = None;
        Ok(())
    }
}
