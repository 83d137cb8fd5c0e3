//! Operator tree.
//!
//! [`Operator`] is a closed sum over every executor node. Dispatch is an
//! exhaustive match per cursor method, so the full operator set is
//! visible in one place and adding a node updates every consumer at
//! compile time.

use crate::catalog::ColumnMeta;
use crate::executor::context::ExecContext;
use crate::executor::dml::{Delete, Insert, Update};
use crate::executor::error::ExecutorError;
use crate::executor::eval::{eval_conditions, find_column};
use crate::executor::join::NestedLoopJoin;
use crate::executor::scan::{IndexScan, SeqScan};
use crate::executor::sort::Sort;
use crate::query::{ColumnRef, Condition};
use crate::storage::{Record, RecordId};

/// A node in an operator tree.
pub enum Operator<C: ExecContext> {
    /// Sequential table scan.
    SeqScan(SeqScan<C>),
    /// Index-assisted table scan.
    IndexScan(IndexScan<C>),
    /// Predicate filter over a child.
    Filter(Filter<C>),
    /// Column projection over a child.
    Projection(Projection<C>),
    /// Buffered single-column sort.
    Sort(Sort<C>),
    /// Nested-loop inner join.
    NestedLoopJoin(NestedLoopJoin<C>),
    /// Single-shot insert.
    Insert(Insert<C>),
    /// Single-shot batch update.
    Update(Update<C>),
    /// Single-shot batch delete.
    Delete(Delete<C>),
}

impl<C: ExecContext> Operator<C> {
    /// Positions the cursor on the first qualifying row.
    pub fn begin_tuple(&mut self) -> Result<(), ExecutorError> {
        match self {
            Operator::SeqScan(op) => op.begin_tuple(),
            Operator::IndexScan(op) => op.begin_tuple(),
            Operator::Filter(op) => op.begin_tuple(),
            Operator::Projection(op) => op.begin_tuple(),
            Operator::Sort(op) => op.begin_tuple(),
            Operator::NestedLoopJoin(op) => op.begin_tuple(),
            Operator::Insert(op) => op.begin_tuple(),
            Operator::Update(op) => op.begin_tuple(),
            Operator::Delete(op) => op.begin_tuple(),
        }
    }

    /// Advances the cursor. A no-op once the stream has ended.
    pub fn next_tuple(&mut self) -> Result<(), ExecutorError> {
        match self {
            Operator::SeqScan(op) => op.next_tuple(),
            Operator::IndexScan(op) => op.next_tuple(),
            Operator::Filter(op) => op.next_tuple(),
            Operator::Projection(op) => op.next_tuple(),
            Operator::Sort(op) => op.next_tuple(),
            Operator::NestedLoopJoin(op) => op.next_tuple(),
            Operator::Insert(op) => op.next_tuple(),
            Operator::Update(op) => op.next_tuple(),
            Operator::Delete(op) => op.next_tuple(),
        }
    }

    /// Returns true once the stream is exhausted, and stays true.
    pub fn is_end(&self) -> bool {
        match self {
            Operator::SeqScan(op) => op.is_end(),
            Operator::IndexScan(op) => op.is_end(),
            Operator::Filter(op) => op.is_end(),
            Operator::Projection(op) => op.is_end(),
            Operator::Sort(op) => op.is_end(),
            Operator::NestedLoopJoin(op) => op.is_end(),
            Operator::Insert(op) => op.is_end(),
            Operator::Update(op) => op.is_end(),
            Operator::Delete(op) => op.is_end(),
        }
    }

    /// Materializes the current row without advancing. Mutation
    /// operators run their batch of side effects on the first call and
    /// always return `None`.
    pub fn next(&mut self) -> Result<Option<Record>, ExecutorError> {
        match self {
            Operator::SeqScan(op) => op.next(),
            Operator::IndexScan(op) => op.next(),
            Operator::Filter(op) => op.next(),
            Operator::Projection(op) => op.next(),
            Operator::Sort(op) => op.next(),
            Operator::NestedLoopJoin(op) => op.next(),
            Operator::Insert(op) => op.next(),
            Operator::Update(op) => op.next(),
            Operator::Delete(op) => op.next(),
        }
    }

    /// Returns the output schema. Empty for mutation operators.
    pub fn columns(&self) -> &[ColumnMeta] {
        match self {
            Operator::SeqScan(op) => op.columns(),
            Operator::IndexScan(op) => op.columns(),
            Operator::Filter(op) => op.columns(),
            Operator::Projection(op) => op.columns(),
            Operator::Sort(op) => op.columns(),
            Operator::NestedLoopJoin(op) => op.columns(),
            Operator::Insert(_) | Operator::Update(_) | Operator::Delete(_) => &[],
        }
    }

    /// Returns the output record length in bytes.
    pub fn tuple_len(&self) -> usize {
        self.columns().iter().map(|c| c.len).sum()
    }

    /// Returns the storage position of the current row for operators
    /// that read base tables directly (scans, possibly behind a filter).
    pub fn current_rid(&self) -> Option<RecordId> {
        match self {
            Operator::SeqScan(op) => op.current_rid(),
            Operator::IndexScan(op) => op.current_rid(),
            Operator::Filter(op) => op.current_rid(),
            Operator::Projection(op) => op.current_rid(),
            Operator::Sort(_)
            | Operator::NestedLoopJoin(_)
            | Operator::Insert(_)
            | Operator::Update(_)
            | Operator::Delete(_) => None,
        }
    }
}

/// Predicate filter over a child operator.
pub struct Filter<C: ExecContext> {
    child: Box<Operator<C>>,
    conditions: Vec<Condition>,
    begun: bool,
}

impl<C: ExecContext> Filter<C> {
    /// Builds a filter over `child`.
    pub fn new(child: Operator<C>, conditions: Vec<Condition>) -> Self {
        Filter {
            child: Box::new(child),
            conditions,
            begun: false,
        }
    }

    /// Positions the child on its first row that passes the predicates.
    pub fn begin_tuple(&mut self) -> Result<(), ExecutorError> {
        self.begun = true;
        self.child.begin_tuple()?;
        self.seek_qualifying()
    }

    /// Advances to the next passing row.
    pub fn next_tuple(&mut self) -> Result<(), ExecutorError> {
        self.child.next_tuple()?;
        self.seek_qualifying()
    }

    /// Mirrors the child's exhaustion.
    pub fn is_end(&self) -> bool {
        self.child.is_end()
    }

    /// Materializes the current (passing) row.
    pub fn next(&mut self) -> Result<Option<Record>, ExecutorError> {
        if !self.begun {
            self.begin_tuple()?;
        }
        self.child.next()
    }

    /// Returns the child's schema.
    pub fn columns(&self) -> &[ColumnMeta] {
        self.child.columns()
    }

    /// Passes through the child's current row position.
    pub fn current_rid(&self) -> Option<RecordId> {
        self.child.current_rid()
    }

    fn seek_qualifying(&mut self) -> Result<(), ExecutorError> {
        while !self.child.is_end() {
            let Some(rec) = self.child.next()? else {
                return Ok(());
            };
            if eval_conditions(self.child.columns(), &self.conditions, rec.data())? {
                return Ok(());
            }
            self.child.next_tuple()?;
        }
        Ok(())
    }
}

/// Column projection over a child operator.
pub struct Projection<C: ExecContext> {
    child: Box<Operator<C>>,
    /// Output layout, offsets recomputed from zero.
    columns: Vec<ColumnMeta>,
    /// Source column metadata in the child's layout, aligned with
    /// `columns`.
    sources: Vec<ColumnMeta>,
    begun: bool,
}

impl<C: ExecContext> Projection<C> {
    /// Builds a projection of `output` columns out of `child`.
    pub fn new(child: Operator<C>, output: &[ColumnRef]) -> Result<Self, ExecutorError> {
        let mut columns = Vec::with_capacity(output.len());
        let mut sources = Vec::with_capacity(output.len());
        let mut offset = 0;
        for target in output {
            let src = find_column(child.columns(), target)?.clone();
            let mut out = src.clone();
            out.offset = offset;
            offset += out.len;
            columns.push(out);
            sources.push(src);
        }
        Ok(Projection {
            child: Box::new(child),
            columns,
            sources,
            begun: false,
        })
    }

    /// Begins the child.
    pub fn begin_tuple(&mut self) -> Result<(), ExecutorError> {
        self.begun = true;
        self.child.begin_tuple()
    }

    /// Advances the child.
    pub fn next_tuple(&mut self) -> Result<(), ExecutorError> {
        self.child.next_tuple()
    }

    /// Mirrors the child's exhaustion.
    pub fn is_end(&self) -> bool {
        self.child.is_end()
    }

    /// Materializes the current row, remapped to the output layout.
    pub fn next(&mut self) -> Result<Option<Record>, ExecutorError> {
        if !self.begun {
            self.begin_tuple()?;
        }
        let Some(rec) = self.child.next()? else {
            return Ok(None);
        };
        let len = self.columns.iter().map(|c| c.len).sum();
        let mut data = vec![0u8; len];
        for (out, src) in self.columns.iter().zip(&self.sources) {
            data[out.offset..out.offset + out.len].copy_from_slice(src.slice(rec.data()));
        }
        Ok(Some(Record::from_vec(data)))
    }

    /// Returns the output schema.
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Passes through the child's current row position.
    pub fn current_rid(&self) -> Option<RecordId> {
        self.child.current_rid()
    }
}
