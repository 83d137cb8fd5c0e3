//! Nested-loop join operator.
//!
//! The left child is the inner loop: it rewinds (via `begin_tuple`) each
//! time it exhausts, and the right child advances one row. Join output is
//! the raw concatenation of the two child records, with the right child's
//! column offsets shifted past the left child's record length.

use crate::catalog::ColumnMeta;
use crate::executor::context::ExecContext;
use crate::executor::error::ExecutorError;
use crate::executor::eval::eval_conditions;
use crate::executor::node::Operator;
use crate::query::Condition;
use crate::storage::Record;

/// Nested-loop inner join.
pub struct NestedLoopJoin<C: ExecContext> {
    left: Box<Operator<C>>,
    right: Box<Operator<C>>,
    columns: Vec<ColumnMeta>,
    left_len: usize,
    conditions: Vec<Condition>,
    ended: bool,
    begun: bool,
}

impl<C: ExecContext> NestedLoopJoin<C> {
    /// Builds a join over two child operators.
    pub fn new(left: Operator<C>, right: Operator<C>, conditions: Vec<Condition>) -> Self {
        let left_len = left.tuple_len();
        let mut columns = left.columns().to_vec();
        for col in right.columns() {
            let mut col = col.clone();
            col.offset += left_len;
            columns.push(col);
        }
        NestedLoopJoin {
            left: Box::new(left),
            right: Box::new(right),
            columns,
            left_len,
            conditions,
            ended: false,
            begun: false,
        }
    }

    /// Positions on the first qualifying pair. Either child being empty
    /// ends the join immediately.
    pub fn begin_tuple(&mut self) -> Result<(), ExecutorError> {
        self.begun = true;
        self.ended = false;
        self.left.begin_tuple()?;
        self.right.begin_tuple()?;
        if self.left.is_end() || self.right.is_end() {
            self.ended = true;
            return Ok(());
        }
        self.seek_match()
    }

    /// Advances past the current pair. A no-op at end of stream.
    pub fn next_tuple(&mut self) -> Result<(), ExecutorError> {
        if self.ended {
            return Ok(());
        }
        self.advance()?;
        self.seek_match()
    }

    /// Returns true once every pair has been produced.
    pub fn is_end(&self) -> bool {
        self.ended
    }

    /// Materializes the current concatenated record.
    pub fn next(&mut self) -> Result<Option<Record>, ExecutorError> {
        if !self.begun {
            self.begin_tuple()?;
        }
        if self.ended {
            return Ok(None);
        }
        self.combined()
    }

    /// Returns the concatenated output schema.
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn combined(&mut self) -> Result<Option<Record>, ExecutorError> {
        let Some(left) = self.left.next()? else {
            return Ok(None);
        };
        let Some(right) = self.right.next()? else {
            return Ok(None);
        };
        let mut data = Vec::with_capacity(left.len() + right.len());
        data.extend_from_slice(left.data());
        data.extend_from_slice(right.data());
        Ok(Some(Record::from_vec(data)))
    }

    /// Steps the cursor pair one position: inner (left) first, rewinding
    /// it and advancing the outer (right) when it runs out.
    fn advance(&mut self) -> Result<(), ExecutorError> {
        self.left.next_tuple()?;
        if self.left.is_end() {
            self.right.next_tuple()?;
            if self.right.is_end() {
                self.ended = true;
                return Ok(());
            }
            self.left.begin_tuple()?;
            if self.left.is_end() {
                self.ended = true;
            }
        }
        Ok(())
    }

    fn seek_match(&mut self) -> Result<(), ExecutorError> {
        while !self.ended {
            let Some(rec) = self.combined()? else {
                self.ended = true;
                return Ok(());
            };
            if eval_conditions(&self.columns, &self.conditions, rec.data())? {
                return Ok(());
            }
            self.advance()?;
        }
        Ok(())
    }
}
