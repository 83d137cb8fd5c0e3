//! Sort operator.
//!
//! Fully materializes the child's output at `begin_tuple`, then serves
//! rows from the buffer. The sort is stable, so rows with equal keys
//! keep their child order.

use crate::catalog::ColumnMeta;
use crate::datum::Value;
use crate::executor::context::ExecContext;
use crate::executor::error::ExecutorError;
use crate::executor::eval::find_column;
use crate::executor::node::Operator;
use crate::query::ColumnRef;
use crate::storage::Record;

/// Single-column sort.
pub struct Sort<C: ExecContext> {
    child: Box<Operator<C>>,
    key: ColumnMeta,
    descending: bool,
    rows: Vec<Record>,
    pos: usize,
    begun: bool,
}

impl<C: ExecContext> Sort<C> {
    /// Builds a sort over `child`, keyed on `column`.
    pub fn new(
        child: Operator<C>,
        column: &ColumnRef,
        descending: bool,
    ) -> Result<Self, ExecutorError> {
        let key = find_column(child.columns(), column)?.clone();
        Ok(Sort {
            child: Box::new(child),
            key,
            descending,
            rows: Vec::new(),
            pos: 0,
            begun: false,
        })
    }

    /// Drains the child and sorts the buffer.
    pub fn begin_tuple(&mut self) -> Result<(), ExecutorError> {
        let mut keyed: Vec<(Value, Record)> = Vec::new();
        self.child.begin_tuple()?;
        while !self.child.is_end() {
            if let Some(rec) = self.child.next()? {
                let key = Value::deserialize(self.key.ty, self.key.slice(rec.data()))?;
                keyed.push((key, rec));
            }
            self.child.next_tuple()?;
        }
        let descending = self.descending;
        keyed.sort_by(|(a, _), (b, _)| {
            // Keys share the column type, so comparison cannot fail.
            let ord = a.compare(b).unwrap_or(std::cmp::Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
        self.rows = keyed.into_iter().map(|(_, rec)| rec).collect();
        self.pos = 0;
        self.begun = true;
        Ok(())
    }

    /// Advances past the current row. A no-op at end of stream.
    pub fn next_tuple(&mut self) -> Result<(), ExecutorError> {
        if self.pos < self.rows.len() {
            self.pos += 1;
        }
        Ok(())
    }

    /// Returns true once the buffer is exhausted.
    pub fn is_end(&self) -> bool {
        self.begun && self.pos >= self.rows.len()
    }

    /// Materializes the current row.
    pub fn next(&mut self) -> Result<Option<Record>, ExecutorError> {
        if !self.begun {
            self.begin_tuple()?;
        }
        Ok(self.rows.get(self.pos).cloned())
    }

    /// Returns the child's schema; sorting never reshapes rows.
    pub fn columns(&self) -> &[ColumnMeta] {
        self.child.columns()
    }
}
