//! Resolved query representation.
//!
//! The planner does not parse SQL; its input is a [`Statement`] whose
//! names have already been resolved against the catalog by an embedding
//! layer. Conditions are simple comparisons between a column and either a
//! constant or another column, implicitly AND-ed together.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::catalog::ColumnDef;
use crate::datum::Value;

/// A fully qualified column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Table name (aliases already resolved).
    pub table: String,
    /// Column name.
    pub column: String,
}

impl ColumnRef {
    /// Builds a reference from table and column names.
    pub fn new(table: &str, column: &str) -> Self {
        ColumnRef {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Comparison operator in a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

impl CompOp {
    /// Returns the operator that preserves meaning when the two operands
    /// are swapped: `a < b` mirrors to `b > a`, equality is its own mirror.
    pub const fn swapped(self) -> CompOp {
        match self {
            CompOp::Eq => CompOp::Eq,
            CompOp::Ne => CompOp::Ne,
            CompOp::Lt => CompOp::Gt,
            CompOp::Gt => CompOp::Lt,
            CompOp::Le => CompOp::Ge,
            CompOp::Ge => CompOp::Le,
        }
    }

    /// Returns true if an operand ordering of `ord` satisfies the operator.
    pub fn matches(self, ord: Ordering) -> bool {
        match self {
            CompOp::Eq => ord == Ordering::Equal,
            CompOp::Ne => ord != Ordering::Equal,
            CompOp::Lt => ord == Ordering::Less,
            CompOp::Gt => ord == Ordering::Greater,
            CompOp::Le => ord != Ordering::Greater,
            CompOp::Ge => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompOp::Eq => "=",
            CompOp::Ne => "<>",
            CompOp::Lt => "<",
            CompOp::Gt => ">",
            CompOp::Le => "<=",
            CompOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// Right-hand side of a condition: a constant or another column.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Constant value.
    Value(Value),
    /// Column reference.
    Column(ColumnRef),
}

/// One comparison predicate. The left-hand side is always a column.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Left operand.
    pub lhs: ColumnRef,
    /// Comparison operator.
    pub op: CompOp,
    /// Right operand.
    pub rhs: Operand,
}

impl Condition {
    /// Builds a column-vs-constant condition.
    pub fn with_value(lhs: ColumnRef, op: CompOp, value: Value) -> Self {
        Condition {
            lhs,
            op,
            rhs: Operand::Value(value),
        }
    }

    /// Builds a column-vs-column condition.
    pub fn with_column(lhs: ColumnRef, op: CompOp, rhs: ColumnRef) -> Self {
        Condition {
            lhs,
            op,
            rhs: Operand::Column(rhs),
        }
    }

    /// Returns true if the right-hand side is a constant.
    pub fn is_rhs_value(&self) -> bool {
        matches!(self.rhs, Operand::Value(_))
    }

    /// Returns the right-hand column, if the condition joins two columns.
    pub fn rhs_column(&self) -> Option<&ColumnRef> {
        match &self.rhs {
            Operand::Column(col) => Some(col),
            Operand::Value(_) => None,
        }
    }

    /// Swaps the operands, mirroring the operator so the predicate keeps
    /// its meaning. Only meaningful for column-vs-column conditions.
    pub fn swap_sides(&mut self) {
        if let Operand::Column(rhs) = &mut self.rhs {
            std::mem::swap(&mut self.lhs, rhs);
            self.op = self.op.swapped();
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rhs {
            Operand::Value(v) => write!(f, "{} {} {}", self.lhs, self.op, v),
            Operand::Column(c) => write!(f, "{} {} {}", self.lhs, self.op, c),
        }
    }
}

/// `SET column = value` in an UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Target column name.
    pub column: String,
    /// New value, coerced to the column type at execution.
    pub value: Value,
}

/// Single-column ORDER BY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Sort column name; resolved against the FROM tables in order.
    pub column: String,
    /// Descending when true.
    pub descending: bool,
}

/// A resolved SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    /// FROM tables, in syntactic order.
    pub tables: Vec<String>,
    /// Output columns.
    pub columns: Vec<ColumnRef>,
    /// WHERE conditions, implicitly AND-ed, in syntactic order.
    pub conditions: Vec<Condition>,
    /// Optional single-column sort.
    pub order_by: Option<OrderBy>,
    /// Alias-to-table mapping, kept for display purposes.
    pub aliases: HashMap<String, String>,
}

impl SelectQuery {
    /// Builds a SELECT over the given tables with no predicates.
    pub fn new(tables: &[&str], columns: Vec<ColumnRef>) -> Self {
        SelectQuery {
            tables: tables.iter().map(|t| t.to_string()).collect(),
            columns,
            conditions: Vec::new(),
            order_by: None,
            aliases: HashMap::new(),
        }
    }
}

/// Join algorithm toggles exposed through `SET` statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKnob {
    /// Nested-loop join.
    NestedLoop,
    /// Sort-merge join.
    SortMerge,
}

/// A resolved statement, ready for planning.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `CREATE TABLE name (columns)`
    CreateTable {
        /// Table name.
        table: String,
        /// Column definitions in declaration order.
        columns: Vec<ColumnDef>,
    },
    /// `DROP TABLE name`
    DropTable {
        /// Table name.
        table: String,
    },
    /// `CREATE INDEX name (columns)`
    CreateIndex {
        /// Table name.
        table: String,
        /// Key columns in index order.
        columns: Vec<String>,
    },
    /// `DROP INDEX name (columns)`
    DropIndex {
        /// Table name.
        table: String,
        /// Key columns of the index to drop.
        columns: Vec<String>,
    },
    /// `INSERT INTO name VALUES (...)`
    Insert {
        /// Target table.
        table: String,
        /// One value per column, in declaration order.
        values: Vec<Value>,
    },
    /// `DELETE FROM name WHERE ...`
    Delete {
        /// Target table.
        table: String,
        /// Target-row predicates.
        conditions: Vec<Condition>,
    },
    /// `UPDATE name SET ... WHERE ...`
    Update {
        /// Target table.
        table: String,
        /// Target-row predicates.
        conditions: Vec<Condition>,
        /// Column assignments.
        assignments: Vec<Assignment>,
    },
    /// `SELECT ...`
    Select(SelectQuery),
    /// `SHOW TABLES`
    ShowTables,
    /// `DESC name`
    DescTable {
        /// Table name.
        table: String,
    },
    /// `SHOW INDEX FROM name`
    ShowIndex {
        /// Table name.
        table: String,
    },
    /// `BEGIN`
    Begin,
    /// `COMMIT`
    Commit,
    /// `ABORT`
    Abort,
    /// `ROLLBACK`
    Rollback,
    /// `SET knob = ON|OFF`
    SetKnob {
        /// Which join algorithm the knob controls.
        knob: JoinKnob,
        /// New state.
        enabled: bool,
    },
}
