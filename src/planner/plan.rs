//! Plan-node definitions.
//!
//! [`Plan`] is a closed sum type: every traversal over a plan tree is an
//! exhaustive match, so adding a node shape is a compile-time event for
//! every consumer. Children are held by `Box`, giving each subtree a
//! single owner; rearranging a tree moves nodes instead of sharing them.

use std::fmt::Write as _;

use crate::catalog::ColumnDef;
use crate::datum::Value;
use crate::query::{Assignment, ColumnRef, Condition, JoinKnob};

/// Join algorithm chosen for a join node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAlgo {
    /// Nested-loop join.
    NestedLoop,
    /// Sort-merge join.
    SortMerge,
}

/// Which DML statement a [`Plan::Dml`] node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmlKind {
    /// SELECT: the subtree produces the result rows.
    Select,
    /// INSERT: no subtree, values are stored on the node.
    Insert,
    /// UPDATE: the subtree scans the target rows.
    Update,
    /// DELETE: the subtree scans the target rows.
    Delete,
}

/// Which schema-change statement a [`Plan::Ddl`] node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    /// CREATE TABLE.
    CreateTable,
    /// DROP TABLE.
    DropTable,
    /// CREATE INDEX.
    CreateIndex,
    /// DROP INDEX.
    DropIndex,
}

/// Statements that neither read nor write table data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilityKind {
    /// SHOW TABLES.
    ShowTables,
    /// DESC table.
    DescTable,
    /// SHOW INDEX FROM table.
    ShowIndex,
    /// BEGIN.
    Begin,
    /// COMMIT.
    Commit,
    /// ABORT.
    Abort,
    /// ROLLBACK.
    Rollback,
}

/// A query plan node.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Leaf access to one table, sequential or by index.
    Scan {
        /// Table to scan.
        table: String,
        /// Predicates evaluated at this leaf. Their left-hand side always
        /// refers to this table.
        conditions: Vec<Condition>,
        /// Index key columns when an index path was chosen, `None` for a
        /// sequential scan.
        index_columns: Option<Vec<String>>,
    },
    /// Inner join of two subtrees.
    Join {
        /// Join algorithm.
        algo: JoinAlgo,
        /// Left subtree.
        left: Box<Plan>,
        /// Right subtree.
        right: Box<Plan>,
        /// Join predicates spanning both subtrees.
        conditions: Vec<Condition>,
    },
    /// Column projection over a subtree.
    Projection {
        /// Input subtree.
        input: Box<Plan>,
        /// Output columns, in order.
        columns: Vec<ColumnRef>,
    },
    /// Single-column sort over a subtree.
    Sort {
        /// Input subtree.
        input: Box<Plan>,
        /// Sort column.
        column: ColumnRef,
        /// Descending when true.
        descending: bool,
    },
    /// DML root. For SELECT the statement result is the subtree's output;
    /// for INSERT/UPDATE/DELETE the node carries the mutation payload.
    Dml {
        /// Statement kind.
        kind: DmlKind,
        /// Target table for mutations, `None` for SELECT.
        table: Option<String>,
        /// Subtree: the query tree for SELECT, the target-row scan for
        /// UPDATE/DELETE, absent for INSERT.
        input: Option<Box<Plan>>,
        /// INSERT values.
        values: Vec<Value>,
        /// UPDATE/DELETE predicates, as given in the statement.
        conditions: Vec<Condition>,
        /// UPDATE assignments.
        assignments: Vec<Assignment>,
    },
    /// Schema change.
    Ddl {
        /// Statement kind.
        kind: DdlKind,
        /// Target table.
        table: String,
        /// CREATE TABLE column definitions.
        column_defs: Vec<ColumnDef>,
        /// CREATE/DROP INDEX key columns.
        columns: Vec<String>,
    },
    /// Utility statement, passed through to the embedding layer.
    Utility {
        /// Statement kind.
        kind: UtilityKind,
        /// Target table for DESC and SHOW INDEX.
        table: Option<String>,
    },
    /// Join-algorithm knob change.
    SetKnob {
        /// Which knob.
        knob: JoinKnob,
        /// New state.
        enabled: bool,
    },
}

impl Plan {
    /// Builds a sequential scan leaf.
    pub fn seq_scan(table: &str, conditions: Vec<Condition>) -> Plan {
        Plan::Scan {
            table: table.to_string(),
            conditions,
            index_columns: None,
        }
    }

    /// Collects the scan-leaf table names, leftmost first.
    pub fn leaf_tables(&self, out: &mut Vec<String>) {
        match self {
            Plan::Scan { table, .. } => out.push(table.clone()),
            Plan::Join { left, right, .. } => {
                left.leaf_tables(out);
                right.leaf_tables(out);
            }
            Plan::Projection { input, .. } | Plan::Sort { input, .. } => input.leaf_tables(out),
            Plan::Dml { input, .. } => {
                if let Some(input) = input {
                    input.leaf_tables(out);
                }
            }
            Plan::Ddl { .. } | Plan::Utility { .. } | Plan::SetKnob { .. } => {}
        }
    }

    /// Counts the conditions attached to scan and join nodes in this tree.
    pub fn condition_count(&self) -> usize {
        match self {
            Plan::Scan { conditions, .. } => conditions.len(),
            Plan::Join {
                left,
                right,
                conditions,
                ..
            } => conditions.len() + left.condition_count() + right.condition_count(),
            Plan::Projection { input, .. } | Plan::Sort { input, .. } => input.condition_count(),
            Plan::Dml { input, .. } => {
                input.as_ref().map_or(0, |input| input.condition_count())
            }
            Plan::Ddl { .. } | Plan::Utility { .. } | Plan::SetKnob { .. } => 0,
        }
    }

    /// Finds the scan leaf for `table`, if present.
    pub fn find_scan(&self, table: &str) -> Option<&Plan> {
        match self {
            Plan::Scan { table: t, .. } => (t == table).then_some(self),
            Plan::Join { left, right, .. } => {
                left.find_scan(table).or_else(|| right.find_scan(table))
            }
            Plan::Projection { input, .. } | Plan::Sort { input, .. } => input.find_scan(table),
            Plan::Dml { input, .. } => input.as_ref().and_then(|input| input.find_scan(table)),
            Plan::Ddl { .. } | Plan::Utility { .. } | Plan::SetKnob { .. } => None,
        }
    }

    /// Renders the tree for EXPLAIN-style output, one node per line.
    pub fn format_explain(&self, indent: usize) -> String {
        let mut out = String::new();
        self.write_explain(indent, &mut out);
        out
    }

    fn write_explain(&self, indent: usize, out: &mut String) {
        let pad = "  ".repeat(indent);
        match self {
            Plan::Scan {
                table,
                conditions,
                index_columns,
            } => {
                match index_columns {
                    Some(cols) => {
                        let _ = write!(out, "{}IndexScan {}({})", pad, table, cols.join(", "));
                    }
                    None => {
                        let _ = write!(out, "{}SeqScan {}", pad, table);
                    }
                }
                write_conditions(conditions, out);
                out.push('\n');
            }
            Plan::Join {
                algo,
                left,
                right,
                conditions,
            } => {
                let name = match algo {
                    JoinAlgo::NestedLoop => "NestedLoopJoin",
                    JoinAlgo::SortMerge => "SortMergeJoin",
                };
                let _ = write!(out, "{}{}", pad, name);
                write_conditions(conditions, out);
                out.push('\n');
                left.write_explain(indent + 1, out);
                right.write_explain(indent + 1, out);
            }
            Plan::Projection { input, columns } => {
                let cols: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
                let _ = writeln!(out, "{}Projection [{}]", pad, cols.join(", "));
                input.write_explain(indent + 1, out);
            }
            Plan::Sort {
                input,
                column,
                descending,
            } => {
                let dir = if *descending { "DESC" } else { "ASC" };
                let _ = writeln!(out, "{}Sort {} {}", pad, column, dir);
                input.write_explain(indent + 1, out);
            }
            Plan::Dml { kind, input, .. } => {
                let name = match kind {
                    DmlKind::Select => "Select",
                    DmlKind::Insert => "Insert",
                    DmlKind::Update => "Update",
                    DmlKind::Delete => "Delete",
                };
                let _ = writeln!(out, "{}{}", pad, name);
                if let Some(input) = input {
                    input.write_explain(indent + 1, out);
                }
            }
            Plan::Ddl { kind, table, .. } => {
                let name = match kind {
                    DdlKind::CreateTable => "CreateTable",
                    DdlKind::DropTable => "DropTable",
                    DdlKind::CreateIndex => "CreateIndex",
                    DdlKind::DropIndex => "DropIndex",
                };
                let _ = writeln!(out, "{}{} {}", pad, name, table);
            }
            Plan::Utility { kind, .. } => {
                let _ = writeln!(out, "{}{:?}", pad, kind);
            }
            Plan::SetKnob { knob, enabled } => {
                let _ = writeln!(out, "{}Set {:?} = {}", pad, knob, enabled);
            }
        }
    }
}

fn write_conditions(conditions: &[Condition], out: &mut String) {
    if conditions.is_empty() {
        return;
    }
    let rendered: Vec<String> = conditions.iter().map(|c| c.to_string()).collect();
    let _ = write!(out, " [{}]", rendered.join(" AND "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CompOp;

    fn join(left: Plan, right: Plan, conditions: Vec<Condition>) -> Plan {
        Plan::Join {
            algo: JoinAlgo::NestedLoop,
            left: Box::new(left),
            right: Box::new(right),
            conditions,
        }
    }

    #[test]
    fn test_leaf_tables_in_order() {
        let tree = join(
            join(Plan::seq_scan("a", vec![]), Plan::seq_scan("b", vec![]), vec![]),
            Plan::seq_scan("c", vec![]),
            vec![],
        );
        let mut tables = Vec::new();
        tree.leaf_tables(&mut tables);
        assert_eq!(tables, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_condition_count() {
        let cond = Condition::with_value(ColumnRef::new("a", "x"), CompOp::Eq, Value::Int(1));
        let jcond = Condition::with_column(
            ColumnRef::new("a", "x"),
            CompOp::Eq,
            ColumnRef::new("b", "y"),
        );
        let tree = join(
            Plan::seq_scan("a", vec![cond.clone(), cond]),
            Plan::seq_scan("b", vec![]),
            vec![jcond],
        );
        assert_eq!(tree.condition_count(), 3);
    }

    #[test]
    fn test_format_explain_shape() {
        let tree = Plan::Projection {
            input: Box::new(join(
                Plan::seq_scan("a", vec![]),
                Plan::Scan {
                    table: "b".to_string(),
                    conditions: vec![],
                    index_columns: Some(vec!["y".to_string()]),
                },
                vec![],
            )),
            columns: vec![ColumnRef::new("a", "x")],
        };
        let text = tree.format_explain(0);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Projection [a.x]");
        assert_eq!(lines[1], "  NestedLoopJoin");
        assert_eq!(lines[2], "    SeqScan a");
        assert_eq!(lines[3], "    IndexScan b(y)");
    }
}
