//! Portal: from plan tree to executed statement.
//!
//! [`Portal::prepare`] classifies a plan and, for reading and writing
//! statements, compiles it into an operator tree. SELECT results stream
//! through [`Portal::run_query`]; mutations run through
//! [`Portal::run_dml`]. Schema changes and utility statements carry
//! their plan back to the embedding layer, which applies them with
//! [`execute_schema_change`] and [`execute_utility`].
//!
//! UPDATE and DELETE pre-collect their target row positions by driving
//! the compiled scan to completion before the mutation operator is
//! built, so a mutation never chases its own writes.

use std::fmt::Write as _;

use tracing::debug;

use crate::catalog::Catalog;
use crate::executor::context::ExecContext;
use crate::executor::dml::{Delete, Insert, Update};
use crate::executor::error::ExecutorError;
use crate::executor::join::NestedLoopJoin;
use crate::executor::node::{Filter, Operator, Projection};
use crate::executor::scan::{IndexScan, SeqScan};
use crate::executor::sort::Sort;
use crate::planner::{DdlKind, DmlKind, JoinAlgo, Plan, UtilityKind};
use crate::query::{ColumnRef, Condition};
use crate::storage::{Record, RecordId};

/// How a prepared statement is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalKind {
    /// Produces rows; drive with [`Portal::run_query`].
    Select,
    /// Mutates data, no result rows; drive with [`Portal::run_dml`].
    DmlNoResult,
    /// Schema change; apply with [`execute_schema_change`].
    SchemaChange,
    /// Everything else; interpret the plan with [`execute_utility`] or
    /// in the embedding layer.
    Utility,
}

/// A prepared statement.
pub struct PortalStmt<C: ExecContext> {
    /// Drive mode.
    pub kind: PortalKind,
    /// Output columns for SELECT.
    pub columns: Vec<ColumnRef>,
    /// Compiled operator tree for SELECT and mutations.
    pub root: Option<Operator<C>>,
    /// The original plan for schema changes and utilities.
    pub plan: Option<Plan>,
}

/// Statement preparation against one catalog and storage context.
pub struct Portal<'a, C: ExecContext> {
    catalog: &'a Catalog,
    ctx: C,
}

impl<'a, C: ExecContext> Portal<'a, C> {
    /// Builds a portal.
    pub fn new(catalog: &'a Catalog, ctx: C) -> Self {
        Portal { catalog, ctx }
    }

    /// Classifies a plan and compiles it when it is executable here.
    pub fn prepare(&self, plan: Plan) -> Result<PortalStmt<C>, ExecutorError> {
        match plan {
            Plan::Ddl { .. } => Ok(PortalStmt {
                kind: PortalKind::SchemaChange,
                columns: Vec::new(),
                root: None,
                plan: Some(plan),
            }),
            Plan::Utility { .. } | Plan::SetKnob { .. } => Ok(PortalStmt {
                kind: PortalKind::Utility,
                columns: Vec::new(),
                root: None,
                plan: Some(plan),
            }),
            Plan::Dml {
                kind: DmlKind::Select,
                input: Some(input),
                ..
            } => {
                let columns = match input.as_ref() {
                    Plan::Projection { columns, .. } => columns.clone(),
                    _ => Vec::new(),
                };
                let root = self.build_operator(*input)?;
                debug!(columns = columns.len(), "select prepared");
                Ok(PortalStmt {
                    kind: PortalKind::Select,
                    columns,
                    root: Some(root),
                    plan: None,
                })
            }
            Plan::Dml {
                kind: DmlKind::Insert,
                table: Some(table),
                values,
                ..
            } => {
                let meta = self.catalog.table(&table)?;
                let op = Insert::new(meta, values, self.ctx.clone())?;
                Ok(PortalStmt {
                    kind: PortalKind::DmlNoResult,
                    columns: Vec::new(),
                    root: Some(Operator::Insert(op)),
                    plan: None,
                })
            }
            Plan::Dml {
                kind: DmlKind::Update,
                table: Some(table),
                input: Some(input),
                assignments,
                ..
            } => {
                let rids = self.collect_targets(*input)?;
                let meta = self.catalog.table(&table)?;
                let op = Update::new(meta, assignments, rids, self.ctx.clone())?;
                Ok(PortalStmt {
                    kind: PortalKind::DmlNoResult,
                    columns: Vec::new(),
                    root: Some(Operator::Update(op)),
                    plan: None,
                })
            }
            Plan::Dml {
                kind: DmlKind::Delete,
                table: Some(table),
                input: Some(input),
                ..
            } => {
                let rids = self.collect_targets(*input)?;
                let meta = self.catalog.table(&table)?;
                let op = Delete::new(meta, rids, self.ctx.clone());
                Ok(PortalStmt {
                    kind: PortalKind::DmlNoResult,
                    columns: Vec::new(),
                    root: Some(Operator::Delete(op)),
                    plan: None,
                })
            }
            other => Err(ExecutorError::Unsupported(format!(
                "plan shape: {}",
                plan_name(&other)
            ))),
        }
    }

    /// Drives a SELECT tree to completion, collecting its rows.
    pub fn run_query(root: &mut Operator<C>) -> Result<Vec<Record>, ExecutorError> {
        let mut rows = Vec::new();
        root.begin_tuple()?;
        while !root.is_end() {
            if let Some(rec) = root.next()? {
                rows.push(rec);
            }
            root.next_tuple()?;
        }
        Ok(rows)
    }

    /// Drives a mutation tree to completion.
    pub fn run_dml(root: &mut Operator<C>) -> Result<(), ExecutorError> {
        root.begin_tuple()?;
        while !root.is_end() {
            root.next()?;
            root.next_tuple()?;
        }
        Ok(())
    }

    /// Compiles a query subtree into operators.
    fn build_operator(&self, plan: Plan) -> Result<Operator<C>, ExecutorError> {
        match plan {
            Plan::Scan {
                table,
                conditions,
                index_columns,
            } => self.build_scan(&table, conditions, index_columns),
            Plan::Join {
                algo,
                left,
                right,
                conditions,
            } => {
                let left = self.build_operator(*left)?;
                let right = self.build_operator(*right)?;
                match algo {
                    JoinAlgo::NestedLoop => Ok(Operator::NestedLoopJoin(NestedLoopJoin::new(
                        left, right, conditions,
                    ))),
                    JoinAlgo::SortMerge => Err(ExecutorError::Unsupported(
                        "sort-merge join execution".to_string(),
                    )),
                }
            }
            Plan::Projection { input, columns } => {
                let child = self.build_operator(*input)?;
                Ok(Operator::Projection(Projection::new(child, &columns)?))
            }
            Plan::Sort {
                input,
                column,
                descending,
            } => {
                let child = self.build_operator(*input)?;
                Ok(Operator::Sort(Sort::new(child, &column, descending)?))
            }
            Plan::Dml { .. } | Plan::Ddl { .. } | Plan::Utility { .. } | Plan::SetKnob { .. } => {
                Err(ExecutorError::Unsupported(
                    "statement node inside a query subtree".to_string(),
                ))
            }
        }
    }

    /// Compiles one scan leaf. An index path splits the predicate list:
    /// conditions on the chosen key columns stay on the index scan (they
    /// define the range and are re-checked per row), the rest move to a
    /// filter above it.
    fn build_scan(
        &self,
        table: &str,
        conditions: Vec<Condition>,
        index_columns: Option<Vec<String>>,
    ) -> Result<Operator<C>, ExecutorError> {
        let meta = self.catalog.table(table)?;
        match index_columns {
            None => Ok(Operator::SeqScan(SeqScan::new(
                table,
                meta.columns.clone(),
                conditions,
                self.ctx.clone(),
            ))),
            Some(cols) => {
                let index = meta.index(&cols)?.clone();
                let (on_key, residual): (Vec<Condition>, Vec<Condition>) = conditions
                    .into_iter()
                    .partition(|c| c.is_rhs_value() && cols.contains(&c.lhs.column));
                let scan = Operator::IndexScan(IndexScan::new(
                    table,
                    meta.columns.clone(),
                    on_key,
                    index,
                    self.ctx.clone(),
                ));
                if residual.is_empty() {
                    Ok(scan)
                } else {
                    Ok(Operator::Filter(Filter::new(scan, residual)))
                }
            }
        }
    }

    /// Drives a target scan to completion, collecting row positions for
    /// a mutation.
    fn collect_targets(&self, scan: Plan) -> Result<Vec<RecordId>, ExecutorError> {
        let mut op = self.build_operator(scan)?;
        let mut rids = Vec::new();
        op.begin_tuple()?;
        while !op.is_end() {
            if let Some(rid) = op.current_rid() {
                rids.push(rid);
            }
            op.next_tuple()?;
        }
        Ok(rids)
    }
}

/// Applies a schema-change plan to the catalog and the storage context.
pub fn execute_schema_change<C: ExecContext>(
    catalog: &mut Catalog,
    ctx: &C,
    plan: &Plan,
) -> Result<(), ExecutorError> {
    let Plan::Ddl {
        kind,
        table,
        column_defs,
        columns,
    } = plan
    else {
        return Err(ExecutorError::Unsupported(
            "not a schema-change plan".to_string(),
        ));
    };
    match kind {
        DdlKind::CreateTable => {
            catalog.create_table(table, column_defs)?;
            ctx.create_table(table)?;
        }
        DdlKind::DropTable => {
            catalog.drop_table(table)?;
            ctx.drop_table(table)?;
        }
        DdlKind::CreateIndex => {
            let index = catalog.create_index(table, columns)?.clone();
            ctx.create_index(&index)?;
        }
        DdlKind::DropIndex => {
            let names = catalog.table(table)?.index(columns)?.column_names();
            catalog.drop_index(table, columns)?;
            ctx.drop_index(table, &names)?;
        }
    }
    debug!(?kind, table = %table, "schema change applied");
    Ok(())
}

/// Renders a utility plan's output. Transaction-control statements have
/// no output here; the embedding layer owns their semantics.
pub fn execute_utility(catalog: &Catalog, plan: &Plan) -> Result<String, ExecutorError> {
    let Plan::Utility { kind, table } = plan else {
        return match plan {
            Plan::SetKnob { .. } => Ok(String::new()),
            _ => Err(ExecutorError::Unsupported(
                "not a utility plan".to_string(),
            )),
        };
    };
    match kind {
        UtilityKind::ShowTables => Ok(catalog.table_names().join("\n")),
        UtilityKind::DescTable => {
            let name = table.as_deref().unwrap_or_default();
            let meta = catalog.table(name)?;
            let mut out = String::new();
            for col in &meta.columns {
                let _ = writeln!(out, "{} {} {}", col.name, col.ty, col.len);
            }
            Ok(out)
        }
        UtilityKind::ShowIndex => {
            let name = table.as_deref().unwrap_or_default();
            let meta = catalog.table(name)?;
            let mut out = String::new();
            for index in &meta.indexes {
                let _ = writeln!(out, "({})", index.column_names().join(", "));
            }
            Ok(out)
        }
        UtilityKind::Begin
        | UtilityKind::Commit
        | UtilityKind::Abort
        | UtilityKind::Rollback => Ok(String::new()),
    }
}

fn plan_name(plan: &Plan) -> &'static str {
    match plan {
        Plan::Scan { .. } => "Scan",
        Plan::Join { .. } => "Join",
        Plan::Projection { .. } => "Projection",
        Plan::Sort { .. } => "Sort",
        Plan::Dml { .. } => "Dml",
        Plan::Ddl { .. } => "Ddl",
        Plan::Utility { .. } => "Utility",
        Plan::SetKnob { .. } => "SetKnob",
    }
}
