//! Statement planning.
//!
//! [`Planner::plan`] dispatches one resolved statement to a plan tree.
//! SELECT planning runs in three steps: per-table condition extraction
//! and access-path selection, condition-driven left-deep join assembly,
//! then sort and projection on top. The order of WHERE conditions is the
//! join order; the planner never reorders them, it only decides where
//! each one is evaluated.

use tracing::debug;

use crate::catalog::Catalog;
use crate::planner::access::select_access_path;
use crate::planner::cond::{extract_for_table, route};
use crate::planner::error::PlannerError;
use crate::planner::plan::{DdlKind, DmlKind, JoinAlgo, Plan, UtilityKind};
use crate::query::{Condition, JoinKnob, SelectQuery, Statement};

/// Placeholder per-table row estimate; real statistics are not kept, so
/// every table weighs the same and the size-based reordering below is a
/// stable no-op hook.
const DEFAULT_TABLE_CARDINALITY: u64 = 1000;

/// Join-algorithm switches. The set is immutable for the lifetime of a
/// planner; a `SET` statement produces a new config via
/// [`PlannerConfig::with_knob`] and the embedding builds a new planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Allow nested-loop joins. On by default.
    pub enable_nestedloop_join: bool,
    /// Allow sort-merge joins. Off by default.
    pub enable_sortmerge_join: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            enable_nestedloop_join: true,
            enable_sortmerge_join: false,
        }
    }
}

impl PlannerConfig {
    /// Returns a copy of this config with one knob changed.
    pub fn with_knob(self, knob: JoinKnob, enabled: bool) -> PlannerConfig {
        let mut config = self;
        match knob {
            JoinKnob::NestedLoop => config.enable_nestedloop_join = enabled,
            JoinKnob::SortMerge => config.enable_sortmerge_join = enabled,
        }
        config
    }

    /// Picks the join algorithm for this config. Nested-loop wins when
    /// both are enabled.
    fn join_algo(self) -> Result<JoinAlgo, PlannerError> {
        if self.enable_nestedloop_join {
            Ok(JoinAlgo::NestedLoop)
        } else if self.enable_sortmerge_join {
            Ok(JoinAlgo::SortMerge)
        } else {
            Err(PlannerError::NoJoinAlgorithm)
        }
    }
}

/// The statement planner.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    /// Builds a planner with the given config.
    pub fn new(config: PlannerConfig) -> Self {
        Planner { config }
    }

    /// Returns the active config.
    pub fn config(&self) -> PlannerConfig {
        self.config
    }

    /// Plans one resolved statement.
    pub fn plan(&self, catalog: &Catalog, stmt: Statement) -> Result<Plan, PlannerError> {
        match stmt {
            Statement::CreateTable { table, columns } => Ok(Plan::Ddl {
                kind: DdlKind::CreateTable,
                table,
                column_defs: columns,
                columns: Vec::new(),
            }),
            Statement::DropTable { table } => {
                catalog.table(&table)?;
                Ok(Plan::Ddl {
                    kind: DdlKind::DropTable,
                    table,
                    column_defs: Vec::new(),
                    columns: Vec::new(),
                })
            }
            Statement::CreateIndex { table, columns } => {
                let meta = catalog.table(&table)?;
                for name in &columns {
                    meta.column(name)?;
                }
                Ok(Plan::Ddl {
                    kind: DdlKind::CreateIndex,
                    table,
                    column_defs: Vec::new(),
                    columns,
                })
            }
            Statement::DropIndex { table, columns } => {
                catalog.table(&table)?;
                Ok(Plan::Ddl {
                    kind: DdlKind::DropIndex,
                    table,
                    column_defs: Vec::new(),
                    columns,
                })
            }
            Statement::Insert { table, values } => {
                catalog.table(&table)?;
                Ok(Plan::Dml {
                    kind: DmlKind::Insert,
                    table: Some(table),
                    input: None,
                    values,
                    conditions: Vec::new(),
                    assignments: Vec::new(),
                })
            }
            Statement::Delete { table, conditions } => {
                let scan = self.target_scan(catalog, &table, &conditions)?;
                Ok(Plan::Dml {
                    kind: DmlKind::Delete,
                    table: Some(table),
                    input: Some(Box::new(scan)),
                    values: Vec::new(),
                    conditions,
                    assignments: Vec::new(),
                })
            }
            Statement::Update {
                table,
                conditions,
                assignments,
            } => {
                let meta = catalog.table(&table)?;
                for set in &assignments {
                    meta.column(&set.column)?;
                }
                let scan = self.target_scan(catalog, &table, &conditions)?;
                Ok(Plan::Dml {
                    kind: DmlKind::Update,
                    table: Some(table),
                    input: Some(Box::new(scan)),
                    values: Vec::new(),
                    conditions,
                    assignments,
                })
            }
            Statement::Select(query) => self.plan_select(catalog, query),
            Statement::ShowTables => Ok(Plan::Utility {
                kind: UtilityKind::ShowTables,
                table: None,
            }),
            Statement::DescTable { table } => {
                catalog.table(&table)?;
                Ok(Plan::Utility {
                    kind: UtilityKind::DescTable,
                    table: Some(table),
                })
            }
            Statement::ShowIndex { table } => {
                catalog.table(&table)?;
                Ok(Plan::Utility {
                    kind: UtilityKind::ShowIndex,
                    table: Some(table),
                })
            }
            Statement::Begin => Ok(Plan::Utility {
                kind: UtilityKind::Begin,
                table: None,
            }),
            Statement::Commit => Ok(Plan::Utility {
                kind: UtilityKind::Commit,
                table: None,
            }),
            Statement::Abort => Ok(Plan::Utility {
                kind: UtilityKind::Abort,
                table: None,
            }),
            Statement::Rollback => Ok(Plan::Utility {
                kind: UtilityKind::Rollback,
                table: None,
            }),
            Statement::SetKnob { knob, enabled } => Ok(Plan::SetKnob { knob, enabled }),
        }
    }

    /// Builds the target-row scan for UPDATE and DELETE, running the same
    /// access-path selection as a single-table SELECT.
    fn target_scan(
        &self,
        catalog: &Catalog,
        table: &str,
        conditions: &[Condition],
    ) -> Result<Plan, PlannerError> {
        let meta = catalog.table(table)?;
        for cond in conditions {
            meta.column(&cond.lhs.column)?;
        }
        let index_columns = select_access_path(meta, conditions);
        Ok(Plan::Scan {
            table: table.to_string(),
            conditions: conditions.to_vec(),
            index_columns,
        })
    }

    fn plan_select(&self, catalog: &Catalog, mut query: SelectQuery) -> Result<Plan, PlannerError> {
        for table in &query.tables {
            catalog.table(table)?;
        }
        for col in &query.columns {
            catalog.table(&col.table)?.column(&col.column)?;
        }
        for cond in &query.conditions {
            catalog.table(&cond.lhs.table)?.column(&cond.lhs.column)?;
            if let Some(rhs) = cond.rhs_column() {
                catalog.table(&rhs.table)?.column(&rhs.column)?;
            }
        }

        let algo = if query.tables.len() > 1 {
            Some(self.config.join_algo()?)
        } else {
            None
        };

        let tables = join_order(&query.tables);

        // One scan leaf per table, with its single-table conditions and
        // access path decided up front.
        let mut scans: Vec<(String, Option<Plan>)> = Vec::with_capacity(tables.len());
        for table in &tables {
            let conditions = extract_for_table(&mut query.conditions, table);
            let meta = catalog.table(table)?;
            let index_columns = select_access_path(meta, &conditions);
            if let Some(cols) = &index_columns {
                debug!(table = %table, columns = ?cols, "index path chosen");
            }
            scans.push((
                table.clone(),
                Some(Plan::Scan {
                    table: table.clone(),
                    conditions,
                    index_columns,
                }),
            ));
        }

        // Remaining conditions compare columns of two different tables;
        // consume them in order, growing a left-deep tree.
        let mut tree: Option<Plan> = None;
        for cond in std::mem::take(&mut query.conditions) {
            let algo = algo.ok_or(PlannerError::NoJoinAlgorithm)?;
            let rhs = cond
                .rhs_column()
                .ok_or_else(|| PlannerError::UnknownTable(cond.lhs.table.clone()))?
                .clone();
            let left_scan = take_scan(&mut scans, &cond.lhs.table);
            let right_scan = take_scan(&mut scans, &rhs.table);
            match (left_scan, right_scan) {
                (Some(left), Some(right)) => {
                    // Neither table is placed yet: join the pair, and fold
                    // any earlier tree in with a cross join.
                    let pair = Plan::Join {
                        algo,
                        left: Box::new(left),
                        right: Box::new(right),
                        conditions: vec![cond],
                    };
                    tree = Some(match tree.take() {
                        None => pair,
                        Some(existing) => Plan::Join {
                            algo,
                            left: Box::new(pair),
                            right: Box::new(existing),
                            conditions: Vec::new(),
                        },
                    });
                }
                (new_scan @ Some(_), None) | (None, new_scan @ Some(_)) => {
                    // One table is new: it becomes the probe (left) side,
                    // with the condition normalized to lead with it.
                    let mut cond = cond;
                    let new_scan = new_scan.expect("matched Some");
                    let new_is_rhs = matches!(&new_scan, Plan::Scan { table, .. } if *table == rhs.table);
                    if new_is_rhs {
                        cond.swap_sides();
                    }
                    let existing = tree.take().ok_or_else(|| {
                        // A table can only be marked joined once a tree exists.
                        PlannerError::UnknownTable(cond.lhs.table.clone())
                    })?;
                    tree = Some(Plan::Join {
                        algo,
                        left: Box::new(new_scan),
                        right: Box::new(existing),
                        conditions: vec![cond],
                    });
                }
                (None, None) => {
                    // Both tables are already in the tree: sink the
                    // condition to the lowest join covering both sides.
                    let existing = tree
                        .as_mut()
                        .ok_or_else(|| PlannerError::UnknownTable(cond.lhs.table.clone()))?;
                    if let Err(cond) = route(cond, existing) {
                        // No interior join covers both operands (the pair
                        // was cross-joined); keep it at the root instead
                        // of dropping it. The tree is built from scans and
                        // joins only, and both carry a condition list.
                        match existing {
                            Plan::Join { conditions, .. }
                            | Plan::Scan { conditions, .. } => conditions.push(cond),
                            _ => {
                                return Err(PlannerError::UnknownTable(cond.lhs.table.clone()))
                            }
                        }
                    }
                }
            }
        }

        // Tables never mentioned by a join condition attach by cross join.
        for (_, scan) in scans {
            let Some(scan) = scan else { continue };
            tree = Some(match tree.take() {
                None => scan,
                Some(existing) => Plan::Join {
                    algo: algo.ok_or(PlannerError::NoJoinAlgorithm)?,
                    left: Box::new(scan),
                    right: Box::new(existing),
                    conditions: Vec::new(),
                },
            });
        }
        let mut tree = tree.ok_or_else(|| PlannerError::UnknownTable("<empty FROM>".into()))?;

        if let Some(order) = &query.order_by {
            let column = resolve_order_column(catalog, &query.tables, &order.column)?;
            tree = Plan::Sort {
                input: Box::new(tree),
                column,
                descending: order.descending,
            };
        }

        let root = Plan::Projection {
            input: Box::new(tree),
            columns: query.columns.clone(),
        };
        debug!(tables = ?query.tables, "select planned");
        Ok(Plan::Dml {
            kind: DmlKind::Select,
            table: None,
            input: Some(Box::new(root)),
            values: Vec::new(),
            conditions: Vec::new(),
            assignments: Vec::new(),
        })
    }
}

/// Removes and returns the pending scan for `table`. `None` either means
/// the table is already in the tree or was never in the FROM list.
fn take_scan(scans: &mut [(String, Option<Plan>)], table: &str) -> Option<Plan> {
    scans
        .iter_mut()
        .find(|(name, _)| name == table)
        .and_then(|(_, scan)| scan.take())
}

/// Orders the FROM tables for planning. With more than two tables, a
/// stable sort by estimated row count runs; estimates are currently a
/// constant, so the syntactic order survives.
fn join_order(tables: &[String]) -> Vec<String> {
    let mut tables = tables.to_vec();
    if tables.len() > 2 {
        tables.sort_by_key(|t| estimate_rows(t));
    }
    tables
}

fn estimate_rows(_table: &str) -> u64 {
    DEFAULT_TABLE_CARDINALITY
}

/// Resolves a bare ORDER BY column name against the FROM tables in
/// order, taking the first table that has a column of that name.
fn resolve_order_column(
    catalog: &Catalog,
    tables: &[String],
    column: &str,
) -> Result<crate::query::ColumnRef, PlannerError> {
    for table in tables {
        let meta = catalog.table(table)?;
        if meta.column(column).is_ok() {
            return Ok(crate::query::ColumnRef::new(table, column));
        }
    }
    Err(PlannerError::UnknownColumn(column.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDef;
    use crate::datum::Value;
    use crate::query::{ColumnRef, CompOp, OrderBy};

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        for name in ["a", "b", "c"] {
            catalog
                .create_table(name, &[ColumnDef::int("x"), ColumnDef::int("y")])
                .unwrap();
        }
        catalog
    }

    fn join_cond(lt: &str, rt: &str) -> Condition {
        Condition::with_column(ColumnRef::new(lt, "x"), CompOp::Eq, ColumnRef::new(rt, "x"))
    }

    fn select_tree(catalog: &Catalog, query: SelectQuery) -> Plan {
        let plan = Planner::default()
            .plan(catalog, Statement::Select(query))
            .unwrap();
        let Plan::Dml {
            kind: DmlKind::Select,
            input: Some(input),
            ..
        } = plan
        else {
            panic!("expected select plan");
        };
        *input
    }

    #[test]
    fn test_single_table_no_join() {
        let catalog = sample_catalog();
        let mut query = SelectQuery::new(&["a"], vec![ColumnRef::new("a", "x")]);
        query.conditions = vec![Condition::with_value(
            ColumnRef::new("a", "x"),
            CompOp::Gt,
            Value::Int(1),
        )];
        let tree = select_tree(&catalog, query);
        let Plan::Projection { input, .. } = tree else {
            panic!("expected projection root");
        };
        let Plan::Scan {
            table, conditions, ..
        } = *input
        else {
            panic!("expected scan");
        };
        assert_eq!(table, "a");
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_condition_order_drives_join_order() {
        let catalog = sample_catalog();
        let mut query = SelectQuery::new(
            &["a", "b", "c"],
            vec![ColumnRef::new("a", "x")],
        );
        query.conditions = vec![join_cond("b", "c"), join_cond("a", "b")];
        let tree = select_tree(&catalog, query);
        let Plan::Projection { input, .. } = tree else {
            panic!("expected projection root");
        };
        // First condition pairs b and c; second attaches a as the probe
        // side of a new root.
        let mut tables = Vec::new();
        input.leaf_tables(&mut tables);
        assert_eq!(tables, vec!["a", "b", "c"]);
        let Plan::Join {
            conditions, right, ..
        } = *input
        else {
            panic!("expected join root");
        };
        assert_eq!(conditions, vec![join_cond("a", "b")]);
        let Plan::Join { conditions, .. } = *right else {
            panic!("expected inner join");
        };
        assert_eq!(conditions, vec![join_cond("b", "c")]);
    }

    #[test]
    fn test_no_condition_is_dropped() {
        let catalog = sample_catalog();
        let mut query = SelectQuery::new(&["a", "b", "c"], vec![ColumnRef::new("a", "x")]);
        query.conditions = vec![
            Condition::with_value(ColumnRef::new("a", "y"), CompOp::Lt, Value::Int(9)),
            join_cond("a", "b"),
            join_cond("b", "c"),
            join_cond("a", "c"),
        ];
        let tree = select_tree(&catalog, query);
        assert_eq!(tree.condition_count(), 4);
        let mut tables = Vec::new();
        tree.leaf_tables(&mut tables);
        tables.sort();
        assert_eq!(tables, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unjoined_table_cross_joins() {
        let catalog = sample_catalog();
        let mut query = SelectQuery::new(&["a", "b", "c"], vec![ColumnRef::new("a", "x")]);
        query.conditions = vec![join_cond("a", "b")];
        let tree = select_tree(&catalog, query);
        let mut tables = Vec::new();
        tree.leaf_tables(&mut tables);
        tables.sort();
        assert_eq!(tables, vec!["a", "b", "c"]);
        assert_eq!(tree.condition_count(), 1);
    }

    #[test]
    fn test_unroutable_condition_kept_at_root() {
        let catalog = sample_catalog();
        let mut query = SelectQuery::new(&["a", "b"], vec![ColumnRef::new("a", "x")]);
        // c is never scanned, so the second condition cannot be routed
        // to a covering join; it must survive at the root regardless.
        query.conditions = vec![join_cond("a", "b"), join_cond("a", "c")];
        let tree = select_tree(&catalog, query);
        assert_eq!(tree.condition_count(), 2);
        let Plan::Projection { input, .. } = tree else {
            panic!("expected projection root");
        };
        let Plan::Join { conditions, .. } = *input else {
            panic!("expected join root");
        };
        assert_eq!(conditions, vec![join_cond("a", "b"), join_cond("a", "c")]);
    }

    #[test]
    fn test_no_join_algorithm_is_fatal() {
        let catalog = sample_catalog();
        let config = PlannerConfig::default()
            .with_knob(JoinKnob::NestedLoop, false)
            .with_knob(JoinKnob::SortMerge, false);
        let planner = Planner::new(config);
        let query = SelectQuery::new(&["a", "b"], vec![ColumnRef::new("a", "x")]);
        assert!(matches!(
            planner.plan(&catalog, Statement::Select(query)),
            Err(PlannerError::NoJoinAlgorithm)
        ));

        // Single-table queries plan fine without any join algorithm.
        let query = SelectQuery::new(&["a"], vec![ColumnRef::new("a", "x")]);
        assert!(planner.plan(&catalog, Statement::Select(query)).is_ok());
    }

    #[test]
    fn test_sortmerge_fallback_when_nestedloop_disabled() {
        let catalog = sample_catalog();
        let config = PlannerConfig::default()
            .with_knob(JoinKnob::NestedLoop, false)
            .with_knob(JoinKnob::SortMerge, true);
        let planner = Planner::new(config);
        let mut query = SelectQuery::new(&["a", "b"], vec![ColumnRef::new("a", "x")]);
        query.conditions = vec![join_cond("a", "b")];
        let plan = planner.plan(&catalog, Statement::Select(query)).unwrap();
        let Plan::Dml {
            input: Some(input), ..
        } = plan
        else {
            panic!("expected select plan");
        };
        let Plan::Projection { input, .. } = *input else {
            panic!("expected projection");
        };
        assert!(matches!(
            *input,
            Plan::Join {
                algo: JoinAlgo::SortMerge,
                ..
            }
        ));
    }

    #[test]
    fn test_order_by_adds_sort_above_join() {
        let catalog = sample_catalog();
        let mut query = SelectQuery::new(&["a", "b"], vec![ColumnRef::new("a", "x")]);
        query.conditions = vec![join_cond("a", "b")];
        query.order_by = Some(OrderBy {
            column: "y".to_string(),
            descending: true,
        });
        let tree = select_tree(&catalog, query);
        let Plan::Projection { input, .. } = tree else {
            panic!("expected projection root");
        };
        let Plan::Sort {
            column, descending, ..
        } = *input
        else {
            panic!("expected sort under projection");
        };
        // First FROM table with a matching column wins.
        assert_eq!(column, ColumnRef::new("a", "y"));
        assert!(descending);
    }

    #[test]
    fn test_update_delete_get_target_scan() {
        let mut catalog = sample_catalog();
        catalog.create_index("a", &["x".to_string()]).unwrap();
        let planner = Planner::default();
        let conds = vec![Condition::with_value(
            ColumnRef::new("a", "x"),
            CompOp::Eq,
            Value::Int(1),
        )];
        let plan = planner
            .plan(
                &catalog,
                Statement::Delete {
                    table: "a".to_string(),
                    conditions: conds.clone(),
                },
            )
            .unwrap();
        let Plan::Dml {
            kind: DmlKind::Delete,
            input: Some(input),
            ..
        } = plan
        else {
            panic!("expected delete plan");
        };
        let Plan::Scan { index_columns, .. } = *input else {
            panic!("expected scan child");
        };
        assert_eq!(index_columns, Some(vec!["x".to_string()]));
    }

    #[test]
    fn test_unknown_names_rejected() {
        let catalog = sample_catalog();
        let planner = Planner::default();
        let query = SelectQuery::new(&["missing"], vec![]);
        assert!(matches!(
            planner.plan(&catalog, Statement::Select(query)),
            Err(PlannerError::UnknownTable(_))
        ));

        let query = SelectQuery::new(&["a"], vec![ColumnRef::new("a", "nope")]);
        assert!(matches!(
            planner.plan(&catalog, Statement::Select(query)),
            Err(PlannerError::UnknownColumn(_))
        ));
    }
}
