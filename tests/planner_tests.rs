//! Integration tests for statement planning.

mod support;

use minirel::catalog::ColumnDef;
use minirel::datum::Value;
use minirel::planner::{DmlKind, JoinAlgo, Plan, Planner, PlannerConfig, PlannerError};
use minirel::query::{
    ColumnRef, CompOp, Condition, JoinKnob, OrderBy, SelectQuery, Statement,
};
use support::Db;

fn three_tables() -> Db {
    let mut db = Db::new();
    for name in ["a", "b", "c"] {
        db.run(Statement::CreateTable {
            table: name.to_string(),
            columns: vec![ColumnDef::int("x"), ColumnDef::int("y")],
        })
        .unwrap();
    }
    db
}

fn eq_join(lt: &str, rt: &str) -> Condition {
    Condition::with_column(ColumnRef::new(lt, "x"), CompOp::Eq, ColumnRef::new(rt, "x"))
}

fn value_cond(table: &str, column: &str, op: CompOp, v: i32) -> Condition {
    Condition::with_value(ColumnRef::new(table, column), op, Value::Int(v))
}

fn select_subtree(plan: Plan) -> Plan {
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
fn condition_order_decides_join_shape() {
    let db = three_tables();
    let mut query = SelectQuery::new(&["a", "b", "c"], vec![ColumnRef::new("c", "y")]);
    query.conditions = vec![eq_join("a", "b"), eq_join("b", "c")];
    let tree = select_subtree(db.plan(Statement::Select(query)).unwrap());

    // First condition joins a and b; the second attaches c on the probe
    // side of a new root. Leaf order is c, then the (a, b) pair.
    let mut tables = Vec::new();
    tree.leaf_tables(&mut tables);
    assert_eq!(tables, vec!["c", "a", "b"]);

    let reversed = {
        let mut query = SelectQuery::new(&["a", "b", "c"], vec![ColumnRef::new("c", "y")]);
        query.conditions = vec![eq_join("b", "c"), eq_join("a", "b")];
        select_subtree(db.plan(Statement::Select(query)).unwrap())
    };
    let mut tables = Vec::new();
    reversed.leaf_tables(&mut tables);
    assert_eq!(tables, vec!["a", "b", "c"]);
}

#[test]
fn every_condition_lands_somewhere() {
    let db = three_tables();
    let mut query = SelectQuery::new(&["a", "b", "c"], vec![ColumnRef::new("a", "x")]);
    query.conditions = vec![
        value_cond("a", "y", CompOp::Lt, 100),
        eq_join("a", "b"),
        value_cond("b", "y", CompOp::Gt, 0),
        eq_join("b", "c"),
        eq_join("a", "c"),
        value_cond("c", "x", CompOp::Ne, 7),
    ];
    let tree = select_subtree(db.plan(Statement::Select(query)).unwrap());
    assert_eq!(tree.condition_count(), 6);
}

#[test]
fn single_table_conditions_sink_to_their_scan() {
    let db = three_tables();
    let mut query = SelectQuery::new(&["a", "b"], vec![ColumnRef::new("a", "x")]);
    query.conditions = vec![
        value_cond("a", "y", CompOp::Gt, 1),
        eq_join("a", "b"),
        value_cond("b", "y", CompOp::Lt, 5),
    ];
    let tree = select_subtree(db.plan(Statement::Select(query)).unwrap());
    let Some(Plan::Scan { conditions, .. }) = tree.find_scan("a") else {
        panic!("expected scan for a");
    };
    assert_eq!(conditions, &vec![value_cond("a", "y", CompOp::Gt, 1)]);
    let Some(Plan::Scan { conditions, .. }) = tree.find_scan("b") else {
        panic!("expected scan for b");
    };
    assert_eq!(conditions, &vec![value_cond("b", "y", CompOp::Lt, 5)]);
}

#[test]
fn single_column_index_beats_composite() {
    let mut db = three_tables();
    db.run(Statement::CreateIndex {
        table: "a".to_string(),
        columns: vec!["x".to_string(), "y".to_string()],
    })
    .unwrap();
    db.run(Statement::CreateIndex {
        table: "a".to_string(),
        columns: vec!["y".to_string()],
    })
    .unwrap();

    let mut query = SelectQuery::new(&["a"], vec![ColumnRef::new("a", "x")]);
    query.conditions = vec![
        value_cond("a", "x", CompOp::Eq, 1),
        value_cond("a", "y", CompOp::Eq, 2),
    ];
    let tree = select_subtree(db.plan(Statement::Select(query)).unwrap());
    let Some(Plan::Scan { index_columns, .. }) = tree.find_scan("a") else {
        panic!("expected scan");
    };
    assert_eq!(index_columns, &Some(vec!["y".to_string()]));
}

#[test]
fn composite_index_used_only_for_exact_candidate_set() {
    let mut db = three_tables();
    db.run(Statement::CreateIndex {
        table: "a".to_string(),
        columns: vec!["x".to_string(), "y".to_string()],
    })
    .unwrap();

    let mut query = SelectQuery::new(&["a"], vec![ColumnRef::new("a", "x")]);
    query.conditions = vec![
        value_cond("a", "x", CompOp::Eq, 1),
        value_cond("a", "y", CompOp::Gt, 2),
    ];
    let tree = select_subtree(db.plan(Statement::Select(query)).unwrap());
    let Some(Plan::Scan { index_columns, .. }) = tree.find_scan("a") else {
        panic!("expected scan");
    };
    assert_eq!(
        index_columns,
        &Some(vec!["x".to_string(), "y".to_string()])
    );

    // A lone candidate column with no matching index scans sequentially.
    let mut query = SelectQuery::new(&["a"], vec![ColumnRef::new("a", "x")]);
    query.conditions = vec![value_cond("a", "x", CompOp::Eq, 1)];
    let tree = select_subtree(db.plan(Statement::Select(query)).unwrap());
    let Some(Plan::Scan { index_columns, .. }) = tree.find_scan("a") else {
        panic!("expected scan");
    };
    assert!(index_columns.is_none());
}

#[test]
fn disabled_join_algorithms_fail_planning() {
    let db = three_tables();
    let config = PlannerConfig::default().with_knob(JoinKnob::NestedLoop, false);
    let planner = Planner::new(config);
    let query = SelectQuery::new(&["a", "b"], vec![ColumnRef::new("a", "x")]);
    assert!(matches!(
        planner.plan(&db.catalog, Statement::Select(query)),
        Err(PlannerError::NoJoinAlgorithm)
    ));

    // Re-enabling via a knob copy restores planning, with sort-merge
    // chosen once nested-loop stays off.
    let planner = Planner::new(config.with_knob(JoinKnob::SortMerge, true));
    let mut query = SelectQuery::new(&["a", "b"], vec![ColumnRef::new("a", "x")]);
    query.conditions = vec![eq_join("a", "b")];
    let plan = planner
        .plan(&db.catalog, Statement::Select(query))
        .unwrap();
    let tree = select_subtree(plan);
    let Plan::Projection { input, .. } = tree else {
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
fn order_by_resolves_first_matching_table() {
    let db = three_tables();
    let mut query = SelectQuery::new(&["b", "a"], vec![ColumnRef::new("a", "x")]);
    query.conditions = vec![eq_join("a", "b")];
    query.order_by = Some(OrderBy {
        column: "y".to_string(),
        descending: false,
    });
    let tree = select_subtree(db.plan(Statement::Select(query)).unwrap());
    let Plan::Projection { input, .. } = tree else {
        panic!("expected projection");
    };
    let Plan::Sort { column, .. } = *input else {
        panic!("expected sort");
    };
    assert_eq!(column, ColumnRef::new("b", "y"));
}

#[test]
fn explain_renders_the_chosen_access_paths() {
    let mut db = three_tables();
    db.run(Statement::CreateIndex {
        table: "a".to_string(),
        columns: vec!["x".to_string()],
    })
    .unwrap();
    let mut query = SelectQuery::new(&["a", "b"], vec![ColumnRef::new("a", "x")]);
    query.conditions = vec![value_cond("a", "x", CompOp::Gt, 1), eq_join("a", "b")];
    let tree = select_subtree(db.plan(Statement::Select(query)).unwrap());
    let text = tree.format_explain(0);
    assert!(text.contains("IndexScan a(x)"), "got:\n{}", text);
    assert!(text.contains("SeqScan b"), "got:\n{}", text);
    assert!(text.contains("NestedLoopJoin"), "got:\n{}", text);
}

#[test]
fn unknown_names_are_planning_errors() {
    let db = three_tables();
    assert!(db
        .plan(Statement::Select(SelectQuery::new(
            &["nope"],
            vec![ColumnRef::new("nope", "x")],
        )))
        .is_err());
    assert!(db
        .plan(Statement::DescTable {
            table: "nope".to_string(),
        })
        .is_err());
    assert!(db
        .plan(Statement::CreateIndex {
            table: "a".to_string(),
            columns: vec!["nope".to_string()],
        })
        .is_err());
}
