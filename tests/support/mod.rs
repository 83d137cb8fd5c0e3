//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::error::Error;

use minirel::catalog::Catalog;
use minirel::datum::{Type, Value};
use minirel::executor::{execute_schema_change, Portal, PortalKind};
use minirel::planner::{Plan, Planner, PlannerConfig};
use minirel::query::Statement;
use minirel::storage::{MemoryEngine, Record};

/// A complete single-node engine: catalog, planner, and storage.
pub struct Db {
    pub catalog: Catalog,
    pub planner: Planner,
    pub engine: MemoryEngine,
}

impl Db {
    pub fn new() -> Self {
        Db {
            catalog: Catalog::new(),
            planner: Planner::new(PlannerConfig::default()),
            engine: MemoryEngine::new(),
        }
    }

    /// Plans a statement without executing it.
    pub fn plan(&self, stmt: Statement) -> Result<Plan, Box<dyn Error>> {
        Ok(self.planner.plan(&self.catalog, stmt)?)
    }

    /// Plans and executes a statement, returning result rows for SELECT
    /// and an empty list otherwise.
    pub fn run(&mut self, stmt: Statement) -> Result<Vec<Record>, Box<dyn Error>> {
        let plan = self.planner.plan(&self.catalog, stmt)?;
        if let Plan::Ddl { .. } = &plan {
            execute_schema_change(&mut self.catalog, &self.engine, &plan)?;
            return Ok(Vec::new());
        }
        let portal = Portal::new(&self.catalog, self.engine.clone());
        let mut prepared = portal.prepare(plan)?;
        match prepared.kind {
            PortalKind::Select => {
                let root = prepared.root.as_mut().expect("select has a tree");
                Ok(Portal::run_query(root)?)
            }
            PortalKind::DmlNoResult => {
                let root = prepared.root.as_mut().expect("dml has a tree");
                Portal::run_dml(root)?;
                Ok(Vec::new())
            }
            PortalKind::SchemaChange | PortalKind::Utility => Ok(Vec::new()),
        }
    }
}

/// Decodes a record of `n` leading INT columns.
pub fn ints(record: &Record, n: usize) -> Vec<i32> {
    (0..n)
        .map(|i| {
            match Value::deserialize(Type::Int, &record.data()[i * 4..i * 4 + 4]).unwrap() {
                Value::Int(v) => v,
                other => panic!("expected int, got {:?}", other),
            }
        })
        .collect()
}

/// Decodes every row with [`ints`].
pub fn int_rows(records: &[Record], n: usize) -> Vec<Vec<i32>> {
    records.iter().map(|r| ints(r, n)).collect()
}
