//! Query planner.
//!
//! The planner turns a resolved [`Statement`](crate::query::Statement)
//! into a [`Plan`] tree for the executor.
//!
//! # Architecture
//!
//! ```text
//! Statement (resolved)
//!       |
//! [Planner] -- resolves metadata via Catalog
//!       |
//! Plan tree (SELECT case):
//!   Dml(Select)
//!     └── Projection
//!           └── Sort (only with ORDER BY)
//!                 └── Join
//!                       ├── Scan (index or sequential)
//!                       └── Scan
//! ```
//!
//! Join trees are left-deep and condition-driven: the order of WHERE
//! conditions decides which tables join first. Access-path selection
//! picks an index scan per table when one matches the constant
//! predicates on that table.
//!
//! # Components
//!
//! - [`Planner`]: statement dispatch and join-tree construction
//! - [`Plan`]: closed plan-node sum type
//! - [`extract_for_table`] / [`route`]: condition movement over plan trees
//! - [`select_access_path`] / [`ColumnRange`]: index selection and
//!   key-range folding

mod access;
mod build;
mod cond;
mod error;
mod plan;

pub use access::{select_access_path, ColumnRange, RangeBound};
pub use build::{Planner, PlannerConfig};
pub use cond::{extract_for_table, route};
pub use error::PlannerError;
pub use plan::{DdlKind, DmlKind, JoinAlgo, Plan, UtilityKind};
