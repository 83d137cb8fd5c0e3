//! Query executor implementing the Volcano iterator model.
//!
//! This module evaluates [`Plan`](crate::planner::Plan) trees against the
//! storage engine, one operator per plan node.
//!
//! # Architecture
//!
//! ```text
//! Plan tree
//!       |
//! [Portal] -- classifies the statement, builds the operator tree
//!       |
//! Operator tree (pull-based):
//!   Projection
//!     └── NestedLoopJoin
//!           ├── IndexScan (range from folded predicates)
//!           └── SeqScan
//! ```
//!
//! Every operator follows the same cursor contract: `begin_tuple`
//! positions on the first qualifying row, `next_tuple` advances,
//! `is_end` reports exhaustion, and `next` materializes the current row
//! without advancing. Past the end, `next_tuple` stays a no-op and
//! `next` returns `None`.
//!
//! # Components
//!
//! - [`Portal`]: plan classification, operator construction, drive loops
//! - [`Operator`]: enum-dispatched operator nodes
//! - [`ExecContext`]: the storage surface operators run against
//! - [`eval`]: per-row condition evaluation over record bytes

mod context;
mod dml;
mod error;
pub mod eval;
mod join;
mod node;
mod portal;
mod scan;
mod sort;

pub use context::ExecContext;
pub use dml::{Delete, Insert, Update};
pub use error::ExecutorError;
pub use join::NestedLoopJoin;
pub use node::{Filter, Operator, Projection};
pub use portal::{execute_schema_change, execute_utility, Portal, PortalKind, PortalStmt};
pub use scan::{IndexScan, SeqScan};
pub use sort::Sort;
