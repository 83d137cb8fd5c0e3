//! Condition extraction and routing.
//!
//! WHERE conditions drive join-tree construction. Two operations move
//! them around:
//!
//! - [`extract_for_table`] pulls the conditions a single scan leaf can
//!   evaluate on its own out of the pending list.
//! - [`route`] pushes a join condition into an already-built tree, down
//!   to the lowest join node whose two subtrees each cover one operand.
//!
//! Both keep the normalization invariant used everywhere downstream:
//! once a condition sits on a scan, its left-hand side names that scan's
//! table; once it sits on a join, its left-hand side names a table from
//! the left subtree.

use crate::planner::plan::Plan;
use crate::query::Condition;

/// Removes and returns the conditions that `table`'s scan can evaluate
/// alone: comparisons of one of its columns against a constant, and
/// comparisons between two of its own columns. Order is preserved.
pub fn extract_for_table(conditions: &mut Vec<Condition>, table: &str) -> Vec<Condition> {
    let mut taken = Vec::new();
    let mut rest = Vec::new();
    for cond in conditions.drain(..) {
        let local = cond.lhs.table == table
            && match cond.rhs_column() {
                None => true,
                Some(rhs) => rhs.table == table,
            };
        if local {
            taken.push(cond);
        } else {
            rest.push(cond);
        }
    }
    *conditions = rest;
    taken
}

/// Which operand of a condition a subtree covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coverage {
    /// Neither operand's table is in the subtree.
    Neither,
    /// The left operand's table is in the subtree.
    Lhs,
    /// The right operand's table is in the subtree.
    Rhs,
    /// The condition was attached inside the subtree.
    Placed,
}

/// Pushes a join condition into `plan`, attaching it to the lowest join
/// node whose subtrees cover its two operands. The condition is swapped
/// (with its operator mirrored) when needed so its left-hand side refers
/// to the join's left subtree.
///
/// Returns the condition back when no join node in the tree covers both
/// operands.
pub fn route(cond: Condition, plan: &mut Plan) -> Result<(), Condition> {
    let mut slot = Some(cond);
    match route_into(&mut slot, plan) {
        Coverage::Placed => Ok(()),
        _ => Err(slot.take().expect("unplaced condition is returned")),
    }
}

fn route_into(slot: &mut Option<Condition>, plan: &mut Plan) -> Coverage {
    match plan {
        Plan::Scan { table, .. } => {
            let cond = slot.as_ref().expect("condition pending");
            if cond.lhs.table == *table {
                Coverage::Lhs
            } else if cond.rhs_column().is_some_and(|rhs| rhs.table == *table) {
                Coverage::Rhs
            } else {
                Coverage::Neither
            }
        }
        Plan::Join {
            left,
            right,
            conditions,
            ..
        } => {
            let lcov = route_into(slot, left);
            if lcov == Coverage::Placed {
                return Coverage::Placed;
            }
            let rcov = route_into(slot, right);
            if rcov == Coverage::Placed {
                return Coverage::Placed;
            }
            match (lcov, rcov) {
                // Only one operand is covered here; report it upward so an
                // ancestor join can pair it with the other side.
                (cov, Coverage::Neither) | (Coverage::Neither, cov) => cov,
                (lcov, _) => {
                    let mut cond = slot.take().expect("condition pending");
                    if lcov == Coverage::Rhs {
                        cond.swap_sides();
                    }
                    conditions.push(cond);
                    Coverage::Placed
                }
            }
        }
        Plan::Projection { input, .. } | Plan::Sort { input, .. } => route_into(slot, input),
        Plan::Dml { input, .. } => match input {
            Some(input) => route_into(slot, input),
            None => Coverage::Neither,
        },
        Plan::Ddl { .. } | Plan::Utility { .. } | Plan::SetKnob { .. } => Coverage::Neither,
    }
}
