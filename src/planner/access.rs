//! Access-path selection and index key ranges.
//!
//! [`select_access_path`] decides, per scan leaf, whether an index can
//! serve the scan. Candidate columns are those compared against a
//! constant; a single-column index on any candidate wins first (smallest
//! candidate by name, so the choice is deterministic), then a composite
//! index covering exactly the whole candidate set, otherwise the scan
//! stays sequential.
//!
//! [`ColumnRange`] folds the predicates on one column into a single
//! `[lower, upper]` interval for the index cursor. The range only
//! narrows the scan; every predicate is still re-evaluated per row, so a
//! bound that is loosened (for example by lossy float-to-int coercion)
//! never changes results.

use std::collections::BTreeSet;
use std::ops::Bound;

use crate::catalog::{ColumnMeta, TableMeta};
use crate::datum::{Type, Value};
use crate::query::{CompOp, Condition, Operand};

/// Picks the index key columns for a scan over `table` filtered by
/// `conditions`, or `None` for a sequential scan.
pub fn select_access_path(table: &TableMeta, conditions: &[Condition]) -> Option<Vec<String>> {
    let mut candidates = BTreeSet::new();
    for cond in conditions {
        if cond.lhs.table == table.name
            && cond.is_rhs_value()
            && table.column(&cond.lhs.column).is_ok()
        {
            candidates.insert(cond.lhs.column.clone());
        }
    }
    if candidates.is_empty() {
        return None;
    }
    for col in &candidates {
        if table.has_index(std::slice::from_ref(col)) {
            return Some(vec![col.clone()]);
        }
    }
    let all: Vec<String> = candidates.into_iter().collect();
    if table.has_index(&all) {
        return Some(all);
    }
    None
}

/// One end of a key range.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    /// No constraint on this end.
    Unbounded,
    /// Constraint including the value.
    Included(Value),
    /// Constraint excluding the value.
    Excluded(Value),
}

impl RangeBound {
    fn value(&self) -> Option<&Value> {
        match self {
            RangeBound::Unbounded => None,
            RangeBound::Included(v) | RangeBound::Excluded(v) => Some(v),
        }
    }

    /// Encodes this bound for the index cursor over `col`.
    ///
    /// The value is coerced to the column type first. A coercion that
    /// loses precision (float with a fraction against an int column)
    /// widens the bound to inclusive of the truncated value; a coercion
    /// that fails drops the bound entirely. Both keep the range a
    /// superset of the rows the predicate admits.
    pub fn as_storage_bound(&self, col: &ColumnMeta) -> Bound<Vec<u8>> {
        let (value, inclusive) = match self {
            RangeBound::Unbounded => return Bound::Unbounded,
            RangeBound::Included(v) => (v, true),
            RangeBound::Excluded(v) => (v, false),
        };
        let lossy = matches!((value, col.ty), (Value::Float(n), Type::Int) if n.fract() != 0.0);
        let coerced = match value.clone().coerce_to(col.ty) {
            Ok(v) => v,
            Err(_) => return Bound::Unbounded,
        };
        let mut key = Vec::new();
        coerced.encode_key(col.len, &mut key);
        if inclusive || lossy {
            Bound::Included(key)
        } else {
            Bound::Excluded(key)
        }
    }
}

/// The folded key range for one indexed column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRange {
    /// Lower end.
    pub lower: RangeBound,
    /// Upper end.
    pub upper: RangeBound,
}

impl ColumnRange {
    /// The unconstrained range.
    pub fn unbounded() -> Self {
        ColumnRange {
            lower: RangeBound::Unbounded,
            upper: RangeBound::Unbounded,
        }
    }

    /// Folds the constant predicates on `table.column` into one range.
    ///
    /// Equality short-circuits to a point range. `<>` never narrows the
    /// range; it stays a residual check. Conflicting predicates simply
    /// produce an empty range, which the cursor reports as no rows.
    pub fn fold(conditions: &[Condition], table: &str, column: &str) -> ColumnRange {
        let mut range = ColumnRange::unbounded();
        for cond in conditions {
            if cond.lhs.table != table || cond.lhs.column != column {
                continue;
            }
            let Operand::Value(value) = &cond.rhs else {
                continue;
            };
            match cond.op {
                CompOp::Eq => {
                    return ColumnRange {
                        lower: RangeBound::Included(value.clone()),
                        upper: RangeBound::Included(value.clone()),
                    };
                }
                CompOp::Gt => range.tighten_lower(value.clone(), false),
                CompOp::Ge => range.tighten_lower(value.clone(), true),
                CompOp::Lt => range.tighten_upper(value.clone(), false),
                CompOp::Le => range.tighten_upper(value.clone(), true),
                CompOp::Ne => {}
            }
        }
        range
    }

    fn tighten_lower(&mut self, value: Value, inclusive: bool) {
        let tighter = match self.lower.value() {
            None => true,
            Some(current) => match value.compare(current) {
                Ok(std::cmp::Ordering::Greater) => true,
                Ok(std::cmp::Ordering::Equal) => {
                    !inclusive && matches!(self.lower, RangeBound::Included(_))
                }
                _ => false,
            },
        };
        if tighter {
            self.lower = if inclusive {
                RangeBound::Included(value)
            } else {
                RangeBound::Excluded(value)
            };
        }
    }

    fn tighten_upper(&mut self, value: Value, inclusive: bool) {
        let tighter = match self.upper.value() {
            None => true,
            Some(current) => match value.compare(current) {
                Ok(std::cmp::Ordering::Less) => true,
                Ok(std::cmp::Ordering::Equal) => {
                    !inclusive && matches!(self.upper, RangeBound::Included(_))
                }
                _ => false,
            },
        };
        if tighter {
            self.upper = if inclusive {
                RangeBound::Included(value)
            } else {
                RangeBound::Excluded(value)
            };
        }
    }
}
