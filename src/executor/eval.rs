//! Per-row condition evaluation over record bytes.
//!
//! An operator's schema is a `Vec<ColumnMeta>` describing where each
//! column lives in its output records; joins concatenate schemas with
//! shifted offsets. Evaluation slices the operand bytes out of the
//! record, decodes them, and compares with numeric coercion.

use crate::catalog::ColumnMeta;
use crate::datum::Value;
use crate::executor::error::ExecutorError;
use crate::query::{ColumnRef, Condition, Operand};

/// Finds a column in an operator schema by qualified name.
pub fn find_column<'a>(
    columns: &'a [ColumnMeta],
    target: &ColumnRef,
) -> Result<&'a ColumnMeta, ExecutorError> {
    columns
        .iter()
        .find(|c| c.table == target.table && c.name == target.column)
        .ok_or_else(|| ExecutorError::ColumnNotFound {
            table: target.table.clone(),
            column: target.column.clone(),
        })
}

/// Evaluates one condition against a record.
pub fn eval_condition(
    columns: &[ColumnMeta],
    cond: &Condition,
    record: &[u8],
) -> Result<bool, ExecutorError> {
    let lhs_col = find_column(columns, &cond.lhs)?;
    let lhs = Value::deserialize(lhs_col.ty, lhs_col.slice(record))?;
    let rhs = match &cond.rhs {
        Operand::Value(v) => v.clone(),
        Operand::Column(col) => {
            let rhs_col = find_column(columns, col)?;
            Value::deserialize(rhs_col.ty, rhs_col.slice(record))?
        }
    };
    let ord = lhs.compare(&rhs)?;
    Ok(cond.op.matches(ord))
}

/// Evaluates a conjunction of conditions against a record.
pub fn eval_conditions(
    columns: &[ColumnMeta],
    conditions: &[Condition],
    record: &[u8],
) -> Result<bool, ExecutorError> {
    for cond in conditions {
        if !eval_condition(columns, cond, record)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, ColumnDef};
    use crate::query::CompOp;

    fn schema() -> Vec<ColumnMeta> {
        let mut catalog = Catalog::new();
        catalog
            .create_table(
                "t",
                &[
                    ColumnDef::int("a"),
                    ColumnDef::float("f"),
                    ColumnDef::char("s", 4),
                ],
            )
            .unwrap();
        catalog.table("t").unwrap().columns.clone()
    }

    fn record() -> Vec<u8> {
        let mut data = vec![0u8; 16];
        Value::Int(5).serialize(&mut data[0..4]).unwrap();
        Value::Float(5.5).serialize(&mut data[4..12]).unwrap();
        Value::Str("hi".into()).serialize(&mut data[12..16]).unwrap();
        data
    }

    #[test]
    fn test_value_comparison_with_coercion() {
        let columns = schema();
        let data = record();
        // Int column against a float constant.
        let cond = Condition::with_value(ColumnRef::new("t", "a"), CompOp::Lt, Value::Float(5.5));
        assert!(eval_condition(&columns, &cond, &data).unwrap());
        // Float column against an int constant.
        let cond = Condition::with_value(ColumnRef::new("t", "f"), CompOp::Gt, Value::Int(5));
        assert!(eval_condition(&columns, &cond, &data).unwrap());
    }

    #[test]
    fn test_string_comparison_trims_padding() {
        let columns = schema();
        let data = record();
        let cond = Condition::with_value(
            ColumnRef::new("t", "s"),
            CompOp::Eq,
            Value::Str("hi".into()),
        );
        assert!(eval_condition(&columns, &cond, &data).unwrap());
    }

    #[test]
    fn test_column_vs_column() {
        let columns = schema();
        let data = record();
        let cond = Condition::with_column(
            ColumnRef::new("t", "a"),
            CompOp::Lt,
            ColumnRef::new("t", "f"),
        );
        assert!(eval_condition(&columns, &cond, &data).unwrap());
    }

    #[test]
    fn test_conjunction_short_circuits_false() {
        let columns = schema();
        let data = record();
        let pass = Condition::with_value(ColumnRef::new("t", "a"), CompOp::Eq, Value::Int(5));
        let fail = Condition::with_value(ColumnRef::new("t", "a"), CompOp::Ne, Value::Int(5));
        assert!(eval_conditions(&columns, &[pass.clone()], &data).unwrap());
        assert!(!eval_conditions(&columns, &[pass, fail], &data).unwrap());
        assert!(eval_conditions(&columns, &[], &data).unwrap());
    }

    #[test]
    fn test_incompatible_types_error() {
        let columns = schema();
        let data = record();
        let cond = Condition::with_value(
            ColumnRef::new("t", "a"),
            CompOp::Eq,
            Value::Str("5".into()),
        );
        assert!(matches!(
            eval_condition(&columns, &cond, &data),
            Err(ExecutorError::Datum(_))
        ));
    }

    #[test]
    fn test_unknown_column_error() {
        let columns = schema();
        let data = record();
        let cond = Condition::with_value(ColumnRef::new("t", "zz"), CompOp::Eq, Value::Int(1));
        assert!(matches!(
            eval_condition(&columns, &cond, &data),
            Err(ExecutorError::ColumnNotFound { .. })
        ));
    }
}
