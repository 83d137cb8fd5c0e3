//! Executor error type.

use std::fmt;

use crate::catalog::CatalogError;
use crate::datum::DatumError;
use crate::storage::StorageError;

/// Errors from operator construction and execution.
#[derive(Debug)]
pub enum ExecutorError {
    /// A plan referenced a table missing from the catalog.
    TableNotFound(String),
    /// A condition or projection referenced a column absent from the
    /// operator's schema.
    ColumnNotFound {
        /// Table part of the reference.
        table: String,
        /// Column part of the reference.
        column: String,
    },
    /// INSERT supplied the wrong number of values.
    ValueCountMismatch {
        /// Target table.
        table: String,
        /// Columns in the table.
        expected: usize,
        /// Values supplied.
        found: usize,
    },
    /// A secondary-index insert failed; the base record and any index
    /// entries written for it were rolled back.
    IndexInsert {
        /// Table of the failing index.
        table: String,
        /// Key columns of the failing index.
        columns: Vec<String>,
    },
    /// The plan shape is not executable.
    Unsupported(String),
    /// Catalog lookup failure.
    Catalog(CatalogError),
    /// Storage failure.
    Storage(StorageError),
    /// Value coercion or serialization failure.
    Datum(DatumError),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::TableNotFound(name) => write!(f, "table not found: {}", name),
            ExecutorError::ColumnNotFound { table, column } => {
                write!(f, "column not found: {}.{}", table, column)
            }
            ExecutorError::ValueCountMismatch {
                table,
                expected,
                found,
            } => {
                write!(
                    f,
                    "insert into {}: expected {} values, got {}",
                    table, expected, found
                )
            }
            ExecutorError::IndexInsert { table, columns } => {
                write!(
                    f,
                    "index insert failed on {}({}); statement rolled back",
                    table,
                    columns.join(", ")
                )
            }
            ExecutorError::Unsupported(what) => write!(f, "unsupported: {}", what),
            ExecutorError::Catalog(e) => write!(f, "catalog error: {}", e),
            ExecutorError::Storage(e) => write!(f, "storage error: {}", e),
            ExecutorError::Datum(e) => write!(f, "value error: {}", e),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Catalog(e) => Some(e),
            ExecutorError::Storage(e) => Some(e),
            ExecutorError::Datum(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CatalogError> for ExecutorError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::TableNotFound(name) => ExecutorError::TableNotFound(name),
            CatalogError::ColumnNotFound { table, column } => {
                ExecutorError::ColumnNotFound { table, column }
            }
            other => ExecutorError::Catalog(other),
        }
    }
}

impl From<StorageError> for ExecutorError {
    fn from(e: StorageError) -> Self {
        ExecutorError::Storage(e)
    }
}

impl From<DatumError> for ExecutorError {
    fn from(e: DatumError) -> Self {
        ExecutorError::Datum(e)
    }
}
