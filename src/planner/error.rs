//! Planner error type.

use std::fmt;

use crate::catalog::CatalogError;

/// Errors from statement planning.
#[derive(Debug)]
pub enum PlannerError {
    /// A referenced table does not exist.
    UnknownTable(String),
    /// A referenced column does not exist in any FROM table.
    UnknownColumn(String),
    /// Every join algorithm is disabled but the query needs a join.
    NoJoinAlgorithm,
    /// Catalog lookup failure.
    Catalog(CatalogError),
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::UnknownTable(name) => write!(f, "unknown table: {}", name),
            PlannerError::UnknownColumn(name) => write!(f, "unknown column: {}", name),
            PlannerError::NoJoinAlgorithm => {
                write!(f, "no join algorithm enabled for a multi-table query")
            }
            PlannerError::Catalog(e) => write!(f, "catalog error: {}", e),
        }
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlannerError::Catalog(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CatalogError> for PlannerError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::TableNotFound(name) => PlannerError::UnknownTable(name),
            CatalogError::ColumnNotFound { table, column } => {
                PlannerError::UnknownColumn(format!("{}.{}", table, column))
            }
            other => PlannerError::Catalog(other),
        }
    }
}
