//! Table, column, and index metadata.
//!
//! The [`Catalog`] maps table names to [`TableMeta`], which carries the
//! fixed record layout (column offsets and widths) and the set of indexes
//! defined on the table. The planner consults this metadata for name
//! resolution and access-path selection; the executor uses it to slice
//! column bytes out of records and to build index keys.

use std::collections::HashMap;
use std::fmt;

use crate::datum::{Type, Value};

/// Errors from catalog operations.
#[derive(Debug)]
pub enum CatalogError {
    /// Table does not exist.
    TableNotFound(String),
    /// Table already exists.
    TableExists(String),
    /// Column does not exist in the table.
    ColumnNotFound {
        /// Table searched.
        table: String,
        /// Missing column.
        column: String,
    },
    /// An index over the same column list already exists.
    IndexExists {
        /// Table the index targets.
        table: String,
        /// Column list of the duplicate index.
        columns: Vec<String>,
    },
    /// No index over the given column list exists.
    IndexNotFound {
        /// Table searched.
        table: String,
        /// Column list of the missing index.
        columns: Vec<String>,
    },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::TableNotFound(name) => write!(f, "table not found: {}", name),
            CatalogError::TableExists(name) => write!(f, "table already exists: {}", name),
            CatalogError::ColumnNotFound { table, column } => {
                write!(f, "column not found: {}.{}", table, column)
            }
            CatalogError::IndexExists { table, columns } => {
                write!(f, "index already exists: {}({})", table, columns.join(", "))
            }
            CatalogError::IndexNotFound { table, columns } => {
                write!(f, "index not found: {}({})", table, columns.join(", "))
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// A column definition supplied by `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type.
    pub ty: Type,
    /// Byte width. For numeric types this must match the type's fixed
    /// size; for `Char` it is the declared string capacity.
    pub len: usize,
}

impl ColumnDef {
    /// Shorthand for an INT column definition.
    pub fn int(name: &str) -> Self {
        ColumnDef {
            name: name.to_string(),
            ty: Type::Int,
            len: 4,
        }
    }

    /// Shorthand for a FLOAT column definition.
    pub fn float(name: &str) -> Self {
        ColumnDef {
            name: name.to_string(),
            ty: Type::Float,
            len: 8,
        }
    }

    /// Shorthand for a CHAR(n) column definition.
    pub fn char(name: &str, len: usize) -> Self {
        ColumnDef {
            name: name.to_string(),
            ty: Type::Char,
            len,
        }
    }
}

/// Metadata for one column: its place in the record layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Owning table name.
    pub table: String,
    /// Column name.
    pub name: String,
    /// Column type.
    pub ty: Type,
    /// Byte width of the column slot.
    pub len: usize,
    /// Byte offset of the column slot within the record.
    pub offset: usize,
}

impl ColumnMeta {
    /// Slices this column's bytes out of a record.
    pub fn slice<'a>(&self, record: &'a [u8]) -> &'a [u8] {
        &record[self.offset..self.offset + self.len]
    }
}

/// Metadata for one index: an ordered list of key columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    /// Key columns, in index order.
    pub columns: Vec<ColumnMeta>,
}

impl IndexMeta {
    /// Returns the key column names, in index order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Returns true if this index is keyed on exactly `names` (as a set).
    pub fn matches(&self, names: &[String]) -> bool {
        self.columns.len() == names.len()
            && self.columns.iter().all(|c| names.contains(&c.name))
    }

    /// Builds the order-preserving key for `record`, concatenating the
    /// key encodings of each index column in index order.
    pub fn key_of(&self, record: &[u8]) -> Vec<u8> {
        let mut key = Vec::new();
        for col in &self.columns {
            // Records are validated on write, so the slot always decodes.
            if let Ok(v) = Value::deserialize(col.ty, col.slice(record)) {
                v.encode_key(col.len, &mut key);
            }
        }
        key
    }
}

/// Metadata for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    /// Table name.
    pub name: String,
    /// Columns in declaration order, offsets pre-computed.
    pub columns: Vec<ColumnMeta>,
    /// Indexes in creation order.
    pub indexes: Vec<IndexMeta>,
}

impl TableMeta {
    /// Returns the fixed record length in bytes.
    pub fn record_len(&self) -> usize {
        self.columns.iter().map(|c| c.len).sum()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Result<&ColumnMeta, CatalogError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| CatalogError::ColumnNotFound {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    /// Returns true if an index keyed on exactly `names` exists.
    pub fn has_index(&self, names: &[String]) -> bool {
        self.indexes.iter().any(|ix| ix.matches(names))
    }

    /// Looks up the index keyed on exactly `names`.
    pub fn index(&self, names: &[String]) -> Result<&IndexMeta, CatalogError> {
        self.indexes
            .iter()
            .find(|ix| ix.matches(names))
            .ok_or_else(|| CatalogError::IndexNotFound {
                table: self.name.clone(),
                columns: names.to_vec(),
            })
    }
}

/// The schema catalog: all table metadata, by name.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: HashMap<String, TableMeta>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Returns true if the table exists.
    pub fn is_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Looks up a table by name.
    pub fn table(&self, name: &str) -> Result<&TableMeta, CatalogError> {
        self.tables
            .get(name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    /// Returns all table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registers a table, computing the record layout from the column
    /// definitions in declaration order.
    pub fn create_table(
        &mut self,
        name: &str,
        defs: &[ColumnDef],
    ) -> Result<&TableMeta, CatalogError> {
        if self.tables.contains_key(name) {
            return Err(CatalogError::TableExists(name.to_string()));
        }
        let mut columns = Vec::with_capacity(defs.len());
        let mut offset = 0;
        for def in defs {
            let len = def.ty.fixed_size().unwrap_or(def.len);
            columns.push(ColumnMeta {
                table: name.to_string(),
                name: def.name.clone(),
                ty: def.ty,
                len,
                offset,
            });
            offset += len;
        }
        let meta = TableMeta {
            name: name.to_string(),
            columns,
            indexes: Vec::new(),
        };
        Ok(self.tables.entry(name.to_string()).or_insert(meta))
    }

    /// Removes a table and all its indexes.
    pub fn drop_table(&mut self, name: &str) -> Result<TableMeta, CatalogError> {
        self.tables
            .remove(name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    /// Registers an index on `table` keyed on `columns`, in the given order.
    pub fn create_index(
        &mut self,
        table: &str,
        columns: &[String],
    ) -> Result<&IndexMeta, CatalogError> {
        let meta = self
            .tables
            .get(table)
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))?;
        if meta.has_index(columns) {
            return Err(CatalogError::IndexExists {
                table: table.to_string(),
                columns: columns.to_vec(),
            });
        }
        let mut key_columns = Vec::with_capacity(columns.len());
        for name in columns {
            key_columns.push(meta.column(name)?.clone());
        }
        let meta = self.tables.get_mut(table).expect("checked above");
        meta.indexes.push(IndexMeta {
            columns: key_columns,
        });
        Ok(meta.indexes.last().expect("just pushed"))
    }

    /// Removes the index on `table` keyed on exactly `columns`.
    pub fn drop_index(&mut self, table: &str, columns: &[String]) -> Result<(), CatalogError> {
        let meta = self
            .tables
            .get_mut(table)
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))?;
        let pos = meta.indexes.iter().position(|ix| ix.matches(columns));
        match pos {
            Some(i) => {
                meta.indexes.remove(i);
                Ok(())
            }
            None => Err(CatalogError::IndexNotFound {
                table: table.to_string(),
                columns: columns.to_vec(),
            }),
        }
    }
}
