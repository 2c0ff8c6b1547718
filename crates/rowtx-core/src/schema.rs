//! Table schema descriptions.
//!
//! The engine never introspects the database itself; a schema source
//! (normally generated code) supplies a [`TableSchema`] per table, queried
//! once per operation.

use crate::error::{Error, Result};
use crate::types::TypeCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One column of a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name as it appears in DDL.
    pub name: String,
    /// SQL type code for accessor dispatch.
    pub type_code: TypeCode,
    /// Whether the column accepts NULL.
    pub nullable: bool,
}

/// Schema description of one table: ordered columns, primary-key column set,
/// and zero-or-more unique-key column sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: Vec<String>,
    unique_keys: Vec<Vec<String>>,
}

impl TableSchema {
    /// Start building a schema for the named table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            unique_keys: Vec::new(),
        }
    }

    /// Add a NOT NULL column.
    pub fn column(mut self, name: impl Into<String>, type_code: TypeCode) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            type_code,
            nullable: false,
        });
        self
    }

    /// Add a nullable column.
    pub fn nullable_column(mut self, name: impl Into<String>, type_code: TypeCode) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            type_code,
            nullable: true,
        });
        self
    }

    /// Set the primary-key column set.
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Add a unique-key column set (fallback identity when no primary key).
    pub fn unique_key(mut self, columns: &[&str]) -> Self {
        self.unique_keys
            .push(columns.iter().map(|c| (*c).to_string()).collect());
        self
    }

    /// Finish building, sharing the schema across rows.
    pub fn build(self) -> Arc<TableSchema> {
        Arc::new(self)
    }

    /// Table name as it appears in DDL.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All columns in DDL order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// All column names in DDL order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Look up a column definition by name.
    pub fn column_def(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Type code of a column, failing if the column is unknown.
    pub fn type_code_of(&self, name: &str) -> Result<TypeCode> {
        self.column_def(name)
            .map(|c| c.type_code)
            .ok_or_else(|| Error::InvalidState {
                message: format!("unknown column '{}' on table '{}'", name, self.name),
            })
    }

    /// Primary-key column names.
    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key
    }

    /// Unique-key column sets.
    pub fn unique_keys(&self) -> &[Vec<String>] {
        &self.unique_keys
    }

    /// Columns identifying one row for a WHERE clause: primary key, else the
    /// first unique key, else every column.
    ///
    /// Fails with `NoIdentity` only when the table has no columns at all.
    pub fn identity_columns(&self) -> Result<Vec<String>> {
        if !self.primary_key.is_empty() {
            return Ok(self.primary_key.clone());
        }
        if let Some(uk) = self.unique_keys.first() {
            return Ok(uk.clone());
        }
        if self.columns.is_empty() {
            return Err(Error::NoIdentity {
                table: self.name.clone(),
            });
        }
        Ok(self.column_names().map(str::to_string).collect())
    }
}

/// Read-only source of table schemas, queried once per operation.
pub trait SchemaSource: Send + Sync {
    /// Look up the schema for a table.
    fn table(&self, name: &str) -> Result<Arc<TableSchema>>;
}
