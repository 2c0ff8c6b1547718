//! Core types and driver contracts for rowtx.
//!
//! This crate provides the foundational abstractions the commit engine is
//! built on:
//!
//! - `Value`: dynamically-typed SQL values
//! - `TypeCode`: sealed SQL type codes for accessor dispatch
//! - `ValueAccessor` / `AccessorRegistry`: type-code-indexed marshalling
//! - `Connection` / `Statement` / `Rows`: synchronous driver contracts
//! - `TableSchema`: per-table column/key descriptions
//! - `Error`: the full operation error taxonomy

pub mod accessor;
pub mod backend;
pub mod error;
pub mod row;
pub mod schema;
pub mod types;
pub mod value;

pub use accessor::{AccessorRegistry, ValueAccessor};
pub use backend::{Capabilities, Connection, ConnectionProvider, RowIdAlias, Rows, Statement};
pub use error::{BackendError, CyclicConstraintError, Error, Result, RowCountError, TypeError};
pub use row::{ColumnInfo, Row};
pub use schema::{ColumnDef, SchemaSource, TableSchema};
pub use types::TypeCode;
pub use value::Value;
