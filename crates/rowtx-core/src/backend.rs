//! Database driver contracts.
//!
//! These traits are the boundary between the engine and a concrete driver:
//!
//! - [`Connection`]: statement preparation and transaction control
//! - [`Statement`]: typed positional parameter binding and execution
//! - [`Rows`]: forward-only cursor over a result set
//! - [`Capabilities`]: driver quirks the commit engine must know about
//! - [`ConnectionProvider`]: named-configuration connection acquisition
//!
//! Everything here is synchronous: a commit pass runs single-threaded and
//! blocks only inside driver calls. A cancelled or timed-out driver call must
//! surface as an `Err`, which the engine treats as a hard failure of that
//! operation.

use crate::error::Result;
use crate::types::TypeCode;

/// Driver capabilities the commit engine consults.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    /// Whether the backend defers constraint checking to transaction end.
    /// Required to commit foreign-key cycles safely.
    pub deferred_constraints: bool,
    /// Set when the driver ignores requested generated columns and reports a
    /// row identifier under its own name instead (sqlite).
    pub rowid_alias: Option<RowIdAlias>,
}

/// A driver-specific row-identifier alias.
///
/// Some drivers ignore the generated columns requested at prepare time and
/// report a single row-identifier column under a fixed name. The engine
/// translates that column into a WHERE clause on `query_column` when it
/// fetches the inserted row back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowIdAlias {
    /// Column name the driver reports in the generated-keys result set,
    /// e.g. `last_insert_rowid()`.
    pub reported: &'static str,
    /// Table column to query by instead, e.g. `_rowid_`.
    pub query_column: &'static str,
}

/// A live database connection.
///
/// The engine acquires one connection per read operation and one shared
/// connection per commit pass, and releases it (drops it) on every exit path.
pub trait Connection {
    /// Driver capabilities. Must be constant for the connection's lifetime.
    fn capabilities(&self) -> Capabilities;

    /// Begin a transaction.
    fn begin(&mut self) -> Result<()>;

    /// Commit the current transaction.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction.
    fn rollback(&mut self) -> Result<()>;

    /// Prepare a statement.
    ///
    /// `generated_columns` names the columns whose post-execution values the
    /// caller wants reported through [`Statement::generated_keys`]; drivers
    /// may ignore it (see [`Capabilities::rowid_alias`]).
    fn prepare<'conn>(
        &'conn mut self,
        sql: &str,
        generated_columns: &[String],
    ) -> Result<Box<dyn Statement + 'conn>>;
}

/// A prepared statement with typed positional parameter slots.
///
/// Positions are zero-based and correspond to `?` placeholders in order.
/// The typed binders exist so a NULL can be sent with its SQL type attached;
/// some backends reject untyped nulls.
pub trait Statement {
    /// Bind a type-correct SQL NULL.
    fn bind_null(&mut self, pos: usize, code: TypeCode) -> Result<()>;
    fn bind_bool(&mut self, pos: usize, value: bool) -> Result<()>;
    fn bind_i64(&mut self, pos: usize, value: i64) -> Result<()>;
    fn bind_f64(&mut self, pos: usize, value: f64) -> Result<()>;
    fn bind_text(&mut self, pos: usize, value: &str) -> Result<()>;
    fn bind_bytes(&mut self, pos: usize, value: &[u8]) -> Result<()>;

    /// Execute a write statement and return the affected-row count.
    fn execute_update(&mut self) -> Result<u64>;

    /// Execute a query and return its cursor.
    fn execute_query<'stmt>(&'stmt mut self) -> Result<Box<dyn Rows + 'stmt>>;

    /// The generated-keys result set of the last `execute_update`.
    ///
    /// `Ok(None)` means the driver does not support generated-key reporting
    /// at all; the engine falls back to a secondary SELECT.
    fn generated_keys<'stmt>(&'stmt mut self) -> Result<Option<Box<dyn Rows + 'stmt>>>;
}

/// A forward-only cursor over a result set.
///
/// `advance` moves to the next row and returns whether one exists; the typed
/// getters read from the current row by zero-based column position, with
/// `None` standing for SQL NULL.
pub trait Rows {
    /// Column names of the result set, in order.
    fn columns(&self) -> &[String];

    /// Move to the next row. Returns false when the cursor is exhausted.
    fn advance(&mut self) -> Result<bool>;

    fn get_bool(&self, pos: usize) -> Result<Option<bool>>;
    fn get_i64(&self, pos: usize) -> Result<Option<i64>>;
    fn get_f64(&self, pos: usize) -> Result<Option<f64>>;
    fn get_text(&self, pos: usize) -> Result<Option<String>>;
    fn get_bytes(&self, pos: usize) -> Result<Option<Vec<u8>>>;
}

/// Supplies live connections scoped to a named configuration.
pub trait ConnectionProvider: Send + Sync {
    /// Acquire a connection for the named configuration.
    fn connection(&self, config_name: &str) -> Result<Box<dyn Connection>>;
}
