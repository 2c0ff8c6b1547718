//! Row-graph transaction engine.
//!
//! `rowtx` tracks row mutations client-side and commits them atomically in
//! dependency order:
//!
//! - per-row change tracking against a last-known-committed snapshot
//! - forward key references between rows whose keys do not exist yet
//! - topological commit ordering, with cycle breaking on backends that
//!   defer constraint checking
//! - reconciliation of generated keys and defaulted columns after every
//!   write, including row-identifier-alias drivers
//!
//! The driver boundary is a small set of synchronous traits
//! ([`Connection`], [`Statement`], [`Rows`]); any database with
//! parameterized statements and an affected-row count can sit behind it.
//!
//! # Quick start
//!
//! ```no_run
//! use rowtx::{ScopeConfig, TableSchema, TxScope, TypeCode};
//! # fn provider() -> std::sync::Arc<dyn rowtx::ConnectionProvider> { unimplemented!() }
//!
//! # fn main() -> rowtx::Result<()> {
//! let users = TableSchema::new("users")
//!     .column("id", TypeCode::BigInt)
//!     .column("name", TypeCode::Text)
//!     .nullable_column("manager_id", TypeCode::BigInt)
//!     .primary_key(&["id"])
//!     .build();
//!
//! let mut scope = TxScope::new(ScopeConfig::new("main", provider()));
//!
//! let alice = scope.insert_row(users.clone());
//! scope.set(alice, "name", "Alice")?;
//!
//! // bob's manager_id takes alice's generated id at commit time.
//! let bob = scope.insert_row(users.clone());
//! scope.set(bob, "name", "Bob")?;
//! scope.set_ref(bob, "manager_id", alice, "id")?;
//!
//! scope.commit()?;
//! # Ok(())
//! # }
//! ```

pub use rowtx_core::{
    AccessorRegistry, Capabilities, ColumnDef, ColumnInfo, Connection, ConnectionProvider, Error,
    Result, Row, RowIdAlias, Rows, SchemaSource, Statement, TableSchema, TypeCode, Value,
    ValueAccessor,
};
pub use rowtx_scope::{
    BoundValue, KeyRef, OpKind, PendingCounts, RowBinding, RowId, RowState, ScopeConfig, TxScope,
};
