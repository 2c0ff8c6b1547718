//! Transaction-scope engine: per-row change tracking, dependency-ordered
//! commit, and parameterized CRUD execution.
//!
//! The flow is: register rows in a [`TxScope`], mutate them through
//! [`TxScope::set`] and [`TxScope::set_ref`], then [`TxScope::commit`] to
//! run every pending operation inside one database transaction. Snapshots
//! are promoted only after the transaction commits, so a failed commit
//! leaves every change set intact.
//!
//! ```no_run
//! use rowtx_core::{TableSchema, TypeCode};
//! use rowtx_scope::{ScopeConfig, TxScope};
//! # fn provider() -> std::sync::Arc<dyn rowtx_core::ConnectionProvider> { unimplemented!() }
//!
//! # fn main() -> rowtx_core::Result<()> {
//! let users = TableSchema::new("users")
//!     .column("id", TypeCode::BigInt)
//!     .column("name", TypeCode::Text)
//!     .primary_key(&["id"])
//!     .build();
//!
//! let mut scope = TxScope::new(ScopeConfig::new("main", provider()));
//! let alice = scope.insert_row(users.clone());
//! scope.set(alice, "name", "Alice")?;
//! scope.commit()?;
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod context;
pub mod crud;
pub mod scope;

pub use binding::{BoundValue, KeyRef, OpKind, RowBinding, RowId, RowState};
pub use context::{Param, QueryContext, UpdateContext};
pub use crud::CrudExecutor;
pub use scope::{PendingCounts, ScopeConfig, TxScope};
