//! Resolved execution contexts handed to the CRUD executor.
//!
//! By the time one of these is built, every key reference has been resolved
//! to a concrete [`Value`] (or a sentinel, on the cycle-breaking path). The
//! executor only sees columns, type codes, and values.

use crate::binding::OpKind;
use rowtx_core::{TableSchema, TypeCode, Value};
use std::sync::Arc;

/// One positional parameter: a column, its declared type, and the value to
/// bind. The type code drives accessor selection even when the value is NULL.
#[derive(Debug, Clone)]
pub struct Param {
    pub column: String,
    pub code: TypeCode,
    pub value: Value,
}

impl Param {
    pub fn new(column: impl Into<String>, code: TypeCode, value: Value) -> Self {
        Self {
            column: column.into(),
            code,
            value,
        }
    }
}

/// Everything the executor needs to run one write operation.
#[derive(Debug)]
pub struct UpdateContext {
    pub schema: Arc<TableSchema>,
    pub kind: OpKind,
    /// Columns being written, in change-set order. Empty for deletes.
    pub set_params: Vec<Param>,
    /// WHERE clause parameters, from the persisted snapshot. Empty for
    /// inserts.
    pub where_params: Vec<Param>,
    /// Primary-key values for the secondary read-back SELECT. A
    /// [`Value::Null`] entry means the key is unknown and the secondary
    /// SELECT must be skipped.
    pub pk_params: Vec<Param>,
}

/// Everything the executor needs to run one read operation.
#[derive(Debug)]
pub struct QueryContext {
    pub schema: Arc<TableSchema>,
    /// WHERE clause parameters, in caller order.
    pub params: Vec<Param>,
}
