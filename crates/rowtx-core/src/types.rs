//! SQL type codes.
//!
//! A [`TypeCode`] identifies the SQL type of a column for the purposes of
//! accessor dispatch. The set is sealed: the accessor registry is checked for
//! totality over [`TypeCode::ALL`] at construction time, so dispatch can never
//! hit an unregistered code at runtime unless a caller builds a partial
//! registry on purpose.

use serde::{Deserialize, Serialize};

/// Sealed enumeration of SQL type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCode {
    Boolean,
    Integer,
    BigInt,
    Double,
    Decimal,
    Text,
    Blob,
    Date,
    Time,
    Timestamp,
    Uuid,
    Json,
}

impl TypeCode {
    /// Every type code, in declaration order. Used for registry totality
    /// checks.
    pub const ALL: &'static [TypeCode] = &[
        TypeCode::Boolean,
        TypeCode::Integer,
        TypeCode::BigInt,
        TypeCode::Double,
        TypeCode::Decimal,
        TypeCode::Text,
        TypeCode::Blob,
        TypeCode::Date,
        TypeCode::Time,
        TypeCode::Timestamp,
        TypeCode::Uuid,
        TypeCode::Json,
    ];

    /// Get the SQL type name for this code.
    pub const fn sql_name(&self) -> &'static str {
        match self {
            TypeCode::Boolean => "BOOLEAN",
            TypeCode::Integer => "INTEGER",
            TypeCode::BigInt => "BIGINT",
            TypeCode::Double => "DOUBLE PRECISION",
            TypeCode::Decimal => "DECIMAL",
            TypeCode::Text => "TEXT",
            TypeCode::Blob => "BLOB",
            TypeCode::Date => "DATE",
            TypeCode::Time => "TIME",
            TypeCode::Timestamp => "TIMESTAMP",
            TypeCode::Uuid => "UUID",
            TypeCode::Json => "JSON",
        }
    }

    /// Check if this code is an integer type. Integer codes get a `0`
    /// sentinel when a forward key reference must satisfy a NOT NULL
    /// constraint inside a reference cycle.
    pub const fn is_integer(&self) -> bool {
        matches!(self, TypeCode::Integer | TypeCode::BigInt)
    }
}
