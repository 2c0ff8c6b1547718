//! Error types for rowtx operations.

use crate::types::TypeCode;
use std::fmt;

/// The primary error type for all rowtx operations.
#[derive(Debug)]
pub enum Error {
    /// A write affected a number of rows other than the expected one.
    RowCount(RowCountError),
    /// An update was attempted with an empty change set.
    NoChanges { table: String },
    /// No primary key, unique key, or fallback columns exist for a WHERE
    /// clause.
    NoIdentity { table: String },
    /// A single-row read matched more than one row.
    MultipleRows { table: String },
    /// No accessor is registered for a type code.
    UnsupportedType { code: TypeCode },
    /// A foreign-key cycle cannot be resolved safely on the target backend.
    CyclicConstraint(CyclicConstraintError),
    /// An operation was attempted against a binding or scope in the wrong
    /// state (e.g. mutating a delete-marked row, committing a failed scope).
    InvalidState { message: String },
    /// Value/type mismatch during accessor marshalling.
    Type(TypeError),
    /// Backend-reported error, passed through with operation context.
    Backend(BackendError),
}

/// Affected-row count mismatch for a single-row statement.
#[derive(Debug)]
pub struct RowCountError {
    pub table: String,
    pub operation: &'static str,
    pub expected: u64,
    pub actual: u64,
}

/// A strongly-connected component of pending rows that the target backend
/// cannot commit safely.
#[derive(Debug)]
pub struct CyclicConstraintError {
    /// Tables participating in the cycle, in arena order.
    pub tables: Vec<String>,
}

/// Value/type mismatch detected during bind or read.
#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

/// An error the database driver reported, with the table and operation
/// attached by the executor. The underlying error is never rewritten.
#[derive(Debug)]
pub struct BackendError {
    pub table: Option<String>,
    pub operation: Option<&'static str>,
    pub message: String,
    pub sqlstate: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    /// Create a backend error with only a message. Context is attached by
    /// the executor via [`Error::with_context`].
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            table: None,
            operation: None,
            message: message.into(),
            sqlstate: None,
            source: None,
        }
    }

    /// Is this a unique constraint violation?
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23505")
    }

    /// Is this a foreign key violation?
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23503")
    }
}

impl Error {
    /// Construct a backend error from a bare message.
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend(BackendError::message(message))
    }

    /// Attach table and operation context to a backend error. Other error
    /// kinds already carry their context and pass through unchanged.
    #[must_use]
    pub fn with_context(self, table: &str, operation: &'static str) -> Self {
        match self {
            Error::Backend(mut e) => {
                e.table.get_or_insert_with(|| table.to_string());
                e.operation.get_or_insert(operation);
                Error::Backend(e)
            }
            other => other,
        }
    }

    /// Get SQLSTATE if available (e.g., "23505" for unique violation).
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Backend(e) => e.sqlstate.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RowCount(e) => write!(
                f,
                "expected {} row(s) affected by {} on '{}', got {}",
                e.expected, e.operation, e.table, e.actual
            ),
            Error::NoChanges { table } => {
                write!(f, "update on '{}' has no changed columns", table)
            }
            Error::NoIdentity { table } => write!(
                f,
                "no primary key, unique key, or columns available to identify a row in '{}'",
                table
            ),
            Error::MultipleRows { table } => {
                write!(f, "single-row read on '{}' matched more than one row", table)
            }
            Error::UnsupportedType { code } => {
                write!(f, "no accessor registered for type code {:?}", code)
            }
            Error::CyclicConstraint(e) => write!(
                f,
                "foreign-key cycle across [{}] cannot be committed: backend does not defer constraint checks",
                e.tables.join(", ")
            ),
            Error::InvalidState { message } => write!(f, "invalid state: {}", message),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Backend(e) => {
                match (&e.table, e.operation) {
                    (Some(table), Some(op)) => {
                        write!(f, "backend error during {} on '{}': ", op, table)?;
                    }
                    (Some(table), None) => write!(f, "backend error on '{}': ", table)?,
                    _ => write!(f, "backend error: ")?,
                }
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "{} (SQLSTATE {})", e.message, sqlstate)
                } else {
                    write!(f, "{}", e.message)
                }
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Backend(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<RowCountError> for Error {
    fn from(err: RowCountError) -> Self {
        Error::RowCount(err)
    }
}

impl From<CyclicConstraintError> for Error {
    fn from(err: CyclicConstraintError) -> Self {
        Error::CyclicConstraint(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Error::Backend(err)
    }
}

/// Result type alias for rowtx operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_attaches_once() {
        let err = Error::backend("boom").with_context("users", "insert");
        let Error::Backend(e) = &err else {
            panic!("expected Backend");
        };
        assert_eq!(e.table.as_deref(), Some("users"));
        assert_eq!(e.operation, Some("insert"));

        // A second attach must not overwrite the original context.
        let err = err.with_context("orders", "update");
        let Error::Backend(e) = &err else {
            panic!("expected Backend");
        };
        assert_eq!(e.table.as_deref(), Some("users"));
        assert_eq!(e.operation, Some("insert"));
    }

    #[test]
    fn context_passes_through_non_backend() {
        let err = Error::NoChanges {
            table: "users".to_string(),
        }
        .with_context("users", "update");
        assert!(matches!(err, Error::NoChanges { .. }));
    }

    #[test]
    fn sqlstate_helpers() {
        let backend = BackendError {
            table: None,
            operation: None,
            message: "duplicate key".to_string(),
            sqlstate: Some("23505".to_string()),
            source: None,
        };
        assert!(backend.is_unique_violation());
        assert!(!backend.is_foreign_key_violation());

        let err = Error::Backend(backend);
        assert_eq!(err.sqlstate(), Some("23505"));
    }

    #[test]
    fn display_row_count() {
        let err = Error::RowCount(RowCountError {
            table: "users".to_string(),
            operation: "insert",
            expected: 1,
            actual: 0,
        });
        let text = err.to_string();
        assert!(text.contains("users"));
        assert!(text.contains("insert"));
    }
}
