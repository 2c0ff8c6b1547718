//! Per-row mutable change-tracking state.
//!
//! A [`RowBinding`] records everything the engine knows about one logical
//! database row: the last committed snapshot, the uncommitted change set, and
//! values "held" for it during a commit pass (resolved foreign keys and the
//! reflected row read back after a write).
//!
//! Change-set entries keep their insertion order so generated SQL is
//! deterministic. A column stays in the change set only while its value
//! differs from the persisted snapshot.

use rowtx_core::{Error, Result, Row, TableSchema, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Stable identifier of a row binding inside its scope's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub(crate) usize);

impl RowId {
    /// Arena index of this row.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row#{}", self.0)
    }
}

/// The CRUD operation a binding is pending for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Unchanged,
    Insert,
    Update,
    Delete,
}

impl OpKind {
    /// Lower-case label used in error context and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OpKind::Unchanged => "unchanged",
            OpKind::Insert => "insert",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        }
    }
}

/// Per-pass state of a binding. A binding never leaves `Committed` or
/// `Failed` within the same pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Pending,
    Committed,
    Failed,
}

/// Forward reference to another row's not-yet-known column value.
///
/// Exists only between the creation of a dependent row and the commit of the
/// referenced row; it is never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRef {
    /// The referenced row.
    pub target: RowId,
    /// The referenced row's column this reference resolves to.
    pub column: String,
}

/// A change-set entry: either a concrete value or a forward key reference.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Value(Value),
    Ref(KeyRef),
}

/// Mutable state of one logical database row.
#[derive(Debug)]
pub struct RowBinding {
    schema: Arc<TableSchema>,
    kind: OpKind,
    state: RowState,
    /// Last-known-committed values, in schema column order.
    persisted: Vec<(String, Value)>,
    /// Uncommitted changes, in insertion order.
    changes: Vec<(String, BoundValue)>,
    /// Values resolved during the current commit pass: propagated foreign
    /// keys and the reflected row after a successful write.
    held: HashMap<String, Value>,
}

impl RowBinding {
    /// A fresh row to be inserted.
    pub(crate) fn new_insert(schema: Arc<TableSchema>) -> Self {
        Self {
            schema,
            kind: OpKind::Insert,
            state: RowState::Pending,
            persisted: Vec::new(),
            changes: Vec::new(),
            held: HashMap::new(),
        }
    }

    /// A row already persisted in the database, attached for update/delete.
    pub(crate) fn from_persisted(schema: Arc<TableSchema>, row: &Row) -> Self {
        let persisted = row
            .iter()
            .map(|(col, value)| (col.to_string(), value.clone()))
            .collect();
        Self {
            schema,
            kind: OpKind::Unchanged,
            state: RowState::Pending,
            persisted,
            changes: Vec::new(),
            held: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: RowState) {
        self.state = state;
    }

    /// Record a value in the change set, or drop the entry if the value
    /// equals the persisted snapshot. Rejected on delete-marked bindings.
    pub fn set_value(&mut self, column: &str, value: impl Into<Value>) -> Result<()> {
        if self.kind == OpKind::Delete {
            return Err(Error::InvalidState {
                message: format!(
                    "cannot set '{}' on a row marked for delete from '{}'",
                    column,
                    self.schema.name()
                ),
            });
        }
        // Unknown columns are a caller bug, caught before SQL generation.
        self.schema.type_code_of(column)?;

        let value = value.into();
        if self.persisted_value(column) == Some(&value) {
            self.changes.retain(|(col, _)| col != column);
        } else {
            self.upsert_change(column, BoundValue::Value(value));
        }
        self.refresh_kind();
        Ok(())
    }

    /// Record a forward reference to another row's key column.
    pub fn set_key_ref(&mut self, column: &str, key_ref: KeyRef) -> Result<()> {
        if self.kind == OpKind::Delete {
            return Err(Error::InvalidState {
                message: format!(
                    "cannot set '{}' on a row marked for delete from '{}'",
                    column,
                    self.schema.name()
                ),
            });
        }
        self.schema.type_code_of(column)?;
        self.upsert_change(column, BoundValue::Ref(key_ref));
        self.refresh_kind();
        Ok(())
    }

    fn upsert_change(&mut self, column: &str, value: BoundValue) {
        if let Some(entry) = self.changes.iter_mut().find(|(col, _)| col == column) {
            entry.1 = value;
        } else {
            self.changes.push((column.to_string(), value));
        }
    }

    fn refresh_kind(&mut self) {
        self.kind = match self.kind {
            OpKind::Insert | OpKind::Delete => self.kind,
            OpKind::Unchanged | OpKind::Update => {
                if self.changes.is_empty() {
                    OpKind::Unchanged
                } else {
                    OpKind::Update
                }
            }
        };
    }

    /// Mark the row for deletion. A delete-kind binding carries no
    /// uncommitted changes.
    pub fn mark_delete(&mut self) {
        self.kind = OpKind::Delete;
        self.changes.clear();
    }

    /// Discard uncommitted changes, restoring the binding to its persisted
    /// state.
    pub fn revert(&mut self) {
        self.changes.clear();
        self.held.clear();
        self.kind = OpKind::Unchanged;
    }

    /// Last committed value of a column. Never reflects uncommitted changes.
    pub fn persisted_value(&self, column: &str) -> Option<&Value> {
        self.persisted
            .iter()
            .find(|(col, _)| col == column)
            .map(|(_, value)| value)
    }

    /// Whether this binding has ever been persisted.
    pub fn is_persisted(&self) -> bool {
        !self.persisted.is_empty()
    }

    /// The uncommitted change set, in insertion order.
    pub fn changes(&self) -> &[(String, BoundValue)] {
        &self.changes
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Unresolved forward references in the change set.
    pub fn key_refs(&self) -> impl Iterator<Item = (&str, &KeyRef)> {
        self.changes.iter().filter_map(|(col, value)| match value {
            BoundValue::Ref(key_ref) => Some((col.as_str(), key_ref)),
            BoundValue::Value(_) => None,
        })
    }

    /// Stash a value resolved during the commit pass (commit engine only).
    pub fn hold_value(&mut self, column: &str, value: Value) {
        self.held.insert(column.to_string(), value);
    }

    /// A value stashed during the current commit pass.
    pub fn held_value(&self, column: &str) -> Option<&Value> {
        self.held.get(column)
    }

    /// Stash a whole reflected row read back after a write.
    pub fn hold_reflected_row(&mut self, row: &Row) {
        for (col, value) in row.iter() {
            self.held.insert(col.to_string(), value.clone());
        }
    }

    /// Best local knowledge of a column's value: held, then pending change
    /// (if concrete), then persisted.
    pub fn current_value(&self, column: &str) -> Option<&Value> {
        if let Some(value) = self.held.get(column) {
            return Some(value);
        }
        if let Some((_, BoundValue::Value(value))) =
            self.changes.iter().find(|(col, _)| col == column)
        {
            return Some(value);
        }
        self.persisted_value(column)
    }

    /// Drop everything stashed during a failed pass. The change set stays
    /// intact.
    pub(crate) fn drop_held(&mut self) {
        self.held.clear();
    }

    /// Promote the pass's outcome into the persisted snapshot after the
    /// database transaction committed. For each schema column the new
    /// snapshot takes the held (reflected or resolved) value first, then the
    /// caller's change, then the old persisted value; columns with no known
    /// value stay absent. Deletes clear the snapshot entirely.
    pub(crate) fn apply_reflected_row(&mut self) {
        if self.kind == OpKind::Delete {
            self.persisted.clear();
        } else {
            let schema = Arc::clone(&self.schema);
            self.persisted = schema
                .column_names()
                .filter_map(|col| {
                    if let Some(value) = self.held.get(col) {
                        return Some((col.to_string(), value.clone()));
                    }
                    if let Some((_, BoundValue::Value(value))) =
                        self.changes.iter().find(|(c, _)| c == col)
                    {
                        return Some((col.to_string(), value.clone()));
                    }
                    self.persisted_value(col)
                        .map(|value| (col.to_string(), value.clone()))
                })
                .collect();
        }
        self.changes.clear();
        self.held.clear();
        self.kind = OpKind::Unchanged;
        self.state = RowState::Pending;
    }
}
