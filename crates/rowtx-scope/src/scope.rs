//! Transaction scope: the row-graph arena and the commit engine.
//!
//! A [`TxScope`] owns an arena of [`RowBinding`]s addressed by [`RowId`].
//! Rows may reference each other's not-yet-generated key columns through
//! [`KeyRef`]s; `commit` orders the pending operations so every reference is
//! resolved before it is bound, executes them inside one database
//! transaction, and promotes every binding's snapshot only after the
//! transaction commits.
//!
//! Ordering rules:
//!
//! - deletes run first, in reverse registration order;
//! - inserts and updates run in dependency order, breaking ties by
//!   registration order so a given scope always commits the same way;
//! - a dependency cycle is committed with sentinel values plus follow-up
//!   patch UPDATEs when the backend defers constraint checking, and rejected
//!   with [`CyclicConstraintError`] otherwise.
//!
//! A failed commit rolls back, drops everything resolved during the pass,
//! and poisons the scope; change sets stay intact and [`TxScope::reset`]
//! makes the scope usable again.

use crate::binding::{BoundValue, KeyRef, OpKind, RowBinding, RowId, RowState};
use crate::context::{Param, QueryContext, UpdateContext};
use crate::crud::CrudExecutor;
use rowtx_core::{
    AccessorRegistry, Connection, ConnectionProvider, CyclicConstraintError, Error, Result, Row,
    SchemaSource, TableSchema, TypeCode, Value,
};
use std::sync::Arc;

/// Configuration a scope commits against.
pub struct ScopeConfig {
    config_name: String,
    provider: Arc<dyn ConnectionProvider>,
    accessors: Arc<AccessorRegistry>,
    schemas: Option<Arc<dyn SchemaSource>>,
}

impl ScopeConfig {
    /// A config using the standard accessor registry.
    pub fn new(config_name: impl Into<String>, provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            config_name: config_name.into(),
            provider,
            accessors: AccessorRegistry::standard(),
            schemas: None,
        }
    }

    /// Replace the accessor registry.
    #[must_use]
    pub fn accessors(mut self, accessors: Arc<AccessorRegistry>) -> Self {
        self.accessors = accessors;
        self
    }

    /// Attach a schema source so scope rows can be addressed by table name.
    #[must_use]
    pub fn schemas(mut self, schemas: Arc<dyn SchemaSource>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }
}

/// Counts of pending operations, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PendingCounts {
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl PendingCounts {
    pub fn total(&self) -> usize {
        self.inserts + self.updates + self.deletes
    }
}

/// A sentinel-substituted reference that must be patched after the cycle's
/// rows exist.
struct PatchOp {
    row: RowId,
    column: String,
    target: RowId,
    target_column: String,
}

/// A transaction scope over one named configuration.
pub struct TxScope {
    config: ScopeConfig,
    rows: Vec<RowBinding>,
    poisoned: bool,
}

impl TxScope {
    pub fn new(config: ScopeConfig) -> Self {
        Self {
            config,
            rows: Vec::new(),
            poisoned: false,
        }
    }

    /// Register a fresh row to be inserted on commit.
    pub fn insert_row(&mut self, schema: Arc<TableSchema>) -> RowId {
        let id = RowId(self.rows.len());
        self.rows.push(RowBinding::new_insert(schema));
        id
    }

    /// Attach an already-persisted row (a read result) for update or delete.
    pub fn attach_row(&mut self, schema: Arc<TableSchema>, row: &Row) -> RowId {
        let id = RowId(self.rows.len());
        self.rows.push(RowBinding::from_persisted(schema, row));
        id
    }

    /// Look up a table schema through the config's schema source.
    pub fn schema(&self, table: &str) -> Result<Arc<TableSchema>> {
        match &self.config.schemas {
            Some(source) => source.table(table),
            None => Err(Error::InvalidState {
                message: format!(
                    "no schema source configured; cannot resolve table '{}'",
                    table
                ),
            }),
        }
    }

    /// Register a fresh row by table name.
    pub fn insert_into(&mut self, table: &str) -> Result<RowId> {
        let schema = self.schema(table)?;
        Ok(self.insert_row(schema))
    }

    pub fn binding(&self, row: RowId) -> Result<&RowBinding> {
        self.rows.get(row.0).ok_or_else(|| Error::InvalidState {
            message: format!("{} is not registered in this scope", row),
        })
    }

    fn binding_mut(&mut self, row: RowId) -> Result<&mut RowBinding> {
        self.rows.get_mut(row.0).ok_or_else(|| Error::InvalidState {
            message: format!("{} is not registered in this scope", row),
        })
    }

    /// Set a column value on a row.
    pub fn set(&mut self, row: RowId, column: &str, value: impl Into<Value>) -> Result<()> {
        self.binding_mut(row)?.set_value(column, value)
    }

    /// Point a column at another row's key column, to be resolved at commit.
    pub fn set_ref(&mut self, row: RowId, column: &str, target: RowId, target_column: &str) -> Result<()> {
        if self.binding(target)?.schema().type_code_of(target_column).is_err() {
            return Err(Error::InvalidState {
                message: format!(
                    "reference target column '{}' does not exist on '{}'",
                    target_column,
                    self.binding(target)?.schema().name()
                ),
            });
        }
        self.binding_mut(row)?.set_key_ref(
            column,
            KeyRef {
                target,
                column: target_column.to_string(),
            },
        )
    }

    /// Mark a row for deletion on commit.
    pub fn mark_delete(&mut self, row: RowId) -> Result<()> {
        self.binding_mut(row)?.mark_delete();
        Ok(())
    }

    /// Discard a row's uncommitted changes.
    pub fn revert(&mut self, row: RowId) -> Result<()> {
        self.binding_mut(row)?.revert();
        Ok(())
    }

    /// Whether any row has work pending for the next commit.
    pub fn has_pending(&self) -> bool {
        self.pending_counts().total() > 0
    }

    pub fn pending_counts(&self) -> PendingCounts {
        let mut counts = PendingCounts::default();
        for binding in &self.rows {
            match binding.kind() {
                OpKind::Insert => counts.inserts += 1,
                OpKind::Update => counts.updates += 1,
                // A delete of a row that was never persisted is a no-op.
                OpKind::Delete if binding.is_persisted() => counts.deletes += 1,
                OpKind::Delete | OpKind::Unchanged => {}
            }
        }
        counts
    }

    /// Clear the poison flag after a failed commit. Change sets are kept, so
    /// the scope can be amended and committed again.
    pub fn reset(&mut self) {
        self.poisoned = false;
    }

    /// Fetch at most one row outside any pending transaction.
    pub fn read_one(
        &self,
        schema: &Arc<TableSchema>,
        filters: &[(&str, Value)],
    ) -> Result<Option<Row>> {
        let ctx = self.query_context(schema, filters)?;
        let mut conn = self.config.provider.connection(&self.config.config_name)?;
        CrudExecutor::new(&self.config.accessors).read_one(conn.as_mut(), &ctx)
    }

    /// Fetch every matching row.
    pub fn read_many(
        &self,
        schema: &Arc<TableSchema>,
        filters: &[(&str, Value)],
    ) -> Result<Vec<Row>> {
        let ctx = self.query_context(schema, filters)?;
        let mut conn = self.config.provider.connection(&self.config.config_name)?;
        CrudExecutor::new(&self.config.accessors).read_many(conn.as_mut(), &ctx)
    }

    /// Fetch at most one row and build a caller value from it.
    pub fn read_one_with<T>(
        &self,
        schema: &Arc<TableSchema>,
        filters: &[(&str, Value)],
        build: impl FnOnce(Row) -> Result<T>,
    ) -> Result<Option<T>> {
        self.read_one(schema, filters)?.map(build).transpose()
    }

    /// Fetch every matching row, building a caller value from each.
    pub fn read_many_with<T>(
        &self,
        schema: &Arc<TableSchema>,
        filters: &[(&str, Value)],
        mut build: impl FnMut(Row) -> Result<T>,
    ) -> Result<Vec<T>> {
        self.read_many(schema, filters)?
            .into_iter()
            .map(|row| build(row))
            .collect()
    }

    fn query_context(
        &self,
        schema: &Arc<TableSchema>,
        filters: &[(&str, Value)],
    ) -> Result<QueryContext> {
        let mut params = Vec::with_capacity(filters.len());
        for (column, value) in filters {
            let code = schema.type_code_of(column)?;
            params.push(Param::new(*column, code, value.clone()));
        }
        Ok(QueryContext {
            schema: Arc::clone(schema),
            params,
        })
    }

    /// Commit every pending operation in one database transaction.
    ///
    /// On success all snapshots are promoted and change sets cleared. On
    /// failure the transaction is rolled back, nothing is promoted, and the
    /// scope is poisoned until [`TxScope::reset`].
    #[tracing::instrument(level = "debug", skip_all, fields(config = %self.config.config_name))]
    pub fn commit(&mut self) -> Result<()> {
        if self.poisoned {
            return Err(Error::InvalidState {
                message: "scope poisoned by a failed commit; call reset() first".to_string(),
            });
        }
        let counts = self.pending_counts();
        if counts.total() == 0 {
            return Ok(());
        }
        tracing::debug!(
            inserts = counts.inserts,
            updates = counts.updates,
            deletes = counts.deletes,
            "committing scope"
        );

        let mut conn = self.config.provider.connection(&self.config.config_name)?;
        conn.begin()?;
        let result = self
            .run_pass(conn.as_mut())
            .and_then(|()| conn.commit());

        match result {
            Ok(()) => {
                for binding in &mut self.rows {
                    if binding.state() == RowState::Committed {
                        binding.apply_reflected_row();
                    }
                }
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = conn.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback after failed commit also failed");
                }
                for binding in &mut self.rows {
                    binding.drop_held();
                    if binding.state() != RowState::Pending {
                        binding.set_state(RowState::Pending);
                    }
                }
                self.poisoned = true;
                Err(err)
            }
        }
    }

    fn run_pass(&mut self, conn: &mut dyn Connection) -> Result<()> {
        // Deletes first, newest registration first, so dependent rows go
        // before the rows they point at.
        let deletes: Vec<RowId> = (0..self.rows.len())
            .rev()
            .map(RowId)
            .filter(|id| {
                let b = &self.rows[id.0];
                b.kind() == OpKind::Delete && b.is_persisted()
            })
            .collect();
        for id in deletes {
            let ctx = self.delete_context(id)?;
            CrudExecutor::new(&self.config.accessors).delete(conn, &ctx)?;
            self.rows[id.0].set_state(RowState::Committed);
        }

        let mut remaining: Vec<RowId> = (0..self.rows.len())
            .map(RowId)
            .filter(|id| matches!(self.rows[id.0].kind(), OpKind::Insert | OpKind::Update))
            .collect();

        while !remaining.is_empty() {
            let mut progressed = false;
            let mut still_blocked = Vec::new();
            for id in remaining.drain(..) {
                if self.is_blocked(id) {
                    still_blocked.push(id);
                } else {
                    self.execute_row(conn, id, false)?;
                    progressed = true;
                }
            }
            remaining = still_blocked;

            if !progressed && !remaining.is_empty() {
                return self.commit_cycle(conn, remaining);
            }
        }
        Ok(())
    }

    /// A row is blocked while any of its references points at an insert that
    /// has not committed in this pass.
    fn is_blocked(&self, id: RowId) -> bool {
        self.rows[id.0].key_refs().any(|(_, key_ref)| {
            let target = &self.rows[key_ref.target.0];
            target.kind() == OpKind::Insert && target.state() != RowState::Committed
        })
    }

    /// Commit a dependency cycle: insert every blocked row with sentinel
    /// values in place of unresolved references, then patch the real values
    /// in with follow-up UPDATEs. Only safe when the backend defers
    /// constraint checking to transaction end.
    fn commit_cycle(&mut self, conn: &mut dyn Connection, blocked: Vec<RowId>) -> Result<()> {
        if !conn.capabilities().deferred_constraints {
            let mut tables = Vec::new();
            for id in &blocked {
                let table = self.rows[id.0].schema().name().to_string();
                if !tables.contains(&table) {
                    tables.push(table);
                }
            }
            return Err(Error::CyclicConstraint(CyclicConstraintError { tables }));
        }
        tracing::debug!(rows = blocked.len(), "breaking dependency cycle with sentinels");

        let mut patches = Vec::new();
        for id in &blocked {
            for (column, key_ref) in self.rows[id.0].key_refs() {
                let target = &self.rows[key_ref.target.0];
                if target.kind() == OpKind::Insert && target.state() != RowState::Committed {
                    patches.push(PatchOp {
                        row: *id,
                        column: column.to_string(),
                        target: key_ref.target,
                        target_column: key_ref.column.clone(),
                    });
                }
            }
        }
        for id in blocked {
            self.execute_row(conn, id, true)?;
        }
        for patch in patches {
            self.apply_patch(conn, patch)?;
        }
        Ok(())
    }

    /// Execute one pending insert or update and hold its reflected row.
    fn execute_row(&mut self, conn: &mut dyn Connection, id: RowId, sentinels: bool) -> Result<()> {
        let (ctx, resolved) = self.update_context(id, sentinels)?;
        let executor = CrudExecutor::new(&self.config.accessors);
        let reflected = match ctx.kind {
            OpKind::Insert => executor.insert(conn, &ctx)?,
            OpKind::Update => executor.update(conn, &ctx)?,
            OpKind::Unchanged | OpKind::Delete => None,
        };

        let binding = &mut self.rows[id.0];
        for (column, value) in resolved {
            binding.hold_value(&column, value);
        }
        if let Some(row) = reflected {
            binding.hold_reflected_row(&row);
        }
        binding.set_state(RowState::Committed);
        Ok(())
    }

    /// Build the execution context for a pending insert or update, resolving
    /// every reference against the arena. With `sentinels` set, unresolved
    /// references bind a placeholder instead of failing.
    fn update_context(&self, id: RowId, sentinels: bool) -> Result<(UpdateContext, Vec<(String, Value)>)> {
        let binding = &self.rows[id.0];
        let schema = Arc::clone(binding.schema());
        let kind = binding.kind();
        if kind == OpKind::Insert && !binding.has_changes() {
            return Err(Error::NoChanges {
                table: schema.name().to_string(),
            });
        }

        let mut set_params = Vec::with_capacity(binding.changes().len());
        let mut resolved = Vec::new();
        for (column, bound) in binding.changes() {
            let code = schema.type_code_of(column)?;
            let value = match bound {
                BoundValue::Value(value) => value.clone(),
                BoundValue::Ref(key_ref) => {
                    match self.resolve_ref(key_ref) {
                        Some(value) => {
                            resolved.push((column.clone(), value.clone()));
                            value
                        }
                        None if sentinels => sentinel_value(&schema, column, code)?,
                        None => {
                            return Err(Error::InvalidState {
                                message: format!(
                                    "reference from '{}.{}' to {} is unresolved",
                                    schema.name(),
                                    column,
                                    key_ref.target
                                ),
                            });
                        }
                    }
                }
            };
            set_params.push(Param::new(column.as_str(), code, value));
        }

        let where_params = if kind == OpKind::Update {
            self.identity_params(binding)?
        } else {
            Vec::new()
        };

        // Primary-key values for the secondary read-back SELECT; an unknown
        // key stays NULL and disables it.
        let mut pk_params = Vec::new();
        for column in schema.primary_key_columns() {
            let code = schema.type_code_of(column)?;
            let value = set_params
                .iter()
                .find(|p| p.column == *column)
                .map(|p| p.value.clone())
                .or_else(|| binding.persisted_value(column).cloned())
                .unwrap_or(Value::Null);
            pk_params.push(Param::new(column.as_str(), code, value));
        }

        Ok((
            UpdateContext {
                schema,
                kind,
                set_params,
                where_params,
                pk_params,
            },
            resolved,
        ))
    }

    fn delete_context(&self, id: RowId) -> Result<UpdateContext> {
        let binding = &self.rows[id.0];
        Ok(UpdateContext {
            schema: Arc::clone(binding.schema()),
            kind: OpKind::Delete,
            set_params: Vec::new(),
            where_params: self.identity_params(binding)?,
            pk_params: Vec::new(),
        })
    }

    /// WHERE parameters identifying one persisted row, from its snapshot.
    fn identity_params(&self, binding: &RowBinding) -> Result<Vec<Param>> {
        let schema = binding.schema();
        let mut params = Vec::new();
        for column in schema.identity_columns()? {
            let code = schema.type_code_of(&column)?;
            let value = binding
                .persisted_value(&column)
                .cloned()
                .unwrap_or(Value::Null);
            params.push(Param::new(column, code, value));
        }
        Ok(params)
    }

    /// The referenced row's value, if it is known yet.
    fn resolve_ref(&self, key_ref: &KeyRef) -> Option<Value> {
        let target = &self.rows[key_ref.target.0];
        if target.kind() == OpKind::Insert && target.state() != RowState::Committed {
            return None;
        }
        target.current_value(&key_ref.column).cloned()
    }

    /// Replace one sentinel with the real key value, now that the referenced
    /// row exists and reflected its key.
    fn apply_patch(&mut self, conn: &mut dyn Connection, patch: PatchOp) -> Result<()> {
        let value = self.rows[patch.target.0]
            .current_value(&patch.target_column)
            .cloned()
            .ok_or_else(|| {
                Error::backend(format!(
                    "cannot patch cyclic reference: '{}.{}' was not reflected",
                    self.rows[patch.target.0].schema().name(),
                    patch.target_column
                ))
            })?;

        let binding = &self.rows[patch.row.0];
        let schema = Arc::clone(binding.schema());
        let code = schema.type_code_of(&patch.column)?;
        let mut where_params = Vec::new();
        for column in schema.identity_columns()? {
            let where_code = schema.type_code_of(&column)?;
            let where_value = binding
                .current_value(&column)
                .cloned()
                .unwrap_or(Value::Null);
            where_params.push(Param::new(column, where_code, where_value));
        }
        let ctx = UpdateContext {
            schema,
            kind: OpKind::Update,
            set_params: vec![Param::new(patch.column.as_str(), code, value.clone())],
            where_params,
            pk_params: Vec::new(),
        };
        CrudExecutor::new(&self.config.accessors).patch_update(conn, &ctx)?;

        // The snapshot must carry the real value, not the sentinel.
        self.rows[patch.row.0].hold_value(&patch.column, value);
        Ok(())
    }
}

/// Placeholder bound for an unresolved reference on the cycle path: a typed
/// NULL when the column allows it, zero for integer key columns.
fn sentinel_value(schema: &TableSchema, column: &str, code: TypeCode) -> Result<Value> {
    let nullable = schema
        .column_def(column)
        .map(|def| def.nullable)
        .unwrap_or(false);
    if nullable {
        return Ok(Value::Null);
    }
    match code {
        TypeCode::Integer => Ok(Value::Int(0)),
        TypeCode::BigInt => Ok(Value::BigInt(0)),
        _ => Err(Error::InvalidState {
            message: format!(
                "cannot break cycle through non-integer NOT NULL column '{}.{}'",
                schema.name(),
                column
            ),
        }),
    }
}
