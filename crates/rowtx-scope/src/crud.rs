//! Parameterized SQL execution and reflected-row reconciliation.
//!
//! The executor turns a resolved [`UpdateContext`] or [`QueryContext`] into
//! one parameterized statement, binds every parameter through the accessor
//! registry, enforces the single-row affected-count contract, and reads the
//! written row back so generated and defaulted columns land in the caller's
//! snapshot.
//!
//! Read-back order after a write:
//!
//! 1. the driver's generated-keys result set, requested for all columns;
//! 2. if the driver reported only a row-identifier alias, a SELECT on the
//!    alias's query column;
//! 3. if the driver reported nothing, a SELECT by primary key;
//! 4. with no primary key either, no read-back at all (`Ok(None)`).

use crate::context::{Param, QueryContext, UpdateContext};
use rowtx_core::{
    AccessorRegistry, Connection, Error, Result, Row, RowCountError, RowIdAlias, Rows, Statement,
    TableSchema, TypeCode, Value,
};
use std::sync::Arc;

/// Stateless executor for the five SQL shapes the engine emits.
pub struct CrudExecutor<'a> {
    accessors: &'a AccessorRegistry,
}

/// What the driver reported after a write, extracted while the statement
/// borrow was still alive.
enum Reflection {
    /// A full generated-keys row.
    Row(Row),
    /// Only a row-identifier alias; fetch the row by its query column.
    RowId(i64),
    /// Nothing usable; fall back to the primary key.
    None,
}

impl<'a> CrudExecutor<'a> {
    pub fn new(accessors: &'a AccessorRegistry) -> Self {
        Self { accessors }
    }

    /// Insert one row; returns the reflected row, or `None` when the table
    /// gives the driver no way to find the row again.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %ctx.schema.name()))]
    pub fn insert(&self, conn: &mut dyn Connection, ctx: &UpdateContext) -> Result<Option<Row>> {
        self.insert_inner(conn, ctx)
            .map_err(|e| e.with_context(ctx.schema.name(), "insert"))
    }

    fn insert_inner(&self, conn: &mut dyn Connection, ctx: &UpdateContext) -> Result<Option<Row>> {
        let columns: Vec<&str> = ctx.set_params.iter().map(|p| p.column.as_str()).collect();
        let sql = insert_sql(ctx.schema.name(), &columns);
        tracing::debug!(sql = %sql, "executing insert");

        // Every column is requested so defaulted values reflect too.
        let generated: Vec<String> = ctx.schema.column_names().map(str::to_string).collect();
        let alias = conn.capabilities().rowid_alias;

        let reflection = {
            let mut stmt = conn.prepare(&sql, &generated)?;
            self.bind_params(stmt.as_mut(), &ctx.set_params)?;
            let affected = stmt.execute_update()?;
            if affected != 1 {
                return Err(row_count(ctx.schema.name(), "insert", affected));
            }
            self.fetch_generated(stmt.as_mut(), &ctx.schema, alias)?
        };

        self.resolve_reflection(conn, ctx, reflection)
    }

    /// Update one row; same read-back behavior as insert.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %ctx.schema.name()))]
    pub fn update(&self, conn: &mut dyn Connection, ctx: &UpdateContext) -> Result<Option<Row>> {
        self.update_inner(conn, ctx, true)
            .map_err(|e| e.with_context(ctx.schema.name(), "update"))
    }

    /// Update one row without reading it back. Used for follow-up patches
    /// whose values the engine already knows exactly.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %ctx.schema.name()))]
    pub fn patch_update(&self, conn: &mut dyn Connection, ctx: &UpdateContext) -> Result<()> {
        self.update_inner(conn, ctx, false)
            .map(|_| ())
            .map_err(|e| e.with_context(ctx.schema.name(), "update"))
    }

    fn update_inner(
        &self,
        conn: &mut dyn Connection,
        ctx: &UpdateContext,
        reflect: bool,
    ) -> Result<Option<Row>> {
        if ctx.set_params.is_empty() {
            return Err(Error::NoChanges {
                table: ctx.schema.name().to_string(),
            });
        }
        let set_columns: Vec<&str> = ctx.set_params.iter().map(|p| p.column.as_str()).collect();
        let where_columns: Vec<&str> =
            ctx.where_params.iter().map(|p| p.column.as_str()).collect();
        let sql = update_sql(ctx.schema.name(), &set_columns, &where_columns);
        tracing::debug!(sql = %sql, "executing update");

        let generated: Vec<String> = if reflect {
            ctx.schema.column_names().map(str::to_string).collect()
        } else {
            Vec::new()
        };
        let alias = conn.capabilities().rowid_alias;

        let reflection = {
            let mut stmt = conn.prepare(&sql, &generated)?;
            self.bind_params(stmt.as_mut(), &ctx.set_params)?;
            self.bind_params_from(stmt.as_mut(), &ctx.where_params, ctx.set_params.len())?;
            let affected = stmt.execute_update()?;
            if affected != 1 {
                return Err(row_count(ctx.schema.name(), "update", affected));
            }
            if reflect {
                self.fetch_generated(stmt.as_mut(), &ctx.schema, alias)?
            } else {
                Reflection::None
            }
        };

        if reflect {
            self.resolve_reflection(conn, ctx, reflection)
        } else {
            Ok(None)
        }
    }

    /// Delete one row.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %ctx.schema.name()))]
    pub fn delete(&self, conn: &mut dyn Connection, ctx: &UpdateContext) -> Result<()> {
        self.delete_inner(conn, ctx)
            .map_err(|e| e.with_context(ctx.schema.name(), "delete"))
    }

    fn delete_inner(&self, conn: &mut dyn Connection, ctx: &UpdateContext) -> Result<()> {
        let where_columns: Vec<&str> =
            ctx.where_params.iter().map(|p| p.column.as_str()).collect();
        let sql = delete_sql(ctx.schema.name(), &where_columns);
        tracing::debug!(sql = %sql, "executing delete");

        let mut stmt = conn.prepare(&sql, &[])?;
        self.bind_params(stmt.as_mut(), &ctx.where_params)?;
        let affected = stmt.execute_update()?;
        if affected != 1 {
            return Err(row_count(ctx.schema.name(), "delete", affected));
        }
        Ok(())
    }

    /// Fetch at most one row; more than one match is an error.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %ctx.schema.name()))]
    pub fn read_one(&self, conn: &mut dyn Connection, ctx: &QueryContext) -> Result<Option<Row>> {
        self.read_one_inner(conn, ctx)
            .map_err(|e| e.with_context(ctx.schema.name(), "read"))
    }

    fn read_one_inner(
        &self,
        conn: &mut dyn Connection,
        ctx: &QueryContext,
    ) -> Result<Option<Row>> {
        let where_columns: Vec<&str> = ctx.params.iter().map(|p| p.column.as_str()).collect();
        let sql = select_sql(ctx.schema.name(), &where_columns);
        tracing::debug!(sql = %sql, "executing query");

        let mut stmt = conn.prepare(&sql, &[])?;
        self.bind_params(stmt.as_mut(), &ctx.params)?;
        let mut rows = stmt.execute_query()?;
        if !rows.advance()? {
            return Ok(None);
        }
        let row = self.read_row(rows.as_ref(), &ctx.schema)?;
        if rows.advance()? {
            return Err(Error::MultipleRows {
                table: ctx.schema.name().to_string(),
            });
        }
        Ok(Some(row))
    }

    /// Fetch every matching row, in cursor order.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %ctx.schema.name()))]
    pub fn read_many(&self, conn: &mut dyn Connection, ctx: &QueryContext) -> Result<Vec<Row>> {
        self.read_many_inner(conn, ctx)
            .map_err(|e| e.with_context(ctx.schema.name(), "read"))
    }

    fn read_many_inner(&self, conn: &mut dyn Connection, ctx: &QueryContext) -> Result<Vec<Row>> {
        let where_columns: Vec<&str> = ctx.params.iter().map(|p| p.column.as_str()).collect();
        let sql = select_sql(ctx.schema.name(), &where_columns);
        tracing::debug!(sql = %sql, "executing query");

        let mut stmt = conn.prepare(&sql, &[])?;
        self.bind_params(stmt.as_mut(), &ctx.params)?;
        let mut rows = stmt.execute_query()?;
        let mut out = Vec::new();
        while rows.advance()? {
            out.push(self.read_row(rows.as_ref(), &ctx.schema)?);
        }
        Ok(out)
    }

    fn bind_params(&self, stmt: &mut dyn Statement, params: &[Param]) -> Result<()> {
        self.bind_params_from(stmt, params, 0)
    }

    fn bind_params_from(
        &self,
        stmt: &mut dyn Statement,
        params: &[Param],
        offset: usize,
    ) -> Result<()> {
        for (i, param) in params.iter().enumerate() {
            self.accessors
                .get(param.code)?
                .bind(stmt, offset + i, &param.value)?;
        }
        Ok(())
    }

    /// Read the current cursor row into a [`Row`], choosing accessors by the
    /// schema's type codes. Columns the schema does not know (driver-reported
    /// identifiers) are read as BIGINT.
    fn read_row(&self, rows: &dyn Rows, schema: &TableSchema) -> Result<Row> {
        let columns: Vec<String> = rows.columns().to_vec();
        let mut values = Vec::with_capacity(columns.len());
        for (pos, column) in columns.iter().enumerate() {
            let code = schema.type_code_of(column).unwrap_or(TypeCode::BigInt);
            values.push(self.accessors.get(code)?.read(rows, pos)?);
        }
        Ok(Row::new(columns, values))
    }

    /// Pull the generated-keys result set while the statement is live.
    fn fetch_generated(
        &self,
        stmt: &mut dyn Statement,
        schema: &TableSchema,
        alias: Option<RowIdAlias>,
    ) -> Result<Reflection> {
        let Some(mut rows) = stmt.generated_keys()? else {
            return Ok(Reflection::None);
        };
        if !rows.advance()? {
            return Ok(Reflection::None);
        }
        // A single column under the alias's reported name is not real column
        // data, only a handle to fetch the row with.
        if let Some(alias) = alias {
            let columns = rows.columns();
            if columns.len() == 1 && columns[0] == alias.reported {
                let id = rows.get_i64(0)?.ok_or_else(|| {
                    Error::backend("driver reported a NULL row identifier".to_string())
                })?;
                if rows.advance()? {
                    return Err(Error::MultipleRows {
                        table: schema.name().to_string(),
                    });
                }
                return Ok(Reflection::RowId(id));
            }
        }
        let row = self.read_row(rows.as_ref(), schema)?;
        if rows.advance()? {
            return Err(Error::MultipleRows {
                table: schema.name().to_string(),
            });
        }
        Ok(Reflection::Row(row))
    }

    /// Turn the driver's reflection report into the final reflected row.
    fn resolve_reflection(
        &self,
        conn: &mut dyn Connection,
        ctx: &UpdateContext,
        reflection: Reflection,
    ) -> Result<Option<Row>> {
        match reflection {
            Reflection::Row(row) => Ok(Some(row)),
            Reflection::RowId(id) => {
                let alias = conn.capabilities().rowid_alias.ok_or_else(|| {
                    Error::backend("driver reported a row identifier without an alias".to_string())
                })?;
                let params = vec![Param::new(
                    alias.query_column,
                    TypeCode::BigInt,
                    Value::BigInt(id),
                )];
                self.reflect_select(conn, &ctx.schema, params)
                    .map(Some)
            }
            Reflection::None => self.secondary_select(conn, ctx),
        }
    }

    /// Read-back by primary key when the driver reported no generated keys.
    /// Only tables without any primary key skip read-back; a primary key
    /// whose value is locally unknown means the written row can never be
    /// found again, which is a hard failure.
    fn secondary_select(
        &self,
        conn: &mut dyn Connection,
        ctx: &UpdateContext,
    ) -> Result<Option<Row>> {
        if ctx.pk_params.is_empty() {
            return Ok(None);
        }
        if ctx.pk_params.iter().any(|p| p.value.is_null()) {
            return Err(row_count(ctx.schema.name(), "reflect", 0));
        }
        self.reflect_select(conn, &ctx.schema, ctx.pk_params.clone())
            .map(Some)
    }

    /// A read-back SELECT that must find exactly one row.
    fn reflect_select(
        &self,
        conn: &mut dyn Connection,
        schema: &Arc<TableSchema>,
        params: Vec<Param>,
    ) -> Result<Row> {
        let query = QueryContext {
            schema: Arc::clone(schema),
            params,
        };
        match self.read_one_inner(conn, &query)? {
            Some(row) => Ok(row),
            None => Err(row_count(schema.name(), "reflect", 0)),
        }
    }
}

fn row_count(table: &str, operation: &'static str, actual: u64) -> Error {
    Error::RowCount(RowCountError {
        table: table.to_string(),
        operation,
        expected: 1,
        actual,
    })
}

pub(crate) fn insert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {}({}) VALUES({})",
        table,
        columns.join(", "),
        placeholders
    )
}

pub(crate) fn update_sql(table: &str, set_columns: &[&str], where_columns: &[&str]) -> String {
    let set: Vec<String> = set_columns.iter().map(|c| format!("{}=?", c)).collect();
    format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        set.join(", "),
        where_clause(where_columns)
    )
}

pub(crate) fn delete_sql(table: &str, where_columns: &[&str]) -> String {
    format!("DELETE FROM {} WHERE {}", table, where_clause(where_columns))
}

pub(crate) fn select_sql(table: &str, where_columns: &[&str]) -> String {
    if where_columns.is_empty() {
        format!("SELECT * FROM {}", table)
    } else {
        format!("SELECT * FROM {} WHERE {}", table, where_clause(where_columns))
    }
}

fn where_clause(columns: &[&str]) -> String {
    let parts: Vec<String> = columns.iter().map(|c| format!("{}=?", c)).collect();
    parts.join(" AND ")
}
