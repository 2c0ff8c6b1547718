//! Type-code-indexed value marshalling.
//!
//! Each [`ValueAccessor`] is the bidirectional strategy for one
//! [`TypeCode`]: it binds a [`Value`] into a statement parameter slot and
//! reads a column of a result cursor back into a [`Value`]. Binding a
//! [`Value::Null`] always goes through [`Statement::bind_null`] with the
//! accessor's own type code, so backends that reject untyped nulls get a
//! typed one.
//!
//! The [`AccessorRegistry`] maps every type code to its accessor. A custom
//! registry is rejected at construction if any code lacks an accessor;
//! lookup is O(1) and side-effect-free.

use crate::backend::{Rows, Statement};
use crate::error::{Error, Result, TypeError};
use crate::types::TypeCode;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Bidirectional marshalling strategy for one SQL type code.
pub trait ValueAccessor: Send + Sync {
    /// The type code this accessor handles.
    fn type_code(&self) -> TypeCode;

    /// Bind `value` into parameter slot `pos`.
    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()>;

    /// Read column `pos` of the cursor's current row.
    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value>;
}

fn mismatch(expected: &'static str, value: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: value.type_name().to_string(),
        column: None,
    })
}

macro_rules! null_guard {
    ($self:ident, $stmt:ident, $pos:ident, $value:ident) => {
        if $value.is_null() {
            return $stmt.bind_null($pos, $self.type_code());
        }
    };
}

/// BOOLEAN columns.
pub struct BoolAccessor;

impl ValueAccessor for BoolAccessor {
    fn type_code(&self) -> TypeCode {
        TypeCode::Boolean
    }

    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()> {
        null_guard!(self, stmt, pos, value);
        let v = value.as_bool().ok_or_else(|| mismatch("BOOLEAN", value))?;
        stmt.bind_bool(pos, v)
    }

    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value> {
        Ok(rows.get_bool(pos)?.map_or(Value::Null, Value::Bool))
    }
}

/// INTEGER columns.
pub struct IntAccessor;

impl ValueAccessor for IntAccessor {
    fn type_code(&self) -> TypeCode {
        TypeCode::Integer
    }

    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()> {
        null_guard!(self, stmt, pos, value);
        let v = value.as_i64().ok_or_else(|| mismatch("INTEGER", value))?;
        stmt.bind_i64(pos, v)
    }

    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value> {
        match rows.get_i64(pos)? {
            None => Ok(Value::Null),
            Some(v) => {
                let v = i32::try_from(v).map_err(|_| {
                    Error::Type(TypeError {
                        expected: "INTEGER",
                        actual: format!("value {} out of i32 range", v),
                        column: None,
                    })
                })?;
                Ok(Value::Int(v))
            }
        }
    }
}

/// BIGINT columns.
pub struct BigIntAccessor;

impl ValueAccessor for BigIntAccessor {
    fn type_code(&self) -> TypeCode {
        TypeCode::BigInt
    }

    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()> {
        null_guard!(self, stmt, pos, value);
        let v = value.as_i64().ok_or_else(|| mismatch("BIGINT", value))?;
        stmt.bind_i64(pos, v)
    }

    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value> {
        Ok(rows.get_i64(pos)?.map_or(Value::Null, Value::BigInt))
    }
}

/// DOUBLE PRECISION columns.
pub struct DoubleAccessor;

impl ValueAccessor for DoubleAccessor {
    fn type_code(&self) -> TypeCode {
        TypeCode::Double
    }

    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()> {
        null_guard!(self, stmt, pos, value);
        let v = value.as_f64().ok_or_else(|| mismatch("DOUBLE", value))?;
        stmt.bind_f64(pos, v)
    }

    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value> {
        Ok(rows.get_f64(pos)?.map_or(Value::Null, Value::Double))
    }
}

/// DECIMAL columns, carried as their exact string form.
pub struct DecimalAccessor;

impl ValueAccessor for DecimalAccessor {
    fn type_code(&self) -> TypeCode {
        TypeCode::Decimal
    }

    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()> {
        null_guard!(self, stmt, pos, value);
        match value {
            Value::Decimal(s) | Value::Text(s) => stmt.bind_text(pos, s),
            Value::Int(v) => stmt.bind_text(pos, &v.to_string()),
            Value::BigInt(v) => stmt.bind_text(pos, &v.to_string()),
            _ => Err(mismatch("DECIMAL", value)),
        }
    }

    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value> {
        Ok(rows.get_text(pos)?.map_or(Value::Null, Value::Decimal))
    }
}

/// TEXT columns.
pub struct TextAccessor;

impl ValueAccessor for TextAccessor {
    fn type_code(&self) -> TypeCode {
        TypeCode::Text
    }

    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()> {
        null_guard!(self, stmt, pos, value);
        let v = value.as_str().ok_or_else(|| mismatch("TEXT", value))?;
        stmt.bind_text(pos, v)
    }

    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value> {
        Ok(rows.get_text(pos)?.map_or(Value::Null, Value::Text))
    }
}

/// BLOB columns.
pub struct BlobAccessor;

impl ValueAccessor for BlobAccessor {
    fn type_code(&self) -> TypeCode {
        TypeCode::Blob
    }

    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()> {
        null_guard!(self, stmt, pos, value);
        let v = value.as_bytes().ok_or_else(|| mismatch("BLOB", value))?;
        stmt.bind_bytes(pos, v)
    }

    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value> {
        Ok(rows.get_bytes(pos)?.map_or(Value::Null, Value::Bytes))
    }
}

/// DATE columns, carried as days since epoch.
pub struct DateAccessor;

impl ValueAccessor for DateAccessor {
    fn type_code(&self) -> TypeCode {
        TypeCode::Date
    }

    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()> {
        null_guard!(self, stmt, pos, value);
        match value {
            Value::Date(d) => stmt.bind_i64(pos, i64::from(*d)),
            Value::Int(d) => stmt.bind_i64(pos, i64::from(*d)),
            _ => Err(mismatch("DATE", value)),
        }
    }

    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value> {
        match rows.get_i64(pos)? {
            None => Ok(Value::Null),
            Some(v) => {
                let v = i32::try_from(v).map_err(|_| {
                    Error::Type(TypeError {
                        expected: "DATE",
                        actual: format!("value {} out of range", v),
                        column: None,
                    })
                })?;
                Ok(Value::Date(v))
            }
        }
    }
}

/// TIME columns, carried as microseconds since midnight.
pub struct TimeAccessor;

impl ValueAccessor for TimeAccessor {
    fn type_code(&self) -> TypeCode {
        TypeCode::Time
    }

    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()> {
        null_guard!(self, stmt, pos, value);
        match value {
            Value::Time(t) => stmt.bind_i64(pos, *t),
            Value::BigInt(t) => stmt.bind_i64(pos, *t),
            _ => Err(mismatch("TIME", value)),
        }
    }

    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value> {
        Ok(rows.get_i64(pos)?.map_or(Value::Null, Value::Time))
    }
}

/// TIMESTAMP columns, carried as microseconds since epoch.
pub struct TimestampAccessor;

impl ValueAccessor for TimestampAccessor {
    fn type_code(&self) -> TypeCode {
        TypeCode::Timestamp
    }

    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()> {
        null_guard!(self, stmt, pos, value);
        match value {
            Value::Timestamp(t) => stmt.bind_i64(pos, *t),
            Value::BigInt(t) => stmt.bind_i64(pos, *t),
            _ => Err(mismatch("TIMESTAMP", value)),
        }
    }

    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value> {
        Ok(rows.get_i64(pos)?.map_or(Value::Null, Value::Timestamp))
    }
}

/// UUID columns, carried as 16 raw bytes.
pub struct UuidAccessor;

impl ValueAccessor for UuidAccessor {
    fn type_code(&self) -> TypeCode {
        TypeCode::Uuid
    }

    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()> {
        null_guard!(self, stmt, pos, value);
        match value {
            Value::Uuid(u) => stmt.bind_bytes(pos, u),
            Value::Bytes(b) if b.len() == 16 => stmt.bind_bytes(pos, b),
            _ => Err(mismatch("UUID", value)),
        }
    }

    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value> {
        match rows.get_bytes(pos)? {
            None => Ok(Value::Null),
            Some(b) => {
                let arr: [u8; 16] = b.as_slice().try_into().map_err(|_| {
                    Error::Type(TypeError {
                        expected: "UUID (16 bytes)",
                        actual: format!("{} bytes", b.len()),
                        column: None,
                    })
                })?;
                Ok(Value::Uuid(arr))
            }
        }
    }
}

/// JSON columns, carried as parsed `serde_json::Value`.
pub struct JsonAccessor;

impl ValueAccessor for JsonAccessor {
    fn type_code(&self) -> TypeCode {
        TypeCode::Json
    }

    fn bind(&self, stmt: &mut dyn Statement, pos: usize, value: &Value) -> Result<()> {
        null_guard!(self, stmt, pos, value);
        match value {
            Value::Json(j) => stmt.bind_text(pos, &j.to_string()),
            Value::Text(s) => stmt.bind_text(pos, s),
            _ => Err(mismatch("JSON", value)),
        }
    }

    fn read(&self, rows: &dyn Rows, pos: usize) -> Result<Value> {
        match rows.get_text(pos)? {
            None => Ok(Value::Null),
            Some(s) => {
                let j = serde_json::from_str(&s).map_err(|e| {
                    Error::Type(TypeError {
                        expected: "valid JSON",
                        actual: format!("invalid JSON: {}", e),
                        column: None,
                    })
                })?;
                Ok(Value::Json(j))
            }
        }
    }
}

/// Registry mapping every [`TypeCode`] to its accessor.
pub struct AccessorRegistry {
    accessors: HashMap<TypeCode, Arc<dyn ValueAccessor>>,
}

impl std::fmt::Debug for AccessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessorRegistry")
            .field("type_codes", &self.accessors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AccessorRegistry {
    /// Build a registry from an explicit accessor set.
    ///
    /// Fails with `UnsupportedType` naming the first missing code if the set
    /// is not total over [`TypeCode::ALL`].
    pub fn new(accessors: Vec<Arc<dyn ValueAccessor>>) -> Result<Self> {
        let accessors: HashMap<TypeCode, Arc<dyn ValueAccessor>> = accessors
            .into_iter()
            .map(|a| (a.type_code(), a))
            .collect();
        for code in TypeCode::ALL {
            if !accessors.contains_key(code) {
                return Err(Error::UnsupportedType { code: *code });
            }
        }
        Ok(Self { accessors })
    }

    /// The standard registry covering every type code.
    pub fn standard() -> Arc<Self> {
        let accessors: Vec<Arc<dyn ValueAccessor>> = vec![
            Arc::new(BoolAccessor),
            Arc::new(IntAccessor),
            Arc::new(BigIntAccessor),
            Arc::new(DoubleAccessor),
            Arc::new(DecimalAccessor),
            Arc::new(TextAccessor),
            Arc::new(BlobAccessor),
            Arc::new(DateAccessor),
            Arc::new(TimeAccessor),
            Arc::new(TimestampAccessor),
            Arc::new(UuidAccessor),
            Arc::new(JsonAccessor),
        ];
        let accessors = accessors.into_iter().map(|a| (a.type_code(), a)).collect();
        Arc::new(Self { accessors })
    }

    /// Look up the accessor for a type code. O(1).
    pub fn get(&self, code: TypeCode) -> Result<&dyn ValueAccessor> {
        self.accessors
            .get(&code)
            .map(AsRef::as_ref)
            .ok_or(Error::UnsupportedType { code })
    }
}
