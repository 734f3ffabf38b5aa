//! Database value types
//!
//! This module defines the values bound to statement parameters and read back
//! from result columns, and how each one crosses the engine boundary.

use super::error::{DatabaseError, Result};
use crate::backends::sqlite::{
    RawStmt, SQLITE_BLOB, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_NULL, SQLITE_TEXT,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::c_int;
use std::fmt;
use std::sync::Arc;

/// A value that is stored as a serialized blob.
///
/// Implemented for every `Serialize` type, so any such value can be bound with
/// [`Value::opaque`]. The encoding is JSON, which [`Value::decode`] reverses.
pub trait OpaqueValue: fmt::Debug + Send + Sync {
    /// Serialize the value into blob bytes
    fn encode(&self) -> serde_json::Result<Vec<u8>>;
}

impl<T> OpaqueValue for T
where
    T: Serialize + fmt::Debug + Send + Sync,
{
    fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Value that can be bound to a parameter or read from a column
#[derive(Debug, Clone)]
pub enum Value {
    /// SQL NULL
    Null,
    /// 32-bit integer, bound with `sqlite3_bind_int`
    Int(i32),
    /// 64-bit integer
    Int64(i64),
    /// Double precision float
    Float(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Blob(Vec<u8>),
    /// Arbitrary serializable value, stored as a blob
    Opaque(Arc<dyn OpaqueValue>),
}

impl Value {
    /// Wrap a serializable value for blob storage
    pub fn opaque<T>(value: T) -> Self
    where
        T: Serialize + fmt::Debug + Send + Sync + 'static,
    {
        Value::Opaque(Arc::new(value))
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the value as an i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get the value as a string slice (zero-copy)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the value as bytes (zero-copy)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Decode a blob written from an [`OpaqueValue`].
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the value is not a blob, `Decode` if the bytes do not
    /// deserialize into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Value::Blob(bytes) => serde_json::from_slice(bytes).map_err(DatabaseError::Decode),
            other => Err(DatabaseError::type_mismatch("blob", other.type_name())),
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Int64(_) => "int64",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Bind this value to parameter `index` (1-based) of `stmt`.
    pub(crate) fn bind(&self, stmt: &RawStmt, index: c_int) -> Result<()> {
        let rc = match self {
            Value::Null => stmt.bind_null(index),
            Value::Int(v) => stmt.bind_int(index, *v),
            Value::Int64(v) => stmt.bind_int64(index, *v),
            Value::Float(v) => stmt.bind_double(index, *v),
            Value::Text(v) => stmt.bind_text(index, v),
            Value::Blob(v) => stmt.bind_blob(index, v),
            Value::Opaque(v) => {
                let bytes = v.encode().map_err(DatabaseError::Encoder)?;
                stmt.bind_blob(index, &bytes)
            }
        };
        stmt.check(rc)
    }

    /// Materialize `column` (0-based) of the current row.
    ///
    /// TEXT that is not valid UTF-8 comes back as a `Blob` of the exact
    /// stored bytes.
    ///
    /// # Panics
    ///
    /// If the engine reports a storage class outside the five it defines.
    pub(crate) fn read(stmt: &RawStmt, column: c_int) -> Value {
        match stmt.column_type(column) {
            SQLITE_NULL => Value::Null,
            SQLITE_INTEGER => Value::Int64(stmt.column_int64(column)),
            SQLITE_FLOAT => Value::Float(stmt.column_double(column)),
            SQLITE_TEXT => match String::from_utf8(stmt.column_text(column)) {
                Ok(text) => Value::Text(text),
                Err(e) => Value::Blob(e.into_bytes()),
            },
            SQLITE_BLOB => Value::Blob(stmt.column_blob(column)),
            other => panic!("engine reported unknown column type {other}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => match (a.encode(), b.encode()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(i32::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int64(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// Build a `&[Value]` parameter list from heterogeneous expressions.
///
/// ```
/// use rust_sqlite_driver::{params, Value};
///
/// let values = params![1, "a", 2.5, ()];
/// assert_eq!(values[1], Value::Text("a".into()));
/// ```
#[macro_export]
macro_rules! params {
    ($($val:expr),* $(,)?) => {
        &[$($crate::Value::from($val)),*][..]
    };
}
