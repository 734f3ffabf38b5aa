//! Table helper
//!
//! Thin wrapper naming a table and its column definition. Every call
//! re-issues SQL against the connection it is given.

use super::connection::Connection;
use super::error::{DatabaseError, Result};
use super::value::Value;
use serde::{Deserialize, Serialize};

/// A named table with its column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    /// Column definitions, e.g. `"id INTEGER PRIMARY KEY, name TEXT"`
    pub columns: String,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into(),
        }
    }

    fn quoted_name(&self) -> String {
        format!("\"{}\"", self.name.replace('"', "\"\""))
    }

    /// `CREATE TABLE name (columns)`
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&format!("CREATE TABLE {} ({})", self.quoted_name(), self.columns))
            .map(drop)
    }

    /// `DROP TABLE name`
    pub fn drop_table(&self, conn: &Connection) -> Result<()> {
        conn.execute(&format!("DROP TABLE {}", self.quoted_name()))
            .map(drop)
    }

    /// Number of rows currently in the table
    pub fn rows(&self, conn: &Connection) -> Result<i64> {
        let mut stmt = conn.prepare(&format!("SELECT COUNT(*) FROM {}", self.quoted_name()), &[])?;
        stmt.step()?;
        let count = stmt.column(0)?;
        stmt.finalize()?;
        match count {
            Value::Int64(n) => Ok(n),
            other => Err(DatabaseError::type_mismatch("integer", other.type_name())),
        }
    }
}
