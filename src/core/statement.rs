//! Prepared statements
//!
//! A [`Statement`] walks the engine's execution protocol: prepare, bind, step
//! through rows, then reset for reuse or finalize. It borrows the
//! [`Connection`] that compiled it, so the connection cannot be closed while
//! a statement is alive.

use super::connection::Connection;
use super::error::{DatabaseError, Result};
use super::status::StatusCode;
use super::value::Value;
use crate::backends::sqlite::{
    RawStmt, SQLITE_BLOB, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_NULL, SQLITE_TEXT,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::c_int;
use std::fmt;

/// Outcome of a single [`Statement::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A row is ready to be read
    Row,
    /// The statement ran to completion and was reset
    Done,
}

/// Storage class of a column value in the current row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Blob,
    Null,
}

impl ColumnType {
    fn from_code(code: c_int) -> Option<Self> {
        match code {
            SQLITE_INTEGER => Some(ColumnType::Integer),
            SQLITE_FLOAT => Some(ColumnType::Float),
            SQLITE_TEXT => Some(ColumnType::Text),
            SQLITE_BLOB => Some(ColumnType::Blob),
            SQLITE_NULL => Some(ColumnType::Null),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::Text => "TEXT",
            ColumnType::Blob => "BLOB",
            ColumnType::Null => "NULL",
        };
        write!(f, "{}", name)
    }
}

/// A compiled SQL statement bound to its connection
pub struct Statement<'conn> {
    conn: &'conn Connection,
    raw: Option<RawStmt>,
    finalized: bool,
    created_at: DateTime<Utc>,
}

impl<'conn> Statement<'conn> {
    /// Compile `sql` on `conn` and bind `values` starting at parameter 1.
    pub(crate) fn prepare(conn: &'conn Connection, sql: &str, values: &[Value]) -> Result<Self> {
        let raw = conn.raw()?.prepare(sql)?;
        let mut stmt = Self {
            conn,
            raw,
            finalized: false,
            created_at: Utc::now(),
        };
        if !values.is_empty() {
            stmt.bind(1, values)?;
        }
        Ok(stmt)
    }

    /// The live handle, `None` for a statement compiled from empty text.
    fn live(&self) -> Result<Option<&RawStmt>> {
        if self.finalized {
            return Err(DatabaseError::not_connected("statement has been finalized"));
        }
        Ok(self.raw.as_ref())
    }

    /// The live handle with `column` checked against the result width.
    fn column_handle(&self, column: usize) -> Result<(&RawStmt, c_int)> {
        let raw = self.live()?;
        match raw {
            Some(raw) if column < raw.column_count() => {
                let index = c_int::try_from(column).map_err(|_| DatabaseError::from(StatusCode::Range))?;
                Ok((raw, index))
            }
            _ => Err(DatabaseError::engine(
                StatusCode::Range,
                format!("column index {column} out of range"),
            )),
        }
    }

    /// The connection that compiled this statement
    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Bind `values` to consecutive parameters starting at `start` (1-based).
    ///
    /// Stops at the first failure; the error carries the failing index.
    pub fn bind(&mut self, start: usize, values: &[Value]) -> Result<()> {
        let raw = self.live()?;
        for (offset, value) in values.iter().enumerate() {
            let index = start + offset;
            let bound = match (raw, c_int::try_from(index)) {
                (Some(raw), Ok(i)) => value.bind(raw, i),
                _ => Err(StatusCode::Range.into()),
            };
            bound.map_err(|source| DatabaseError::Bind {
                index,
                source: Box::new(source),
            })?;
        }
        Ok(())
    }

    /// Advance to the next row.
    ///
    /// On `Done` the statement is reset so it can run again.
    pub fn step(&mut self) -> Result<StepResult> {
        let Some(raw) = self.live()? else {
            return Ok(StepResult::Done);
        };

        let rc = raw.step();
        match StatusCode::from_code(rc) {
            StatusCode::Row => Ok(StepResult::Row),
            StatusCode::Done => {
                raw.reset();
                Ok(StepResult::Done)
            }
            _ => Err(raw.error(rc)),
        }
    }

    /// Advance to the next row and hand it to `f`.
    ///
    /// An error returned by `f` is propagated unchanged.
    pub fn step_with<F>(&mut self, mut f: F) -> Result<StepResult>
    where
        F: FnMut(&Statement<'conn>, &[Value]) -> Result<()>,
    {
        let result = self.step()?;
        if result == StepResult::Row {
            let row = self.row()?;
            f(&*self, &row)?;
        }
        Ok(result)
    }

    /// Step until done, then finalize. Returns the number of rows produced.
    pub fn all(&mut self) -> Result<usize> {
        let mut rows = 0;
        while self.step()? == StepResult::Row {
            rows += 1;
        }
        self.finalize()?;
        Ok(rows)
    }

    /// As [`Statement::all`], handing each row to `f`.
    ///
    /// If `f` fails the statement is left unfinalized.
    pub fn all_with<F>(&mut self, mut f: F) -> Result<usize>
    where
        F: FnMut(&Statement<'conn>, &[Value]) -> Result<()>,
    {
        let mut rows = 0;
        while self.step_with(&mut f)? == StepResult::Row {
            rows += 1;
        }
        self.finalize()?;
        Ok(rows)
    }

    /// Materialize every column of the current row
    pub fn row(&self) -> Result<Vec<Value>> {
        (0..self.column_count()).map(|i| self.column(i)).collect()
    }

    /// Value of `column` (0-based) in the current row
    pub fn column(&self, column: usize) -> Result<Value> {
        let (raw, index) = self.column_handle(column)?;
        Ok(Value::read(raw, index))
    }

    /// Name of `column`
    pub fn column_name(&self, column: usize) -> Result<String> {
        let (raw, index) = self.column_handle(column)?;
        raw.column_name(index)
            .ok_or_else(|| DatabaseError::from(StatusCode::NoMem))
    }

    /// Storage class of `column` in the current row
    pub fn column_type(&self, column: usize) -> Result<ColumnType> {
        let (raw, index) = self.column_handle(column)?;
        let code = raw.column_type(index);
        ColumnType::from_code(code)
            .ok_or_else(|| DatabaseError::type_mismatch("storage class", &code.to_string()))
    }

    /// Size in bytes of `column` in the current row
    pub fn byte_count(&self, column: usize) -> Result<usize> {
        let (raw, index) = self.column_handle(column)?;
        Ok(raw.column_bytes(index))
    }

    /// Number of result columns; zero for statements that return no data
    pub fn column_count(&self) -> usize {
        match self.live() {
            Ok(Some(raw)) => raw.column_count(),
            _ => 0,
        }
    }

    /// Number of bind parameters
    pub fn parameter_count(&self) -> usize {
        match self.live() {
            Ok(Some(raw)) => raw.parameter_count(),
            _ => 0,
        }
    }

    /// Rewind to the first row, keeping bindings
    pub fn reset(&mut self) -> Result<()> {
        match self.live()? {
            Some(raw) => raw.check(raw.reset()),
            None => Ok(()),
        }
    }

    /// Set every parameter back to NULL
    pub fn clear_bindings(&mut self) -> Result<()> {
        match self.live()? {
            Some(raw) => raw.check(raw.clear_bindings()),
            None => Ok(()),
        }
    }

    /// Release the compiled statement. Further use returns a MISUSE error.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        match self.raw.take() {
            Some(raw) => {
                let rc = raw.finalize();
                if StatusCode::from_code(rc) == StatusCode::Ok {
                    Ok(())
                } else {
                    Err(self.conn.engine_error(rc))
                }
            }
            None => Ok(()),
        }
    }

    /// Check if the statement has been finalized
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// SQL text the statement was compiled from; empty once finalized
    pub fn sql_source(&self) -> String {
        self.raw.as_ref().map(RawStmt::sql).unwrap_or_default()
    }

    /// When the statement was prepared
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql_source())
            .field("finalized", &self.finalized)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Zero-based result column of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultColumn(pub usize);

impl ResultColumn {
    pub fn value(&self, stmt: &Statement<'_>) -> Result<Value> {
        stmt.column(self.0)
    }

    pub fn name(&self, stmt: &Statement<'_>) -> Result<String> {
        stmt.column_name(self.0)
    }

    pub fn column_type(&self, stmt: &Statement<'_>) -> Result<ColumnType> {
        stmt.column_type(self.0)
    }

    pub fn byte_count(&self, stmt: &Statement<'_>) -> Result<usize> {
        stmt.byte_count(self.0)
    }
}

/// One-based bind parameter of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryParameter(pub usize);

impl QueryParameter {
    pub fn bind(&self, stmt: &mut Statement<'_>, value: impl Into<Value>) -> Result<()> {
        stmt.bind(self.0, &[value.into()])
    }
}
