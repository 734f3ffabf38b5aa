//! Database connections
//!
//! A [`Connection`] owns one engine handle. It compiles statements, runs
//! transactions and savepoints, and copies whole databases to and from other
//! connections.

use super::backup::{self, Backup, BackupParameters, Reporter};
use super::error::{DatabaseError, Result};
use super::flags::OpenFlags;
use super::statement::Statement;
use super::status::StatusCode;
use super::value::Value;
use crate::backends::sqlite::RawDb;
use std::cell::RefCell;
use std::ffi::c_int;
use std::fmt;
use std::sync::Arc;

/// Filename of a private in-memory database
pub const MEMORY: &str = ":memory:";

/// Identifier of a savepoint.
///
/// Built from strings, bytes or integers. Validation happens when the id is
/// used: it must be non-empty UTF-8 without NUL bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SavepointId(Vec<u8>);

impl SavepointId {
    /// Build an id from any displayable value
    pub fn display(value: &impl fmt::Display) -> Self {
        SavepointId(value.to_string().into_bytes())
    }

    /// The raw identifier bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn name(&self) -> Result<&str> {
        if self.0.is_empty() {
            return Err(DatabaseError::savepoint("identifier is empty"));
        }
        if self.0.contains(&0) {
            return Err(DatabaseError::savepoint("identifier contains a NUL byte"));
        }
        std::str::from_utf8(&self.0)
            .map_err(|_| DatabaseError::savepoint("identifier is not valid UTF-8"))
    }

    /// The id rendered as a quoted SQL identifier.
    fn quoted(&self) -> Result<String> {
        let name = self.name()?;
        Ok(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

impl From<&str> for SavepointId {
    fn from(v: &str) -> Self {
        SavepointId(v.as_bytes().to_vec())
    }
}

impl From<String> for SavepointId {
    fn from(v: String) -> Self {
        SavepointId(v.into_bytes())
    }
}

impl From<&String> for SavepointId {
    fn from(v: &String) -> Self {
        SavepointId(v.as_bytes().to_vec())
    }
}

impl From<&[u8]> for SavepointId {
    fn from(v: &[u8]) -> Self {
        SavepointId(v.to_vec())
    }
}

impl From<Vec<u8>> for SavepointId {
    fn from(v: Vec<u8>) -> Self {
        SavepointId(v)
    }
}

macro_rules! savepoint_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for SavepointId {
                fn from(v: $ty) -> Self {
                    SavepointId::display(&v)
                }
            }
        )*
    };
}

savepoint_from_integer!(i32, i64, u32, u64, usize);

impl fmt::Display for SavepointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// A connection to one SQLite database.
///
/// `Send` but not `Sync`: a connection moves between threads but is used by
/// one thread at a time.
#[derive(Debug)]
pub struct Connection {
    filename: String,
    flags: OpenFlags,
    db: Option<Arc<RawDb>>,
    savepoints: RefCell<Vec<String>>,
}

impl Connection {
    /// Create an unopened connection to `filename`
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            flags: OpenFlags::empty(),
            db: None,
            savepoints: RefCell::new(Vec::new()),
        }
    }

    /// Create an unopened connection to a private in-memory database
    pub fn transient() -> Self {
        Self::new(MEMORY)
    }

    /// Open `filename` with the default flags
    pub fn open(filename: impl Into<String>) -> Result<Self> {
        Self::open_with_flags(filename, OpenFlags::default())
    }

    /// Open `filename` with `flags`
    pub fn open_with_flags(filename: impl Into<String>, flags: OpenFlags) -> Result<Self> {
        let mut conn = Self::new(filename);
        conn.connect(flags)?;
        Ok(conn)
    }

    /// Open the underlying database. Empty `flags` select the defaults.
    ///
    /// # Errors
    ///
    /// `CANTOPEN` if the connection is already open or the engine refuses the
    /// file.
    pub fn connect(&mut self, flags: OpenFlags) -> Result<()> {
        if self.db.is_some() {
            return Err(DatabaseError::engine(
                StatusCode::CantOpen,
                format!("connection to {} is already open", self.filename),
            ));
        }

        let flags = if flags.is_empty() { OpenFlags::default() } else { flags };
        let db = RawDb::open(&self.filename, flags.bits())?;
        self.db = Some(Arc::new(db));
        self.flags = flags;

        tracing::debug!(filename = %self.filename, flags = %flags, "Connection opened");
        Ok(())
    }

    /// Close the connection. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.db.take().is_some() {
            self.savepoints.borrow_mut().clear();
            tracing::debug!(filename = %self.filename, "Connection closed");
        }
    }

    /// Check if the connection is open
    pub fn is_connected(&self) -> bool {
        self.db.is_some()
    }

    /// The filename this connection was created for
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Flags the connection was opened with; empty while unopened
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub(crate) fn raw(&self) -> Result<&Arc<RawDb>> {
        self.db
            .as_ref()
            .ok_or_else(|| DatabaseError::not_connected(format!("{} is not open", self.filename)))
    }

    /// Error for `rc` carrying this connection's message, if it is open.
    pub(crate) fn engine_error(&self, rc: c_int) -> DatabaseError {
        match &self.db {
            Some(db) => db.error(rc),
            None => StatusCode::from_code(rc).into(),
        }
    }

    /// Rowid of the most recent successful insert; zero if none
    pub fn last_insert_rowid(&self) -> i64 {
        self.db.as_ref().map_or(0, |db| db.last_insert_rowid())
    }

    /// Rows changed by the most recent statement
    pub fn changes(&self) -> u64 {
        self.db.as_ref().map_or(0, |db| db.changes())
    }

    /// Rows changed since the connection was opened
    pub fn total_changes(&self) -> u64 {
        self.db.as_ref().map_or(0, |db| db.total_changes())
    }

    /// Status of the most recent engine call; `Misuse` when closed
    pub fn error(&self) -> StatusCode {
        match &self.db {
            Some(db) => StatusCode::from_code(db.errcode()),
            None => StatusCode::Misuse,
        }
    }

    /// Engine message for the most recent engine call
    pub fn error_message(&self) -> String {
        match &self.db {
            Some(db) => db.errmsg(),
            None => format!("{} is not open", self.filename),
        }
    }

    /// Compile `sql` and bind `values` to its parameters starting at 1.
    pub fn prepare(&self, sql: &str, values: &[Value]) -> Result<Statement<'_>> {
        Statement::prepare(self, sql, values)
    }

    /// Run `sql` to completion and return the number of rows it produced.
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.prepare(sql, &[])?.all()
    }

    /// Run `sql` to completion, handing each row to `f`.
    pub fn execute_with<F>(&self, sql: &str, f: F) -> Result<usize>
    where
        F: FnMut(&Statement<'_>, &[Value]) -> Result<()>,
    {
        self.prepare(sql, &[])?.all_with(f)
    }

    /// Start a deferred transaction
    pub fn begin(&self) -> Result<()> {
        self.execute("BEGIN TRANSACTION").map(drop)
    }

    /// Commit the open transaction and forget its savepoints
    pub fn commit(&self) -> Result<()> {
        self.execute("COMMIT TRANSACTION")?;
        self.savepoints.borrow_mut().clear();
        Ok(())
    }

    /// Roll back the open transaction and forget its savepoints
    pub fn rollback(&self) -> Result<()> {
        self.execute("ROLLBACK TRANSACTION")?;
        self.savepoints.borrow_mut().clear();
        Ok(())
    }

    /// Open a savepoint named `id`
    pub fn mark(&self, id: impl Into<SavepointId>) -> Result<()> {
        let id = id.into();
        self.execute(&format!("SAVEPOINT {}", id.quoted()?))?;
        self.savepoints.borrow_mut().push(id.name()?.to_string());
        Ok(())
    }

    /// Release savepoint `id`, folding its changes into the enclosing
    /// transaction. Savepoints nested inside it are released too.
    pub fn merge_steps(&self, id: impl Into<SavepointId>) -> Result<()> {
        let id = id.into();
        self.execute(&format!("RELEASE SAVEPOINT {}", id.quoted()?))?;

        let name = id.name()?;
        let mut savepoints = self.savepoints.borrow_mut();
        if let Some(pos) = savepoints.iter().rposition(|s| s == name) {
            savepoints.truncate(pos);
        }
        Ok(())
    }

    /// Undo everything since savepoint `id` was marked. The savepoint itself
    /// stays open.
    pub fn release(&self, id: impl Into<SavepointId>) -> Result<()> {
        let id = id.into();
        self.execute(&format!("ROLLBACK TRANSACTION TO SAVEPOINT {}", id.quoted()?))?;

        let name = id.name()?;
        let mut savepoints = self.savepoints.borrow_mut();
        if let Some(pos) = savepoints.iter().rposition(|s| s == name) {
            savepoints.truncate(pos + 1);
        }
        Ok(())
    }

    /// Active savepoints, outermost first
    pub fn savepoints(&self) -> Vec<String> {
        self.savepoints.borrow().clone()
    }

    /// Overwrite database `dbname` (default `"main"`) with the contents of
    /// the same database in `source`.
    pub fn load(&self, source: &Connection, dbname: Option<&str>) -> Result<()> {
        let name = dbname.unwrap_or(backup::MAIN);
        Backup::new(self, name, source, name)?.full()
    }

    /// Copy database `dbname` (default `"main"`) into `target`.
    pub fn save(&self, target: &Connection, dbname: Option<&str>) -> Result<()> {
        target.load(self, dbname)
    }

    /// Start an online backup of this connection's main database into
    /// `params.target`, stepping on a background thread.
    ///
    /// Progress is delivered through the returned [`Reporter`], which ends
    /// after the terminal report.
    pub fn backup(&self, params: BackupParameters) -> Result<Reporter> {
        backup::start(self, params)
    }
}
