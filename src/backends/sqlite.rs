//! SQLite engine boundary
//!
//! This is the only module that talks to the C library. Everything above it
//! works with the safe handle types defined here:
//!
//! - [`EngineGuard`]: reference-counted `sqlite3_initialize`/`sqlite3_shutdown`
//! - [`RawDb`]: an open `sqlite3*` connection handle
//! - [`RawStmt`]: a compiled `sqlite3_stmt*`
//! - [`RawBackup`]: an online backup cursor (`sqlite3_backup*`)
//!
//! The raw symbols come from `rusqlite::ffi` (the `libsqlite3-sys` bindings),
//! compiled from the bundled amalgamation by default.

use crate::core::error::{DatabaseError, Result};
use crate::core::status::StatusCode;
use parking_lot::Mutex;
use rusqlite::ffi;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::ptr::{self, NonNull};
use std::sync::Arc;

pub(crate) use ffi::{SQLITE_BLOB, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_NULL, SQLITE_TEXT};

/// Number of live engine users (sessions and open connections).
static ENGINE_USERS: Mutex<usize> = parking_lot::const_mutex(0);

/// Returns the version string of the linked SQLite library.
pub(crate) fn lib_version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a pointer to a static NUL-terminated string.
    unsafe { CStr::from_ptr(ffi::sqlite3_libversion()) }
        .to_str()
        .unwrap_or("unknown")
}

/// Returns `true` if the library was compiled with thread-safety support.
pub(crate) fn threadsafe() -> bool {
    // SAFETY: no preconditions.
    unsafe { ffi::sqlite3_threadsafe() != 0 }
}

/// Engine text for a result code, as reported by `sqlite3_errstr`.
fn errstr(rc: c_int) -> String {
    // SAFETY: sqlite3_errstr accepts any integer and returns a static string.
    let ptr = unsafe { ffi::sqlite3_errstr(rc) };
    if ptr.is_null() {
        StatusCode::from_code(rc).to_string()
    } else {
        // SAFETY: non-null pointers from sqlite3_errstr are static C strings.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}

/// Converts a possibly-null C string owned by SQLite into an owned `String`.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
unsafe fn owned_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

fn length(len: usize) -> Result<c_int> {
    c_int::try_from(len).map_err(|_| {
        DatabaseError::engine(StatusCode::TooBig, format!("{len} bytes exceed the engine limit"))
    })
}

/// A counted reference on the process-wide engine.
///
/// The first guard initializes the library; dropping the last one shuts it
/// down. Every [`RawDb`] owns a guard, so shutdown never races an open handle.
#[derive(Debug)]
pub(crate) struct EngineGuard {
    _private: (),
}

impl EngineGuard {
    pub(crate) fn acquire() -> Result<Self> {
        if !threadsafe() {
            return Err(DatabaseError::NotThreadSafe);
        }

        let mut users = ENGINE_USERS.lock();
        if *users == 0 {
            // SAFETY: serialized by ENGINE_USERS; no handles exist while users == 0.
            let rc = unsafe { ffi::sqlite3_initialize() };
            if rc != ffi::SQLITE_OK {
                return Err(DatabaseError::engine(StatusCode::from_code(rc), errstr(rc)));
            }
            tracing::debug!(version = lib_version(), "SQLite engine initialized");
        }
        *users += 1;

        Ok(Self { _private: () })
    }

    /// Current number of guards alive in the process.
    pub(crate) fn users() -> usize {
        *ENGINE_USERS.lock()
    }
}

impl Drop for EngineGuard {
    fn drop(&mut self) {
        let mut users = ENGINE_USERS.lock();
        *users = users.saturating_sub(1);
        if *users == 0 {
            // SAFETY: the last guard is gone, so every RawDb has been closed.
            let rc = unsafe { ffi::sqlite3_shutdown() };
            if rc != ffi::SQLITE_OK {
                tracing::warn!(code = rc, "SQLite engine shutdown reported an error");
            } else {
                tracing::debug!("SQLite engine shut down");
            }
        }
    }
}

/// An open `sqlite3*` handle, closed on drop.
///
/// `Send + Sync` because handles are only shared across threads by the backup
/// loop, which requires the connection to run in serialized (full mutex) mode.
pub(crate) struct RawDb {
    handle: NonNull<ffi::sqlite3>,
    _engine: EngineGuard,
}

// SAFETY: see the type documentation; cross-thread use is limited to
// serialized-mode connections.
unsafe impl Send for RawDb {}
// SAFETY: as above.
unsafe impl Sync for RawDb {}

impl RawDb {
    /// Opens a database with `sqlite3_open_v2`.
    pub(crate) fn open(path: &str, flags: c_int) -> Result<Self> {
        let engine = EngineGuard::acquire()?;
        let c_path = CString::new(path).map_err(|_| {
            DatabaseError::engine(StatusCode::CantOpen, format!("path contains a NUL byte: {path:?}"))
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: c_path is a valid C string and db a valid out-pointer.
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let message = if db.is_null() {
                errstr(rc)
            } else {
                // SAFETY: db is a (failed) handle that must still be closed.
                let message = unsafe { owned_string(ffi::sqlite3_errmsg(db)) };
                unsafe { ffi::sqlite3_close(db) };
                message.unwrap_or_else(|| errstr(rc))
            };
            return Err(DatabaseError::engine(StatusCode::from_code(rc), message));
        }

        let handle = NonNull::new(db).ok_or_else(|| {
            DatabaseError::engine(StatusCode::CantOpen, "engine returned no handle")
        })?;

        Ok(Self {
            handle,
            _engine: engine,
        })
    }

    fn as_ptr(&self) -> *mut ffi::sqlite3 {
        self.handle.as_ptr()
    }

    /// The engine's error-code register for this connection.
    pub(crate) fn errcode(&self) -> c_int {
        // SAFETY: handle is open for the lifetime of self.
        unsafe { ffi::sqlite3_errcode(self.as_ptr()) }
    }

    /// The engine's error message for this connection.
    pub(crate) fn errmsg(&self) -> String {
        // SAFETY: handle is open; the message is copied before any other call.
        unsafe { owned_string(ffi::sqlite3_errmsg(self.as_ptr())) }.unwrap_or_default()
    }

    /// Builds a [`DatabaseError`] for `rc`, using the connection's message.
    pub(crate) fn error(&self, rc: c_int) -> DatabaseError {
        let message = self.errmsg();
        let message = if message.is_empty() || message == "not an error" {
            errstr(rc)
        } else {
            message
        };
        DatabaseError::engine(StatusCode::from_code(rc), message)
    }

    /// Returns `Ok(())` for `SQLITE_OK`, an engine error otherwise.
    pub(crate) fn check(&self, rc: c_int) -> Result<()> {
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(self.error(rc))
        }
    }

    pub(crate) fn last_insert_rowid(&self) -> i64 {
        // SAFETY: handle is open.
        unsafe { ffi::sqlite3_last_insert_rowid(self.as_ptr()) }
    }

    pub(crate) fn changes(&self) -> u64 {
        // SAFETY: handle is open.
        u64::try_from(unsafe { ffi::sqlite3_changes(self.as_ptr()) }).unwrap_or(0)
    }

    pub(crate) fn total_changes(&self) -> u64 {
        // SAFETY: handle is open.
        u64::try_from(unsafe { ffi::sqlite3_total_changes(self.as_ptr()) }).unwrap_or(0)
    }

    /// Compiles the first statement in `sql`.
    ///
    /// Returns `Ok(None)` when the text holds no statement (empty or comment).
    pub(crate) fn prepare(&self, sql: &str) -> Result<Option<RawStmt>> {
        let len = length(sql.len())?;
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: sql points to len readable bytes; no NUL terminator is
        // needed when nByte is non-negative.
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                self.as_ptr(),
                sql.as_ptr().cast::<c_char>(),
                len,
                &mut stmt,
                ptr::null_mut(),
            )
        };
        self.check(rc)?;
        Ok(NonNull::new(stmt).map(|handle| RawStmt { handle }))
    }
}

impl Drop for RawDb {
    fn drop(&mut self) {
        // SAFETY: statements borrow the owning Connection and every RawBackup
        // holds an Arc to this handle, so nothing is left open on it here.
        let rc = unsafe { ffi::sqlite3_close(self.as_ptr()) };
        if rc != ffi::SQLITE_OK {
            tracing::warn!(code = rc, "sqlite3_close failed");
        }
    }
}

impl std::fmt::Debug for RawDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDb").field("handle", &self.handle).finish()
    }
}

/// A compiled statement handle, finalized on drop.
///
/// Neither `Send` nor `Sync`: statements stay on the thread that prepared them.
pub(crate) struct RawStmt {
    handle: NonNull<ffi::sqlite3_stmt>,
}

impl RawStmt {
    fn as_ptr(&self) -> *mut ffi::sqlite3_stmt {
        self.handle.as_ptr()
    }

    /// Builds an error for `rc` using the owning connection's message.
    pub(crate) fn error(&self, rc: c_int) -> DatabaseError {
        // SAFETY: the statement is live, so its connection is open.
        let db = unsafe { ffi::sqlite3_db_handle(self.as_ptr()) };
        let message = if db.is_null() {
            None
        } else {
            // SAFETY: db is the open connection owning this statement.
            unsafe { owned_string(ffi::sqlite3_errmsg(db)) }
        };
        let message = match message {
            Some(m) if !m.is_empty() && m != "not an error" => m,
            _ => errstr(rc),
        };
        DatabaseError::engine(StatusCode::from_code(rc), message)
    }

    pub(crate) fn check(&self, rc: c_int) -> Result<()> {
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(self.error(rc))
        }
    }

    pub(crate) fn step(&self) -> c_int {
        // SAFETY: statement is live.
        unsafe { ffi::sqlite3_step(self.as_ptr()) }
    }

    pub(crate) fn reset(&self) -> c_int {
        // SAFETY: statement is live.
        unsafe { ffi::sqlite3_reset(self.as_ptr()) }
    }

    pub(crate) fn clear_bindings(&self) -> c_int {
        // SAFETY: statement is live.
        unsafe { ffi::sqlite3_clear_bindings(self.as_ptr()) }
    }

    /// Finalizes the statement, returning the engine's result code.
    pub(crate) fn finalize(self) -> c_int {
        let handle = self.as_ptr();
        std::mem::forget(self);
        // SAFETY: handle is live and, after forget, finalized exactly once.
        unsafe { ffi::sqlite3_finalize(handle) }
    }

    pub(crate) fn sql(&self) -> String {
        // SAFETY: the returned text is owned by the live statement.
        unsafe { owned_string(ffi::sqlite3_sql(self.as_ptr())) }.unwrap_or_default()
    }

    pub(crate) fn parameter_count(&self) -> usize {
        // SAFETY: statement is live.
        usize::try_from(unsafe { ffi::sqlite3_bind_parameter_count(self.as_ptr()) }).unwrap_or(0)
    }

    pub(crate) fn column_count(&self) -> usize {
        // SAFETY: statement is live.
        usize::try_from(unsafe { ffi::sqlite3_column_count(self.as_ptr()) }).unwrap_or(0)
    }

    pub(crate) fn bind_null(&self, index: c_int) -> c_int {
        // SAFETY: statement is live; out-of-range indexes return SQLITE_RANGE.
        unsafe { ffi::sqlite3_bind_null(self.as_ptr(), index) }
    }

    pub(crate) fn bind_int(&self, index: c_int, value: i32) -> c_int {
        // SAFETY: as bind_null.
        unsafe { ffi::sqlite3_bind_int(self.as_ptr(), index, value) }
    }

    pub(crate) fn bind_int64(&self, index: c_int, value: i64) -> c_int {
        // SAFETY: as bind_null.
        unsafe { ffi::sqlite3_bind_int64(self.as_ptr(), index, value) }
    }

    pub(crate) fn bind_double(&self, index: c_int, value: f64) -> c_int {
        // SAFETY: as bind_null.
        unsafe { ffi::sqlite3_bind_double(self.as_ptr(), index, value) }
    }

    /// Binds text; the engine takes its own copy (`SQLITE_TRANSIENT`).
    pub(crate) fn bind_text(&self, index: c_int, value: &str) -> c_int {
        let Ok(len) = c_int::try_from(value.len()) else {
            return ffi::SQLITE_TOOBIG;
        };
        // SAFETY: value points to len bytes; SQLITE_TRANSIENT copies them
        // before the call returns.
        unsafe {
            ffi::sqlite3_bind_text(
                self.as_ptr(),
                index,
                value.as_ptr().cast::<c_char>(),
                len,
                ffi::SQLITE_TRANSIENT(),
            )
        }
    }

    /// Binds a blob; the engine takes its own copy (`SQLITE_TRANSIENT`).
    pub(crate) fn bind_blob(&self, index: c_int, value: &[u8]) -> c_int {
        let Ok(len) = c_int::try_from(value.len()) else {
            return ffi::SQLITE_TOOBIG;
        };
        // SAFETY: as bind_text. An empty slice still has a non-null pointer,
        // so the engine stores a zero-length blob rather than NULL.
        unsafe {
            ffi::sqlite3_bind_blob(
                self.as_ptr(),
                index,
                value.as_ptr().cast::<c_void>(),
                len,
                ffi::SQLITE_TRANSIENT(),
            )
        }
    }

    pub(crate) fn column_name(&self, column: c_int) -> Option<String> {
        // SAFETY: the name is copied before the statement can change.
        unsafe { owned_string(ffi::sqlite3_column_name(self.as_ptr(), column)) }
    }

    pub(crate) fn column_type(&self, column: c_int) -> c_int {
        // SAFETY: statement is live.
        unsafe { ffi::sqlite3_column_type(self.as_ptr(), column) }
    }

    pub(crate) fn column_bytes(&self, column: c_int) -> usize {
        // SAFETY: statement is live.
        usize::try_from(unsafe { ffi::sqlite3_column_bytes(self.as_ptr(), column) }).unwrap_or(0)
    }

    pub(crate) fn column_int64(&self, column: c_int) -> i64 {
        // SAFETY: statement is live.
        unsafe { ffi::sqlite3_column_int64(self.as_ptr(), column) }
    }

    pub(crate) fn column_double(&self, column: c_int) -> f64 {
        // SAFETY: statement is live.
        unsafe { ffi::sqlite3_column_double(self.as_ptr(), column) }
    }

    /// Text of `column`, exactly `sqlite3_column_bytes` long.
    pub(crate) fn column_text(&self, column: c_int) -> Vec<u8> {
        // SAFETY: the text pointer is fetched before the byte count, as the
        // engine requires, and copied before any further call.
        let ptr = unsafe { ffi::sqlite3_column_text(self.as_ptr(), column) };
        let len = self.column_bytes(column);
        if ptr.is_null() || len == 0 {
            return Vec::new();
        }
        // SAFETY: ptr points to len readable bytes owned by the statement.
        unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec()
    }

    /// Blob of `column`, exactly `sqlite3_column_bytes` long.
    pub(crate) fn column_blob(&self, column: c_int) -> Vec<u8> {
        // SAFETY: as column_text.
        let ptr = unsafe { ffi::sqlite3_column_blob(self.as_ptr(), column) };
        let len = self.column_bytes(column);
        if ptr.is_null() || len == 0 {
            return Vec::new();
        }
        // SAFETY: ptr points to len readable bytes owned by the statement.
        unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len) }.to_vec()
    }
}

impl Drop for RawStmt {
    fn drop(&mut self) {
        // SAFETY: finalize() forgets self, so this runs at most once per handle.
        unsafe { ffi::sqlite3_finalize(self.as_ptr()) };
    }
}

/// An online backup cursor between two open connections.
///
/// Holds both connection handles so neither can be closed underneath the
/// cursor. Finished on drop if [`RawBackup::finish`] was never called.
pub(crate) struct RawBackup {
    handle: Option<NonNull<ffi::sqlite3_backup>>,
    dest: Arc<RawDb>,
    _source: Arc<RawDb>,
}

// SAFETY: only the background copy moves a cursor to another thread. It
// refuses NOMUTEX sources and opens its own destination in serialized mode;
// the public cursor borrows its connections and stays on their thread.
unsafe impl Send for RawBackup {}

impl RawBackup {
    /// `sqlite3_backup_init`; on failure the error is read from `dest`.
    pub(crate) fn init(
        dest: &Arc<RawDb>,
        dest_name: &str,
        source: &Arc<RawDb>,
        source_name: &str,
    ) -> Result<Self> {
        let name = |n: &str| {
            CString::new(n).map_err(|_| {
                DatabaseError::engine(StatusCode::Error, format!("database name contains a NUL byte: {n:?}"))
            })
        };
        let c_dest = name(dest_name)?;
        let c_source = name(source_name)?;

        // SAFETY: both handles are open and both names valid C strings.
        let handle = unsafe {
            ffi::sqlite3_backup_init(
                dest.as_ptr(),
                c_dest.as_ptr(),
                source.as_ptr(),
                c_source.as_ptr(),
            )
        };

        match NonNull::new(handle) {
            Some(handle) => Ok(Self {
                handle: Some(handle),
                dest: Arc::clone(dest),
                _source: Arc::clone(source),
            }),
            None => Err(dest.error(dest.errcode())),
        }
    }

    pub(crate) fn step(&mut self, pages: c_int) -> c_int {
        match self.handle {
            // SAFETY: the cursor has not been finished.
            Some(handle) => unsafe { ffi::sqlite3_backup_step(handle.as_ptr(), pages) },
            None => ffi::SQLITE_MISUSE,
        }
    }

    pub(crate) fn remaining(&self) -> c_int {
        match self.handle {
            // SAFETY: the cursor has not been finished.
            Some(handle) => unsafe { ffi::sqlite3_backup_remaining(handle.as_ptr()) },
            None => 0,
        }
    }

    pub(crate) fn page_count(&self) -> c_int {
        match self.handle {
            // SAFETY: the cursor has not been finished.
            Some(handle) => unsafe { ffi::sqlite3_backup_pagecount(handle.as_ptr()) },
            None => 0,
        }
    }

    /// Releases the cursor. Later calls return `SQLITE_OK` without effect.
    pub(crate) fn finish(&mut self) -> c_int {
        match self.handle.take() {
            // SAFETY: take() guarantees each cursor is finished once.
            Some(handle) => unsafe { ffi::sqlite3_backup_finish(handle.as_ptr()) },
            None => ffi::SQLITE_OK,
        }
    }

    /// Error for `rc`, with the destination connection's message.
    pub(crate) fn error(&self, rc: c_int) -> DatabaseError {
        self.dest.error(rc)
    }
}

impl Drop for RawBackup {
    fn drop(&mut self) {
        let rc = self.finish();
        if rc != ffi::SQLITE_OK && rc != ffi::SQLITE_DONE {
            tracing::debug!(code = rc, "Backup cursor finished on drop with an error");
        }
    }
}
