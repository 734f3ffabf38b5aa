//! Engine result codes
//!
//! Every call across the engine boundary yields a numeric result code. This
//! module maps those codes to a typed [`StatusCode`] with a stable name and a
//! human-readable description.

use super::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result code reported by the engine or by the driver itself.
///
/// `Ok` is the only "no error" value. `Row` and `Done` are informational
/// continuation signals of statement stepping, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// Successful result
    Ok,
    /// Generic error
    Error,
    /// Internal logic error in the engine
    Internal,
    /// Access permission denied
    Perm,
    /// Callback routine requested an abort
    Abort,
    /// The database file is locked
    Busy,
    /// A table in the database is locked
    Locked,
    /// A memory allocation failed
    NoMem,
    /// Attempt to write a readonly database
    ReadOnly,
    /// Operation interrupted
    Interrupt,
    /// Disk I/O error
    IoErr,
    /// The database disk image is malformed
    Corrupt,
    /// Unknown opcode or table not found
    NotFound,
    /// Insertion failed because the database is full
    Full,
    /// Unable to open the database file
    CantOpen,
    /// Database lock protocol error
    Protocol,
    /// Internal use only
    Empty,
    /// The database schema changed
    Schema,
    /// String or blob exceeds size limit
    TooBig,
    /// Abort due to constraint violation
    Constraint,
    /// Data type mismatch
    Mismatch,
    /// Library used incorrectly
    Misuse,
    /// Uses OS features not supported on host
    NoLfs,
    /// Authorization denied
    Auth,
    /// Not used
    Format,
    /// Bind parameter index out of range
    Range,
    /// File opened that is not a database file
    NotDb,
    /// `step` has another row ready
    Row,
    /// `step` has finished executing
    Done,
    /// Opaque value could not be serialized for blob storage (driver code)
    Encoder,
    /// Invalid or unknown savepoint identifier (driver code)
    Savepoint,
    /// Any code without a dedicated variant
    Other(i32),
}

/// Driver-defined code for opaque-value serialization failures.
pub const ENCODER_CODE: i32 = 1000;
/// Driver-defined code for invalid savepoint identifiers.
pub const SAVEPOINT_CODE: i32 = 1001;

const TABLE: &[(StatusCode, i32, &str, &str)] = &[
    (StatusCode::Ok, 0, "OK", "not an error"),
    (StatusCode::Error, 1, "ERROR", "SQL error or missing database"),
    (StatusCode::Internal, 2, "INTERNAL", "internal logic error in the engine"),
    (StatusCode::Perm, 3, "PERM", "access permission denied"),
    (StatusCode::Abort, 4, "ABORT", "callback routine requested an abort"),
    (StatusCode::Busy, 5, "BUSY", "the database file is locked"),
    (StatusCode::Locked, 6, "LOCKED", "a table in the database is locked"),
    (StatusCode::NoMem, 7, "NOMEM", "out of memory"),
    (StatusCode::ReadOnly, 8, "READONLY", "attempt to write a readonly database"),
    (StatusCode::Interrupt, 9, "INTERRUPT", "operation interrupted"),
    (StatusCode::IoErr, 10, "IOERR", "disk I/O error"),
    (StatusCode::Corrupt, 11, "CORRUPT", "the database disk image is malformed"),
    (StatusCode::NotFound, 12, "NOTFOUND", "unknown operation or table not found"),
    (StatusCode::Full, 13, "FULL", "insertion failed because the database is full"),
    (StatusCode::CantOpen, 14, "CANTOPEN", "unable to open the database file"),
    (StatusCode::Protocol, 15, "PROTOCOL", "database lock protocol error"),
    (StatusCode::Empty, 16, "EMPTY", "database is empty"),
    (StatusCode::Schema, 17, "SCHEMA", "the database schema changed"),
    (StatusCode::TooBig, 18, "TOOBIG", "string or blob exceeds size limit"),
    (StatusCode::Constraint, 19, "CONSTRAINT", "abort due to constraint violation"),
    (StatusCode::Mismatch, 20, "MISMATCH", "data type mismatch"),
    (StatusCode::Misuse, 21, "MISUSE", "library used incorrectly"),
    (StatusCode::NoLfs, 22, "NOLFS", "uses OS features not supported on host"),
    (StatusCode::Auth, 23, "AUTH", "authorization denied"),
    (StatusCode::Format, 24, "FORMAT", "auxiliary database format error"),
    (StatusCode::Range, 25, "RANGE", "bind parameter index out of range"),
    (StatusCode::NotDb, 26, "NOTADB", "file is not a database"),
    (StatusCode::Row, 100, "ROW", "another row available"),
    (StatusCode::Done, 101, "DONE", "no more rows available"),
    (StatusCode::Encoder, ENCODER_CODE, "ENCODER", "blob encoding failed"),
    (
        StatusCode::Savepoint,
        SAVEPOINT_CODE,
        "SAVEPOINT",
        "invalid or unknown savepoint identifier",
    ),
];

impl StatusCode {
    /// Maps a raw result code to its status.
    ///
    /// Extended result codes are folded onto their primary code; driver codes
    /// and anything unmapped are preserved.
    pub fn from_code(code: i32) -> Self {
        if let Some((status, ..)) = TABLE.iter().find(|(_, c, ..)| *c == code) {
            return *status;
        }
        if code > 0xff {
            if let Some((status, ..)) = TABLE.iter().find(|(_, c, ..)| *c == code & 0xff) {
                return *status;
            }
        }
        StatusCode::Other(code)
    }

    /// The numeric code.
    pub fn code(&self) -> i32 {
        match self {
            StatusCode::Other(code) => *code,
            status => TABLE
                .iter()
                .find(|(s, ..)| s == status)
                .map(|(_, code, ..)| *code)
                .unwrap_or_default(),
        }
    }

    /// Stable symbolic name, e.g. `"BUSY"`. Unmapped codes have no name.
    pub fn name(&self) -> Option<&'static str> {
        TABLE
            .iter()
            .find(|(s, ..)| s == self)
            .map(|(_, _, name, _)| *name)
    }

    /// Returns `true` for every code except `Ok`, `Row` and `Done`.
    pub fn is_error(&self) -> bool {
        !matches!(self, StatusCode::Ok | StatusCode::Row | StatusCode::Done)
    }

    /// Returns `true` for transient contention signals (`Busy`, `Locked`).
    pub fn is_retryable(&self) -> bool {
        matches!(self, StatusCode::Busy | StatusCode::Locked)
    }

    /// Collapses a raw code into `Ok(())` for `SQLITE_OK`, an error otherwise.
    pub fn check(code: i32) -> Result<()> {
        match StatusCode::from_code(code) {
            StatusCode::Ok => Ok(()),
            status => Err(status.into()),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match TABLE.iter().find(|(s, ..)| s == self) {
            Some((_, _, _, text)) => f.write_str(text),
            None => write!(f, "errno {}", self.code()),
        }
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        StatusCode::from_code(code)
    }
}
