//! Engine sessions
//!
//! The engine is initialized on first use and shut down when nothing uses it
//! any more. [`Engine`] is a counted handle on that lifecycle; [`session`]
//! and [`transient_session`] bracket a closure with an engine reference and
//! an open connection.

use super::connection::{Connection, MEMORY};
use super::error::Result;
use crate::backends::sqlite::{self, EngineGuard};

/// A counted reference on the process-wide engine.
///
/// The engine stays initialized while any `Engine` or open [`Connection`]
/// exists.
#[derive(Debug)]
pub struct Engine {
    _guard: EngineGuard,
}

impl Engine {
    /// Initialize the engine if needed and take a reference on it.
    ///
    /// # Errors
    ///
    /// `NotThreadSafe` if the linked library was built without thread
    /// support, or the engine's initialization error.
    pub fn acquire() -> Result<Self> {
        Ok(Self {
            _guard: EngineGuard::acquire()?,
        })
    }

    /// Number of live engine references, connections included
    pub fn users() -> usize {
        EngineGuard::users()
    }
}

/// Version string of the linked SQLite library
pub fn lib_version() -> &'static str {
    sqlite::lib_version()
}

/// Check if the linked library supports use from multiple threads
pub fn threadsafe() -> bool {
    sqlite::threadsafe()
}

/// Open `filename`, run `f` on it, then close the connection and release
/// the engine. Teardown also happens if `f` panics.
pub fn session<R, F>(filename: &str, f: F) -> Result<R>
where
    F: FnOnce(&Connection) -> R,
{
    let _engine = Engine::acquire()?;
    let conn = Connection::open(filename)?;
    tracing::debug!(filename, "Session started");
    let result = f(&conn);
    drop(conn);
    tracing::debug!(filename, "Session ended");
    Ok(result)
}

/// [`session`] over a private in-memory database
pub fn transient_session<R, F>(f: F) -> Result<R>
where
    F: FnOnce(&Connection) -> R,
{
    session(MEMORY, f)
}
