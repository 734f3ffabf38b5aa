//! # Rust SQLite Driver
//!
//! A safe Rust driver over the embedded SQLite engine's C API. It exposes
//! connection handles, prepared statements with typed parameter binding and
//! result decoding, transactions and savepoints, and online backup with
//! streamed progress.
//!
//! ## Features
//!
//! - **Typed values**: integers, floats, text, blobs and any `serde` value
//!   stored as a blob
//! - **Statement protocol**: prepare, bind, step, reset and finalize, with
//!   row callbacks
//! - **Transactions**: ordered operations committed or rolled back as a unit,
//!   plus named savepoints
//! - **Online backup**: page-stepped copies on a background thread, reported
//!   through a bounded `tokio` channel
//! - **Bundled engine**: SQLite is compiled in by default (`bundled` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_sqlite_driver::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let conn = Connection::open(":memory:")?;
//!     conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//!     let mut insert = conn.prepare("INSERT INTO users (name) VALUES (?)", params!["Alice"])?;
//!     insert.all()?;
//!
//!     let mut names = Vec::new();
//!     conn.execute_with("SELECT name FROM users", |_, row| {
//!         names.push(row[0].clone());
//!         Ok(())
//!     })?;
//!     assert_eq!(names, vec![Value::Text("Alice".into())]);
//!     Ok(())
//! }
//! ```
//!
//! ### Backups
//!
//! ```rust,no_run
//! use rust_sqlite_driver::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let conn = Connection::open("app.db")?;
//!     let mut reporter = conn.backup(BackupParameters::new("app.backup.db"))?;
//!
//!     while let Some(report) = reporter.recv().await {
//!         println!("{}/{} pages copied", report.copied(), report.total);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! rust_sqlite_driver/
//! ├── src/
//! │   ├── core/              # Safe driver types
//! │   │   ├── backup.rs      # Online backup and progress stream
//! │   │   ├── connection.rs  # Connection and savepoints
//! │   │   ├── error.rs       # Error types
//! │   │   ├── flags.rs       # Open flags
//! │   │   ├── session.rs     # Engine lifecycle
//! │   │   ├── statement.rs   # Prepared statements
//! │   │   ├── status.rs      # Engine result codes
//! │   │   ├── table.rs       # Table helper
//! │   │   ├── transaction.rs # Transaction runner
//! │   │   ├── value.rs       # Value types
//! │   │   └── mod.rs
//! │   ├── backends/          # Engine bindings
//! │   │   ├── sqlite.rs      # Raw C API handles
//! │   │   └── mod.rs
//! │   └── lib.rs
//! ├── tests/                 # Integration tests
//! ├── benches/               # Benchmarks
//! └── Cargo.toml
//! ```

/// Core driver types
pub mod core;

mod backends;

/// Prelude for convenient imports
///
/// ```rust
/// use rust_sqlite_driver::prelude::*;
///
/// fn main() -> Result<()> {
///     let count = transient_session(|conn| conn.execute("SELECT 1"))??;
///     assert_eq!(count, 1);
///     Ok(())
/// }
/// ```
pub mod prelude {
    pub use crate::core::{
        transient_session, session, BackupParameters, Connection, DatabaseError, OpenFlags,
        Result, StatusCode, StepResult, Transaction, TransactionStep, Value,
    };
    pub use crate::params;
}

// Re-export at root level for convenience
pub use crate::core::{
    lib_version, session, transient_session, Backup, BackupCursor, BackupParameters,
    ColumnType, Connection, DatabaseError, Engine, OpaqueValue, OpenFlags, ProgressReport,
    QueryParameter, Reporter, Result, ResultColumn, SavepointId, Statement, StatusCode,
    StepResult, Table, Transaction, TransactionStep, Transactional, Value,
};
