//! Core driver types
//!
//! This module provides the safe layer over the engine: status codes and
//! errors, values, connections, statements, transactions and backups.

pub mod backup;
pub mod connection;
pub mod error;
pub mod flags;
pub mod session;
pub mod statement;
pub mod status;
pub mod table;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use backup::{Backup, BackupCursor, BackupParameters, ProgressReport, Reporter};
pub use connection::{Connection, SavepointId};
pub use error::{DatabaseError, Result};
pub use flags::OpenFlags;
pub use session::{lib_version, session, transient_session, Engine};
pub use statement::{ColumnType, QueryParameter, ResultColumn, Statement, StepResult};
pub use status::StatusCode;
pub use table::Table;
pub use transaction::{Transaction, TransactionStep, Transactional};
pub use value::{OpaqueValue, Value};
