//! Transactions
//!
//! A [`Transaction`] is an ordered list of operations run once between
//! `BEGIN` and `COMMIT`, rolled back when an operation aborts or panics.

use super::connection::Connection;
use super::error::{DatabaseError, Result};
use std::panic::{self, AssertUnwindSafe};

/// Anything that can begin, commit and roll back a transaction
pub trait Transactional {
    fn begin(&self) -> Result<()>;
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;
}

impl Transactional for Connection {
    fn begin(&self) -> Result<()> {
        Connection::begin(self)
    }

    fn commit(&self) -> Result<()> {
        Connection::commit(self)
    }

    fn rollback(&self) -> Result<()> {
        Connection::rollback(self)
    }
}

/// What a transaction operation asks the runner to do next
#[derive(Debug)]
pub enum TransactionStep {
    /// Run the next operation
    Continue,
    /// Skip the remaining operations and commit
    CommitNow,
    /// Roll back and fail with this error
    Abort(DatabaseError),
}

impl From<Result<()>> for TransactionStep {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => TransactionStep::Continue,
            Err(e) => TransactionStep::Abort(e),
        }
    }
}

/// Ordered operations executed atomically against a [`Transactional`] target
///
/// # Example
///
/// ```
/// use rust_sqlite_driver::{Connection, Transaction, TransactionStep};
///
/// let conn = Connection::open(":memory:").unwrap();
/// conn.execute("CREATE TABLE t (v INTEGER)").unwrap();
///
/// Transaction::new()
///     .then(|db: &Connection| db.execute("INSERT INTO t VALUES (1)").map(drop).into())
///     .then(|_| TransactionStep::CommitNow)
///     .execute(&conn)
///     .unwrap();
///
/// assert_eq!(conn.execute("SELECT * FROM t").unwrap(), 1);
/// ```
pub struct Transaction<'a, C: ?Sized> {
    operations: Vec<Box<dyn FnOnce(&C) -> TransactionStep + 'a>>,
}

impl<'a, C: Transactional + ?Sized> Transaction<'a, C> {
    /// Create an empty transaction
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Append an operation, builder style
    pub fn then<F>(mut self, op: F) -> Self
    where
        F: FnOnce(&C) -> TransactionStep + 'a,
    {
        self.push(op);
        self
    }

    /// Append an operation
    pub fn push<F>(&mut self, op: F)
    where
        F: FnOnce(&C) -> TransactionStep + 'a,
    {
        self.operations.push(Box::new(op));
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if no operation is queued
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Run every operation inside one transaction on `db`.
    ///
    /// # Errors
    ///
    /// - the error from `begin`, if the transaction cannot start
    /// - the error carried by an `Abort`, after a successful rollback
    /// - the commit error, after a successful rollback
    /// - `DoubleFault` if the rollback itself fails
    ///
    /// # Panics
    ///
    /// A panicking operation is re-raised after a rollback attempt.
    pub fn execute(self, db: &C) -> Result<()> {
        db.begin()?;

        let operations = self.operations;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            for op in operations {
                match op(db) {
                    TransactionStep::Continue => {}
                    TransactionStep::CommitNow => break,
                    TransactionStep::Abort(e) => return Err(e),
                }
            }
            Ok(())
        }));

        match outcome {
            Ok(Ok(())) => match db.commit() {
                Ok(()) => Ok(()),
                Err(e) => Err(Self::abort(db, e)),
            },
            Ok(Err(e)) => Err(Self::abort(db, e)),
            Err(payload) => {
                if let Err(e) = db.rollback() {
                    tracing::warn!(error = %e, "Rollback after panic failed");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Roll back after `original`, escalating if the rollback fails too.
    fn abort(db: &C, original: DatabaseError) -> DatabaseError {
        match db.rollback() {
            Ok(()) => {
                tracing::debug!(error = %original, "Transaction rolled back");
                original
            }
            Err(rollback) => {
                tracing::warn!(error = %original, rollback = %rollback, "Rollback failed");
                DatabaseError::DoubleFault {
                    original: Box::new(original),
                    rollback: Box::new(rollback),
                }
            }
        }
    }
}

impl<'a, C: Transactional + ?Sized> Default for Transaction<'a, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> std::fmt::Debug for Transaction<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("operations", &self.operations.len())
            .finish()
    }
}
