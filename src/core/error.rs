//! Error types for the driver
//!
//! This module defines all error types that can occur while talking to the engine.

use super::status::StatusCode;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error types for driver operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Engine reported a non-OK result code
    #[error("SQLite error {}: {message}", .code.name().unwrap_or("UNKNOWN"))]
    Engine { code: StatusCode, message: String },

    /// Binding a positional parameter failed
    #[error("Bind failed at parameter {index}: {source}")]
    Bind {
        index: usize,
        #[source]
        source: Box<DatabaseError>,
    },

    /// An opaque value could not be serialized into a blob
    #[error("Blob encoding failed: {0}")]
    Encoder(#[source] serde_json::Error),

    /// A blob could not be deserialized into the requested type
    #[error("Blob decoding failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// Type conversion error
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Savepoint identifier cannot be used as an SQL identifier
    #[error("Invalid savepoint identifier: {0}")]
    Savepoint(String),

    /// The linked engine was built without thread-safety support
    #[error("SQLite library is not thread-safe")]
    NotThreadSafe,

    /// Operation on a closed connection or finalized statement
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// A transaction aborted and the rollback failed as well
    #[error("Transaction aborted ({original}) and rollback failed ({rollback})")]
    DoubleFault {
        original: Box<DatabaseError>,
        rollback: Box<DatabaseError>,
    },

    /// Backup request parameters are unusable
    #[error("Invalid backup parameters: {0}")]
    InvalidParameters(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error, typically raised by row callbacks
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Create an engine error for `code`
    pub fn engine(code: StatusCode, message: impl Into<String>) -> Self {
        DatabaseError::Engine {
            code,
            message: message.into(),
        }
    }

    /// Create a new type mismatch error
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        DatabaseError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a savepoint identifier error
    pub fn savepoint<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Savepoint(msg.into())
    }

    /// Create a not-connected error
    pub fn not_connected<S: Into<String>>(msg: S) -> Self {
        DatabaseError::NotConnected(msg.into())
    }

    /// Create an invalid backup parameters error
    pub fn invalid_parameters<S: Into<String>>(msg: S) -> Self {
        DatabaseError::InvalidParameters(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Other(msg.into())
    }

    /// The status code this error maps to.
    ///
    /// Driver-side failures are folded onto the closest engine code so that
    /// callers can branch on a single [`StatusCode`].
    pub fn code(&self) -> StatusCode {
        match self {
            DatabaseError::Engine { code, .. } => *code,
            DatabaseError::Bind { source, .. } => source.code(),
            DatabaseError::Encoder(_) => StatusCode::Encoder,
            DatabaseError::Decode(_) | DatabaseError::TypeMismatch { .. } => StatusCode::Mismatch,
            DatabaseError::Savepoint(_) => StatusCode::Savepoint,
            DatabaseError::NotThreadSafe
            | DatabaseError::NotConnected(_)
            | DatabaseError::InvalidParameters(_) => StatusCode::Misuse,
            DatabaseError::DoubleFault { original, .. } => original.code(),
            DatabaseError::IoError(_) => StatusCode::IoErr,
            DatabaseError::Other(_) => StatusCode::Error,
        }
    }

    /// Returns `true` for transient contention errors (`Busy`, `Locked`).
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<StatusCode> for DatabaseError {
    fn from(code: StatusCode) -> Self {
        DatabaseError::engine(code, code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = DatabaseError::from(StatusCode::Busy);
        assert!(matches!(err, DatabaseError::Engine { code: StatusCode::Busy, .. }));
        assert!(err.is_retryable());

        let err = DatabaseError::savepoint("empty identifier");
        assert_eq!(err.code(), StatusCode::Savepoint);

        let err = DatabaseError::type_mismatch("blob", "integer");
        assert!(matches!(err, DatabaseError::TypeMismatch { .. }));
        assert_eq!(err.code(), StatusCode::Mismatch);
    }

    #[test]
    fn test_error_display() {
        let err = DatabaseError::engine(StatusCode::Error, "no such table: missing");
        assert_eq!(err.to_string(), "SQLite error ERROR: no such table: missing");

        let err = DatabaseError::type_mismatch("blob", "text");
        assert_eq!(err.to_string(), "Type mismatch: expected blob, got text");
    }

    #[test]
    fn test_nested_codes() {
        let err = DatabaseError::Bind {
            index: 2,
            source: Box::new(StatusCode::Range.into()),
        };
        assert_eq!(err.code(), StatusCode::Range);
        assert_eq!(
            err.to_string(),
            "Bind failed at parameter 2: SQLite error RANGE: bind parameter index out of range"
        );

        let err = DatabaseError::DoubleFault {
            original: Box::new(StatusCode::Constraint.into()),
            rollback: Box::new(StatusCode::Busy.into()),
        };
        assert_eq!(err.code(), StatusCode::Constraint);
        assert!(!err.is_retryable());
    }
}
