//! Error handling for appview-store
//!
//! Classifies backend failures into the shared `ExErrorKind` taxonomy. The
//! classification decides retry behavior: only `Deadlock` is retried.

use appview_core::errors::{ExError, ExErrorKind};
use rusqlite::ErrorCode;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => ExErrorKind::Deadlock,
            ErrorCode::ConstraintViolation => ExErrorKind::ConstraintViolation,
            ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::SystemIoFailure => {
                ExErrorKind::Connection
            }
            _ => ExErrorKind::Persistence,
        },
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => ExErrorKind::Serialization,
        _ => ExErrorKind::Persistence,
    };

    ExError::new(kind)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Classify a SQLSTATE code reported by a PostgreSQL-compatible backend
pub fn classify_sqlstate(code: &str) -> ExErrorKind {
    match code {
        // deadlock_detected, serialization_failure
        "40P01" | "40001" => ExErrorKind::Deadlock,
        // query_canceled (statement_timeout)
        "57014" => ExErrorKind::Timeout,
        c if c.starts_with("23") => ExErrorKind::ConstraintViolation,
        c if c.starts_with("08") => ExErrorKind::Connection,
        _ => ExErrorKind::Persistence,
    }
}

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::ConstraintViolation)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// A stored row could not be turned back into an entity
pub fn decode_error(table: &str, column: &str, reason: impl std::fmt::Display) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op("decode_row")
        .with_message(format!("{}.{}: {}", table, column, reason))
}

/// An entity field could not be turned into a column value
pub fn encode_error(column: &str, reason: impl std::fmt::Display) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op("encode_row")
        .with_message(format!("{}: {}", column, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: std::os::raw::c_int) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn test_busy_and_locked_are_deadlocks() {
        assert_eq!(
            from_rusqlite(sqlite_failure(rusqlite::ffi::SQLITE_BUSY)).kind(),
            ExErrorKind::Deadlock
        );
        assert_eq!(
            from_rusqlite(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED)).kind(),
            ExErrorKind::Deadlock
        );
    }

    #[test]
    fn test_constraint_is_not_retryable() {
        let err = from_rusqlite(sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT));
        assert_eq!(err.kind(), ExErrorKind::ConstraintViolation);
        assert!(!err.kind().is_retryable());
    }

    #[test]
    fn test_cannot_open_is_connection() {
        let err = from_rusqlite(sqlite_failure(rusqlite::ffi::SQLITE_CANTOPEN));
        assert_eq!(err.kind(), ExErrorKind::Connection);
    }

    #[test]
    fn test_sqlstate_classification() {
        assert_eq!(classify_sqlstate("40P01"), ExErrorKind::Deadlock);
        assert_eq!(classify_sqlstate("40001"), ExErrorKind::Deadlock);
        assert_eq!(classify_sqlstate("23505"), ExErrorKind::ConstraintViolation);
        assert_eq!(classify_sqlstate("08006"), ExErrorKind::Connection);
        assert_eq!(classify_sqlstate("57014"), ExErrorKind::Timeout);
        assert_eq!(classify_sqlstate("42P01"), ExErrorKind::Persistence);
    }
}
