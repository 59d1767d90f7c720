//! Custom error types for the common library
//!
//! This module defines the storage error type shared by every repository
//! implementation in the application.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// PostgreSQL SQLSTATE for `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL SQLSTATE for `check_violation`
const CHECK_VIOLATION: &str = "23514";

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A unique constraint rejected the write; carries the constraint name
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A check constraint rejected the write; carries the constraint name
    #[error("Check constraint violated: {0}")]
    CheckViolation(String),

    /// A stored value could not be mapped back into a model
    #[error("Database decode error: {0}")]
    Decode(String),
}

impl DatabaseError {
    /// Classify an error returned by a query
    ///
    /// Unique and check violations are surfaced with their constraint name so callers
    /// can translate them into domain errors.
    pub fn from_query(err: SqlxError) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => return DatabaseError::UniqueViolation(constraint),
                Some(CHECK_VIOLATION) => return DatabaseError::CheckViolation(constraint),
                _ => {}
            }
        }
        DatabaseError::Query(err)
    }

    /// Name of the violated constraint, if that is what happened
    pub fn violated_constraint(&self) -> Option<&str> {
        match self {
            DatabaseError::UniqueViolation(name) | DatabaseError::CheckViolation(name) => {
                Some(name.as_str())
            }
            _ => None,
        }
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violated_constraint_only_for_constraint_errors() {
        let err = DatabaseError::UniqueViolation("users_email_key".to_string());
        assert_eq!(err.violated_constraint(), Some("users_email_key"));

        let err = DatabaseError::Migration("boom".to_string());
        assert_eq!(err.violated_constraint(), None);
    }

    #[test]
    fn test_from_query_keeps_non_database_errors() {
        let err = DatabaseError::from_query(SqlxError::RowNotFound);
        assert!(matches!(err, DatabaseError::Query(SqlxError::RowNotFound)));
    }
}
