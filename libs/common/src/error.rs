//! Custom error types for the common library
//!
//! This module defines the store-level error type shared by every service
//! that talks to the portal database.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred while acquiring or opening a connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Classify a query error, splitting out unique-constraint violations
    pub fn from_query(err: SqlxError) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return DatabaseError::UniqueViolation(constraint);
            }
        }

        DatabaseError::Query(err)
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_error_is_query() {
        let err = DatabaseError::from_query(SqlxError::RowNotFound);
        assert!(matches!(err, DatabaseError::Query(_)));
    }

    #[test]
    fn test_unique_violation_display() {
        let err = DatabaseError::UniqueViolation("accounts_email_key".to_string());
        assert_eq!(
            err.to_string(),
            "Unique constraint violated: accounts_email_key"
        );
    }
}
