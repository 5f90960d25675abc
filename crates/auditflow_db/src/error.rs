//! Error types for the roster database layer.

use crate::sql_guard::SqlGuardError;
use thiserror::Error;

/// Database operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error (file system operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database file or table not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configured table, column or query rejected before execution
    #[error("Rejected roster query: {0}")]
    Rejected(#[from] SqlGuardError),

    /// Query ran but its first column is not text
    #[error("Unexpected column type: {0}")]
    ColumnType(String),
}

impl DbError {
    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// True when the database or table is simply absent.
    pub fn is_missing(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }
}
