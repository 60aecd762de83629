//! # Storage Error Types
//!
//! Errors for token store operations.
//!
//! These wrap sqlx errors and provide context. Note the asymmetry with the
//! rest of the workspace: a *corrupt stored session* is NOT an error — the
//! load path reports it as an absent session so a damaged store can never
//! lock the user out of the login screen. Errors here mean the store itself
//! could not be reached or mutated.

use thiserror::Error;

/// Result type alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Token store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed to begin or commit.
    ///
    /// A failed commit leaves the previous session record intact — the
    /// both-or-neither invariant is preserved by SQLite's atomicity.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Failed to serialize the user record for persistence.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::QueryFailed(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::SerializationFailed(err.to_string())
    }
}
