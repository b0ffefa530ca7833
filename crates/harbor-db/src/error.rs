//! # Database Error Types
//!
//! Errors raised by the local store.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / MigrateError / serde_json::Error                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module): constraint failures and pool state named       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError::Database (harbor-sync)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Agent retries when is_transient(), otherwise waits a poll interval    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The schema has no foreign keys; the only constraints a sync write can
//! trip are the primary and unique keys on the sync and entity tables.

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A query that must return a row returned none.
    #[error("Row not found: {0}")]
    NotFound(String),

    /// A primary or unique key was violated.
    ///
    /// ## When This Occurs
    /// - An inbox token that is already taken
    /// - Two rows of one entity table with the same public id
    ///
    /// `constraint` is SQLite's `<table>.<column>` description.
    #[error("Unique constraint failed: {constraint}")]
    UniqueViolation { constraint: String },

    /// The database file could not be opened or the pool is closed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An embedded migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// SQLite rejected a statement.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Begin or commit failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Every pooled connection is busy.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// An entity could not be serialized into an outbox payload.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Returns true if retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::PoolExhausted | DbError::ConnectionFailed(_) | DbError::TransactionFailed(_)
        )
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound("query returned no rows".to_string()),

            // "UNIQUE constraint failed: sync_inbox.token"
            sqlx::Error::Database(db_err) => match db_err.message().strip_prefix("UNIQUE constraint failed: ") {
                Some(constraint) => DbError::UniqueViolation {
                    constraint: constraint.to_string(),
                },
                None => DbError::QueryFailed(db_err.message().to_string()),
            },

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DbError::PoolExhausted.is_transient());
        assert!(DbError::ConnectionFailed("gone".into()).is_transient());
        assert!(!DbError::NotFound("cursor".into()).is_transient());
        assert!(!DbError::QueryFailed("syntax".into()).is_transient());
    }

    #[test]
    fn test_pool_errors_map_to_named_variants() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound(_)));

        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::PoolExhausted));

        let err: DbError = sqlx::Error::PoolClosed.into();
        assert!(err.is_transient());
    }
}
