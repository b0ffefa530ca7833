//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Http{status}   │  │  ProtocolViolation      │ │
//! │  │  MissingTermId  │  │  Connection     │  │  PayloadDecode          │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  UnknownOperation       │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Database     │  │   Sequencing    │  │      Lifecycle          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Database(..)   │  │  TokenOverflow  │  │  Cancelled              │ │
//! │  │                 │  │                 │  │  Internal               │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant aborts the current push or pull with no local state
//! mutated; the caller decides whether to retry.

use thiserror::Error;
use uuid::Uuid;

use harbor_core::CoreError;
use harbor_db::DbError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Missing terminal ID (required for sync).
    #[error("Terminal ID not configured")]
    MissingTerminalId,

    /// Invalid server URL.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The server answered with a non-success status.
    ///
    /// `body` is the response text, kept for diagnostics.
    #[error("Server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The server could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Success status with an empty or unparseable body.
    ///
    /// ## When This Occurs
    /// Client and server disagree on the wire format, usually after a
    /// server upgrade. Never swallowed.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// A pulled payload could not be deserialized into its entity type.
    ///
    /// Aborts the whole pull batch.
    #[error("Cannot decode {entity_kind} payload for {public_id}: {reason}")]
    PayloadDecode {
        entity_kind: String,
        public_id: Uuid,
        reason: String,
    },

    /// An operation code that is neither upsert nor delete.
    #[error("Unknown change operation code: {0}")]
    UnknownOperation(i64),

    // =========================================================================
    // Sequencing Errors
    // =========================================================================
    /// The local inbox token counter would overflow.
    #[error("Local token sequence overflowed after token {last}")]
    TokenOverflow { last: i64 },

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Local storage failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// The call was cancelled before anything was committed.
    #[error("Sync cancelled")]
    Cancelled,

    /// Internal sync error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TokenOverflow { last } => SyncError::TokenOverflow { last },
            CoreError::UnknownOperation(code) => SyncError::UnknownOperation(code),
            CoreError::UnknownEntityKind(kind) => {
                SyncError::Internal(format!("unresolved entity kind '{kind}'"))
            }
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Database(DbError::from(err))
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(err.to_string())
        } else if err.is_decode() {
            SyncError::ProtocolViolation(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the same call may succeed later without changes.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - 5xx, 408 and 429 responses
    /// - Transient database conditions (pool exhausted, busy)
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Protocol violations and undecodable payloads
    /// - Token overflow
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) => true,
            SyncError::Http { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            SyncError::Database(db) => db.is_transient(),
            _ => false,
        }
    }

    /// Returns true if client and server disagree on the wire format.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            SyncError::ProtocolViolation(_)
                | SyncError::PayloadDecode { .. }
                | SyncError::UnknownOperation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("network error".into()).is_retryable());
        assert!(SyncError::Timeout("30s".into()).is_retryable());
        assert!(SyncError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(SyncError::Http { status: 429, body: String::new() }.is_retryable());
        assert!(SyncError::Database(DbError::PoolExhausted).is_retryable());

        assert!(!SyncError::Http { status: 400, body: String::new() }.is_retryable());
        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::ProtocolViolation("empty body".into()).is_retryable());
        assert!(!SyncError::TokenOverflow { last: i64::MAX }.is_retryable());
    }

    #[test]
    fn test_categories() {
        assert!(SyncError::ProtocolViolation("x".into()).is_protocol_error());
        assert!(SyncError::UnknownOperation(9).is_protocol_error());
        assert!(!SyncError::Cancelled.is_protocol_error());
    }

    #[test]
    fn test_core_error_conversion() {
        let err: SyncError = CoreError::TokenOverflow { last: 5 }.into();
        assert!(matches!(err, SyncError::TokenOverflow { last: 5 }));

        let err: SyncError = CoreError::UnknownOperation(3).into();
        assert!(matches!(err, SyncError::UnknownOperation(3)));
    }

    #[test]
    fn test_error_display() {
        let id = Uuid::new_v4();
        let err = SyncError::PayloadDecode {
            entity_kind: "Product".into(),
            public_id: id,
            reason: "missing field `sku`".into(),
        };
        assert!(err.to_string().contains("Product"));
        assert!(err.to_string().contains(&id.to_string()));

        let err = SyncError::Http {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.to_string(), "Server returned HTTP 500: boom");
    }
}
