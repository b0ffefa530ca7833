//! # Error Types
//!
//! Domain errors for harbor-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  harbor-core errors (this file)                                        │
//! │  └── CoreError        - Registry, operation code, token arithmetic     │
//! │                                                                         │
//! │  harbor-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  harbor-sync errors (separate crate)                                   │
//! │  └── SyncError        - What the scheduler sees                        │
//! │                                                                         │
//! │  Flow: CoreError → SyncError ← DbError                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Errors raised by the pure sync types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An entity kind name outside the registry.
    ///
    /// The pull pipeline treats this as "recognized but unsupported" and
    /// skips the envelope; it is only an error for callers that parse
    /// kind names strictly (e.g. `"Product".parse::<EntityKind>()`).
    #[error("Unknown entity kind: '{0}'")]
    UnknownEntityKind(String),

    /// An operation code that is neither Upsert nor Delete.
    #[error("Unknown change operation code: {0}")]
    UnknownOperation(i64),

    /// The local token counter would pass `i64::MAX`.
    ///
    /// ## When This Occurs
    /// Never in normal operation. Reaching it means the inbox or cursor
    /// holds a corrupt value and needs investigation; it is never wrapped.
    #[error("Local token sequence overflowed after token {last}")]
    TokenOverflow { last: i64 },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::UnknownEntityKind("Voucher".to_string());
        assert_eq!(err.to_string(), "Unknown entity kind: 'Voucher'");

        let err = CoreError::TokenOverflow { last: i64::MAX };
        assert!(err.to_string().contains(&i64::MAX.to_string()));
    }
}
