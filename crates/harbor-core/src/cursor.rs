//! # Cursor and Token Sequence
//!
//! Two independent numbering spaces meet here.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SyncCursor.last_token    server watermark; next pull asks `since` it   │
//! │                           only ever moves forward                       │
//! │                                                                         │
//! │  TokenSequence            local inbox numbering for the audit log       │
//! │                           checked increment, overflow is an error       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Sync Cursor
// =============================================================================

/// The last server-acknowledged token for a named endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    pub name: String,
    pub last_token: i64,
}

/// Result of offering a server token to a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorAdvance {
    /// The cursor moved forward.
    Advanced { from: i64, to: i64 },
    /// The offered token equals the current one.
    Unchanged,
    /// The offered token is behind the cursor; the cursor was kept.
    Regressed { current: i64, offered: i64 },
}

impl CursorAdvance {
    pub fn moved(self) -> bool {
        matches!(self, CursorAdvance::Advanced { .. })
    }
}

impl SyncCursor {
    /// A fresh cursor at token zero.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_token: 0,
        }
    }

    /// Moves the cursor to `server_token` if that is ahead of it.
    ///
    /// Never decreases `last_token`.
    pub fn advance(&mut self, server_token: i64) -> CursorAdvance {
        use std::cmp::Ordering;

        match server_token.cmp(&self.last_token) {
            Ordering::Greater => {
                let from = self.last_token;
                self.last_token = server_token;
                CursorAdvance::Advanced {
                    from,
                    to: server_token,
                }
            }
            Ordering::Equal => CursorAdvance::Unchanged,
            Ordering::Less => CursorAdvance::Regressed {
                current: self.last_token,
                offered: server_token,
            },
        }
    }
}

// =============================================================================
// Token Sequence
// =============================================================================

/// Running counter handing out local inbox tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSequence {
    last: i64,
}

impl TokenSequence {
    /// Starts a sequence whose first token will be `last + 1`.
    pub fn starting_after(last: i64) -> Self {
        Self { last }
    }

    /// Hands out the next token.
    ///
    /// ## Returns
    /// * `Err(CoreError::TokenOverflow)` - if `last` is already `i64::MAX`
    pub fn next_token(&mut self) -> CoreResult<i64> {
        let next = self
            .last
            .checked_add(1)
            .ok_or(CoreError::TokenOverflow { last: self.last })?;
        self.last = next;
        Ok(next)
    }

    pub fn last(&self) -> i64 {
        self.last
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_advances_forward() {
        let mut cursor = SyncCursor::new("server");
        assert_eq!(cursor.last_token, 0);

        assert_eq!(
            cursor.advance(12),
            CursorAdvance::Advanced { from: 0, to: 12 }
        );
        assert_eq!(cursor.last_token, 12);
        assert_eq!(cursor.advance(12), CursorAdvance::Unchanged);
    }

    #[test]
    fn test_cursor_never_regresses() {
        let mut cursor = SyncCursor {
            name: "server".to_string(),
            last_token: 100,
        };

        let outcome = cursor.advance(40);
        assert_eq!(
            outcome,
            CursorAdvance::Regressed {
                current: 100,
                offered: 40
            }
        );
        assert!(!outcome.moved());
        assert_eq!(cursor.last_token, 100);
    }

    #[test]
    fn test_sequence_increments() {
        let mut seq = TokenSequence::starting_after(100);
        assert_eq!(seq.next_token().unwrap(), 101);
        assert_eq!(seq.next_token().unwrap(), 102);
        assert_eq!(seq.last(), 102);
    }

    #[test]
    fn test_sequence_overflow_fails() {
        let mut seq = TokenSequence::starting_after(i64::MAX - 1);
        assert_eq!(seq.next_token().unwrap(), i64::MAX);
        assert_eq!(
            seq.next_token(),
            Err(CoreError::TokenOverflow { last: i64::MAX })
        );
        // Still pinned at MAX, never wrapped
        assert_eq!(seq.last(), i64::MAX);
    }
}
