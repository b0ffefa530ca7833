//! # Sync Engine
//!
//! Owns the push and pull pipelines for one terminal/cursor pair.
//!
//! ## Control Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SyncEngine                                      │
//! │                                                                         │
//! │   push()                              pull()                            │
//! │   ──────                              ──────                            │
//! │   cursor + outbox ──► transport       cursor ──► transport              │
//! │                          │                          │                   │
//! │                          ▼                          ▼                   │
//! │   ┌───────────── ONE TRANSACTION ──┐  ┌───── ONE TRANSACTION ────────┐  │
//! │   │ remove acknowledged prefix     │  │ inbox row + apply, per change│  │
//! │   │ raise cursor to serverToken    │  │ raise cursor to serverToken  │  │
//! │   └────────────────────────────────┘  └──────────────────────────────┘  │
//! │                                                                         │
//! │   Push and pull share `flight`, so at most one of them runs at a time. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No connection is held while the transport is in flight.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::apply::ApplyEngine;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::transport::SyncTransport;
use harbor_core::{DEFAULT_CURSOR_NAME, MAX_BATCH_SIZE};
use harbor_db::Database;

// =============================================================================
// Options
// =============================================================================

/// Per-engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Sent with every push and pull.
    pub terminal_id: String,
    /// Cursor row tracking the server.
    pub cursor_name: String,
    /// Outbox rows per push and envelopes requested per pull.
    pub batch_size: usize,
    pub guard_posted_documents: bool,
}

impl EngineOptions {
    pub fn new(terminal_id: impl Into<String>) -> Self {
        EngineOptions {
            terminal_id: terminal_id.into(),
            cursor_name: DEFAULT_CURSOR_NAME.to_string(),
            batch_size: MAX_BATCH_SIZE,
            guard_posted_documents: true,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        EngineOptions {
            terminal_id: config.terminal.id.clone(),
            cursor_name: config.sync.cursor_name.clone(),
            batch_size: config.sync.batch_size.clamp(1, MAX_BATCH_SIZE),
            guard_posted_documents: config.sync.guard_posted_documents,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn cursor_name(mut self, name: impl Into<String>) -> Self {
        self.cursor_name = name.into();
        self
    }

    pub fn guard_posted_documents(mut self, guard: bool) -> Self {
        self.guard_posted_documents = guard;
        self
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Result of one push call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Outbox rows sent. Zero means no request was made.
    pub sent: usize,
    /// Acknowledged prefix length, after clamping to `sent`.
    pub accepted: usize,
    /// Outbox rows deleted.
    pub removed: u64,
    /// Watermark returned by the server, if a request was made.
    pub server_token: Option<i64>,
    /// Cursor after the call.
    pub cursor: i64,
}

impl PushReport {
    /// True if the batch was full and fully acknowledged, so more rows may
    /// be waiting.
    pub fn may_have_more(&self, batch_size: usize) -> bool {
        self.sent == batch_size && self.accepted == self.sent
    }
}

/// Result of one pull call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Envelopes returned by the server.
    pub received: usize,
    /// Envelopes that inserted, updated or deleted a row.
    pub applied: usize,
    /// Envelopes that matched local state already.
    pub unchanged: usize,
    pub skipped_unknown: usize,
    /// Posted-document changes refused by the guard.
    pub rejected: usize,
    /// Inbox tokens assigned in this call.
    pub first_local_token: Option<i64>,
    pub last_local_token: Option<i64>,
    pub server_token: i64,
    /// Cursor after the call.
    pub cursor: i64,
}

impl PullReport {
    pub fn may_have_more(&self, batch_size: usize) -> bool {
        self.received >= batch_size
    }
}

// =============================================================================
// Engine
// =============================================================================

/// The sync orchestrator.
///
/// Terminal identity and transport are injected; nothing is read from
/// global state.
pub struct SyncEngine {
    pub(crate) db: Database,
    pub(crate) transport: Arc<dyn SyncTransport>,
    pub(crate) options: EngineOptions,
    pub(crate) applier: ApplyEngine,
    /// Serializes push and pull.
    pub(crate) flight: Mutex<()>,
}

impl SyncEngine {
    pub fn new(db: Database, transport: Arc<dyn SyncTransport>, options: EngineOptions) -> Self {
        let applier = ApplyEngine::new(options.guard_posted_documents);
        SyncEngine {
            db,
            transport,
            options,
            applier,
            flight: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Advisory reachability probe. Never affects sync state.
    pub async fn ping(&self) -> bool {
        self.transport.ping().await
    }

    /// Outbox rows waiting to be pushed.
    pub async fn pending_count(&self) -> SyncResult<i64> {
        Ok(self.db.outbox().count_pending().await?)
    }

    /// Current cursor value; 0 if the cursor has never been created.
    pub async fn cursor_token(&self) -> SyncResult<i64> {
        Ok(self
            .db
            .cursors()
            .get(&self.options.cursor_name)
            .await?
            .map(|c| c.last_token)
            .unwrap_or(0))
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("options", &self.options)
            .field("applier", &self.applier)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let mut config = SyncConfig::default();
        config.terminal.id = "register-05".to_string();
        config.sync.batch_size = 9000;
        config.sync.guard_posted_documents = false;

        let options = EngineOptions::from_config(&config);
        assert_eq!(options.terminal_id, "register-05");
        assert_eq!(options.cursor_name, "server");
        assert_eq!(options.batch_size, MAX_BATCH_SIZE);
        assert!(!options.guard_posted_documents);
    }

    #[test]
    fn test_options_builder_clamps_batch() {
        let options = EngineOptions::new("t").batch_size(0);
        assert_eq!(options.batch_size, 1);
    }

    #[test]
    fn test_may_have_more() {
        let full = PushReport {
            sent: 3,
            accepted: 3,
            ..Default::default()
        };
        assert!(full.may_have_more(3));
        let partial = PushReport {
            sent: 3,
            accepted: 2,
            ..Default::default()
        };
        assert!(!partial.may_have_more(3));

        let pull = PullReport {
            received: 3,
            ..Default::default()
        };
        assert!(pull.may_have_more(3));
        assert!(!pull.may_have_more(4));
    }
}
