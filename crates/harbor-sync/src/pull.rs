//! # Pull Pipeline
//!
//! Fetches server changes after the cursor and applies them atomically.
//!
//! ## Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  GET ?terminalId&since=cursor&max=batch_size                            │
//! │        error / cancelled ──► return, nothing written                   │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    next = max(cursor, max inbox token)                                  │
//! │    for each change, in server order:                                    │
//! │        next += 1                                                        │
//! │        INSERT sync_inbox (token = next, ...)                            │
//! │        apply to the entity table (by public id)                         │
//! │    cursor = max(cursor, serverToken)                                    │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error before COMMIT rolls back every inbox row, every entity      │
//! │  write and the cursor move of this call.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::apply::ApplyOutcome;
use crate::engine::{PullReport, PushReport, SyncEngine};
use crate::error::{SyncError, SyncResult};
use harbor_core::{CursorAdvance, TokenSequence};
use harbor_db::{CursorRepository, InboxRepository};

impl SyncEngine {
    /// Pulls and applies one batch of server changes.
    ///
    /// An empty response still raises the cursor to the returned
    /// `serverToken`.
    pub async fn pull(&self, cancel: &CancellationToken) -> SyncResult<PullReport> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let _flight = self.flight.lock().await;

        let cursor_name = self.options.cursor_name.as_str();
        let since = {
            let mut conn = self.db.pool().acquire().await?;
            CursorRepository::get_or_create(&mut conn, cursor_name)
                .await?
                .last_token
        };

        debug!(since, max = self.options.batch_size, "Pulling server changes");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            result = self.transport.pull(&self.options.terminal_id, since, self.options.batch_size) => result?,
        };

        let (envelopes, server_token) = response.into_envelopes()?;
        if envelopes.len() > self.options.batch_size {
            warn!(
                received = envelopes.len(),
                max = self.options.batch_size,
                "Server returned more changes than requested"
            );
        }

        let mut report = PullReport {
            received: envelopes.len(),
            server_token,
            ..Default::default()
        };

        let mut tx = self.db.begin().await?;
        let mut cursor = CursorRepository::get_or_create(&mut *tx, cursor_name).await?;

        if !envelopes.is_empty() {
            let inbox_max = InboxRepository::max_token(&mut *tx).await?.unwrap_or(0);
            let mut tokens = TokenSequence::starting_after(cursor.last_token.max(inbox_max));
            let received_at = Utc::now();

            for envelope in envelopes {
                let token = tokens.next_token()?;
                InboxRepository::append(&mut *tx, &envelope.clone().into_inbox_entry(token, received_at))
                    .await?;

                match self.applier.apply(&mut *tx, &envelope).await? {
                    outcome if outcome.mutated() => report.applied += 1,
                    ApplyOutcome::SkippedUnknownKind => report.skipped_unknown += 1,
                    ApplyOutcome::Rejected => report.rejected += 1,
                    _ => report.unchanged += 1,
                }

                report.first_local_token.get_or_insert(token);
                report.last_local_token = Some(token);
            }
        }

        match cursor.advance(server_token) {
            CursorAdvance::Advanced { from, to } => {
                CursorRepository::store(&mut *tx, &cursor).await?;
                debug!(from, to, "Cursor advanced");
            }
            CursorAdvance::Regressed { current, offered } => {
                warn!(current, offered, "Server token behind cursor; keeping cursor");
            }
            CursorAdvance::Unchanged => {}
        }

        tx.commit().await?;
        report.cursor = cursor.last_token;

        if report.received > 0 {
            info!(
                received = report.received,
                applied = report.applied,
                unchanged = report.unchanged,
                skipped = report.skipped_unknown,
                rejected = report.rejected,
                cursor = report.cursor,
                "Pull complete"
            );
        } else {
            debug!(cursor = report.cursor, "Pull returned no changes");
        }

        Ok(report)
    }

    /// Push then pull, once each.
    pub async fn sync_once(&self, cancel: &CancellationToken) -> SyncResult<(PushReport, PullReport)> {
        let pushed = self.push(cancel).await?;
        let pulled = self.pull(cancel).await?;
        Ok((pushed, pulled))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOptions;
    use crate::protocol::WireChange;
    use crate::testing::{wire_change, ScriptedTransport};
    use harbor_core::{ChangeOperation, Sale, Setting};
    use harbor_db::{Database, DbConfig};
    use std::sync::Arc;
    use uuid::Uuid;

    async fn setup(transport: Arc<ScriptedTransport>) -> SyncEngine {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        SyncEngine::new(db, transport, EngineOptions::new("register-01"))
    }

    fn setting(id: Uuid, value: &str) -> WireChange {
        let s = Setting {
            public_id: id,
            name: "receipt.footer".to_string(),
            value: value.to_string(),
            updated_at: "2024-03-01T12:00:00Z".parse().unwrap(),
        };
        wire_change("Setting", id, ChangeOperation::Upsert, &s)
    }

    #[tokio::test]
    async fn test_empty_pull_advances_cursor() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.pull_ok(vec![], 57);
        let engine = setup(transport.clone()).await;

        let report = engine.pull(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.received, 0);
        assert_eq!(report.cursor, 57);
        assert_eq!(report.first_local_token, None);
        assert_eq!(engine.cursor_token().await.unwrap(), 57);
        assert_eq!(engine.database().inbox().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pull_sends_cursor_as_since() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.pull_ok(vec![], 30);
        let engine = setup(transport.clone()).await;
        engine.database().cursors().set("server", 25).await.unwrap();

        engine.pull(&CancellationToken::new()).await.unwrap();

        assert_eq!(transport.pulled(), vec![("register-01".to_string(), 25, 500)]);
    }

    #[tokio::test]
    async fn test_regressing_server_token_keeps_cursor() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.pull_ok(vec![], 10);
        let engine = setup(transport).await;
        engine.database().cursors().set("server", 50).await.unwrap();

        let report = engine.pull(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.cursor, 50);
        assert_eq!(engine.cursor_token().await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_inbox_tokens_continue_past_existing_rows() {
        let transport = Arc::new(ScriptedTransport::new());
        let id = Uuid::new_v4();
        transport.pull_ok(vec![setting(id, "a")], 5);
        transport.pull_ok(vec![setting(id, "b")], 6);
        let engine = setup(transport).await;

        let first = engine.pull(&CancellationToken::new()).await.unwrap();
        let second = engine.pull(&CancellationToken::new()).await.unwrap();

        assert_eq!(first.first_local_token, Some(1));
        // Seeded from cursor (5), which is ahead of the inbox (1)
        assert_eq!(second.first_local_token, Some(6));
        assert_eq!(second.applied, 1);
    }

    #[tokio::test]
    async fn test_counts_outcomes() {
        let transport = Arc::new(ScriptedTransport::new());
        let id = Uuid::new_v4();
        let unknown = wire_change("Coupon", Uuid::new_v4(), ChangeOperation::Upsert, &serde_json::json!({}));
        transport.pull_ok(vec![setting(id, "a"), setting(id, "a"), unknown], 3);
        let engine = setup(transport).await;

        let report = engine.pull(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.received, 3);
        assert_eq!(report.applied, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.skipped_unknown, 1);
        assert_eq!(report.last_local_token, Some(3));
        assert_eq!(engine.database().inbox().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_guard_rejection_is_counted() {
        let transport = Arc::new(ScriptedTransport::new());
        let id = Uuid::new_v4();
        let sale = |total: i64| Sale {
            public_id: id,
            receipt_number: "R-0001".to_string(),
            terminal_id: "register-02".to_string(),
            customer_id: None,
            subtotal_cents: total,
            tax_cents: 0,
            total_cents: total,
            posted_at: "2024-03-01T12:00:00Z".parse().unwrap(),
        };
        transport.pull_ok(
            vec![
                wire_change("Sale", id, ChangeOperation::Upsert, &sale(1000)),
                wire_change("Sale", id, ChangeOperation::Upsert, &sale(1)),
            ],
            2,
        );
        let engine = setup(transport).await;

        let report = engine.pull(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.rejected, 1);
        let stored: Sale = engine.database().find_entity(id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 1000);
    }

    #[tokio::test]
    async fn test_cancelled_pull_writes_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.pull_ok(vec![setting(Uuid::new_v4(), "a")], 9);
        let engine = setup(transport.clone()).await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(engine.pull(&cancel).await, Err(SyncError::Cancelled)));
        assert!(transport.pulled().is_empty());
        assert_eq!(engine.database().inbox().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sync_once_keeps_push_when_pull_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(1, 14);
        transport.pull_err(SyncError::Timeout("30s".into()));
        let engine = setup(transport.clone()).await;
        let local = Setting {
            public_id: Uuid::new_v4(),
            name: "receipt.header".to_string(),
            value: "Harbor".to_string(),
            updated_at: "2024-03-01T12:00:00Z".parse().unwrap(),
        };
        engine.database().save_entity(&local).await.unwrap();

        let err = engine.sync_once(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, SyncError::Timeout(_)));
        // The push transaction committed before the pull started
        assert_eq!(engine.pending_count().await.unwrap(), 0);
        assert_eq!(engine.cursor_token().await.unwrap(), 14);
        assert_eq!(transport.pulled(), vec![("register-01".to_string(), 14, 500)]);
        assert_eq!(engine.database().inbox().count().await.unwrap(), 0);
    }
}
