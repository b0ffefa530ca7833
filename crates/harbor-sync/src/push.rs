//! # Push Pipeline
//!
//! Sends the oldest outbox rows and drops exactly what the server stored.
//!
//! ## Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. cancelled? ──yes──► Err(Cancelled)                                  │
//! │  2. cursor (create at 0) + up to batch_size rows, token ASC             │
//! │  3. no rows ──► return, no request                                      │
//! │  4. POST { terminalId, fromToken = cursor, changes }                    │
//! │        error / cancelled ──► return, outbox and cursor untouched       │
//! │  5. BEGIN                                                               │
//! │       DELETE rows with token <= batch[accepted - 1].token               │
//! │       cursor = max(cursor, serverToken)                                 │
//! │     COMMIT                                                              │
//! │                                                                         │
//! │  outbox: [10][11][12]   accepted = 2   ──►   outbox: [12]               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is at-least-once: anything not acknowledged is resent by the
//! next push, and the server applies by public id.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{PushReport, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::protocol::PushRequest;
use harbor_core::CursorAdvance;
use harbor_db::{CursorRepository, OutboxRepository};

impl SyncEngine {
    /// Pushes one batch of local changes.
    ///
    /// ## Returns
    /// * `Ok(PushReport)` - With `sent == 0` if the outbox was empty
    /// * `Err(_)` - Nothing was removed and the cursor did not move
    pub async fn push(&self, cancel: &CancellationToken) -> SyncResult<PushReport> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let _flight = self.flight.lock().await;

        let cursor_name = self.options.cursor_name.as_str();
        let (cursor, batch) = {
            let mut conn = self.db.pool().acquire().await?;
            let cursor = CursorRepository::get_or_create(&mut conn, cursor_name).await?;
            let batch = OutboxRepository::pending_in(&mut conn, self.options.batch_size as u32).await?;
            (cursor, batch)
        };

        if batch.is_empty() {
            debug!("Outbox empty, nothing to push");
            return Ok(PushReport {
                cursor: cursor.last_token,
                ..Default::default()
            });
        }

        let request = PushRequest::new(self.options.terminal_id.as_str(), cursor.last_token, &batch);

        debug!(
            sent = batch.len(),
            from_token = cursor.last_token,
            first_token = batch[0].token,
            "Pushing outbox batch"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            result = self.transport.push(&request) => result?,
        };

        let accepted = usize::try_from(response.accepted).unwrap_or(usize::MAX);
        let accepted = if accepted > batch.len() {
            warn!(
                accepted = response.accepted,
                sent = batch.len(),
                "Server acknowledged more changes than were sent; clamping"
            );
            batch.len()
        } else {
            accepted
        };

        let mut tx = self.db.begin().await?;

        // Re-read inside the transaction that writes it back
        let mut cursor = CursorRepository::get_or_create(&mut *tx, cursor_name).await?;

        let removed = match accepted.checked_sub(1) {
            Some(last) => OutboxRepository::remove_through(&mut *tx, batch[last].token).await?,
            None => 0,
        };

        match cursor.advance(response.server_token) {
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

        info!(
            sent = batch.len(),
            accepted,
            removed,
            server_token = response.server_token,
            cursor = cursor.last_token,
            "Push complete"
        );

        Ok(PushReport {
            sent: batch.len(),
            accepted,
            removed,
            server_token: Some(response.server_token),
            cursor: cursor.last_token,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
