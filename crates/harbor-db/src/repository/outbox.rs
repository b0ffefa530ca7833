//! # Sync Outbox Repository
//!
//! The durable queue of locally produced changes.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  LOCAL MUTATION (e.g. Database::save_entity)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │  1. INSERT/UPDATE products ... WHERE public_id = ?             │   │
//! │  │  2. INSERT INTO sync_outbox (entity_kind, public_id, ...)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← Both succeed or both fail                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   PUSH PIPELINE (harbor-sync)                   │   │
//! │  │  1. pending(500)               oldest token first               │   │
//! │  │  2. POST /api/sync/push                                         │   │
//! │  │  3. remove_through(token of k-th accepted row)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Rows are never updated. A row is either pending or gone.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tokens come from `INTEGER PRIMARY KEY AUTOINCREMENT`, so they strictly
//! increase and are never reused after the queue drains.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use harbor_core::{ChangeOperation, ChangeRecord, EntityKind};

const SELECT_COLUMNS: &str = "token, entity_kind, public_id, operation, payload, occurred_at";

/// Repository for sync outbox operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    // =========================================================================
    // Transactional operations
    // =========================================================================

    /// Appends a change to the outbox inside the caller's transaction.
    ///
    /// ## Arguments
    /// * `conn` - Connection or `&mut *tx` of the transaction performing the
    ///   business mutation
    /// * `payload` - JSON serialization of the entity
    ///
    /// ## Returns
    /// The token assigned to the new row.
    pub async fn enqueue(
        conn: &mut SqliteConnection,
        kind: EntityKind,
        public_id: Uuid,
        operation: ChangeOperation,
        payload: &str,
        occurred_at: DateTime<Utc>,
    ) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_outbox (entity_kind, public_id, operation, payload, occurred_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(kind.name())
        .bind(public_id)
        .bind(operation)
        .bind(payload)
        .bind(occurred_at)
        .execute(&mut *conn)
        .await?;

        let token = result.last_insert_rowid();

        debug!(
            token,
            entity_kind = %kind,
            public_id = %public_id,
            operation = %operation,
            "Change queued in outbox"
        );

        Ok(token)
    }

    /// Reads up to `limit` pending changes, lowest token first.
    pub async fn pending_in(conn: &mut SqliteConnection, limit: u32) -> DbResult<Vec<ChangeRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM sync_outbox ORDER BY token ASC LIMIT ?1");

        let rows = sqlx::query_as::<_, ChangeRecord>(&sql)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows)
    }

    /// Deletes every row with `token <= through`.
    ///
    /// Given a batch read by [`pending_in`](Self::pending_in), passing the
    /// token of its k-th row removes exactly the k oldest rows: rows enqueued
    /// after the read always carry higher tokens.
    ///
    /// ## Returns
    /// Number of rows removed.
    pub async fn remove_through(conn: &mut SqliteConnection, through: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM sync_outbox WHERE token <= ?1")
            .bind(through)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Pending changes, lowest token first.
    pub async fn pending(&self, limit: u32) -> DbResult<Vec<ChangeRecord>> {
        let mut conn = self.pool.acquire().await?;
        Self::pending_in(&mut conn, limit).await
    }

    /// Number of changes waiting to be pushed.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_outbox")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// The oldest pending change, if any.
    pub async fn oldest_pending(&self) -> DbResult<Option<ChangeRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM sync_outbox ORDER BY token ASC LIMIT 1");

        let row = sqlx::query_as::<_, ChangeRecord>(&sql)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
