//! # Sync Inbox Repository
//!
//! Append-only audit log of envelopes applied by the pull pipeline.
//!
//! The engine writes here and never reads back; the read methods exist
//! for diagnostics and tests.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use harbor_core::InboxEntry;

/// Repository for the sync inbox.
#[derive(Debug, Clone)]
pub struct InboxRepository {
    pool: SqlitePool,
}

impl InboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InboxRepository { pool }
    }

    /// Writes one audit row inside the pull transaction.
    ///
    /// Fails with `DbError::UniqueViolation` if the token is already taken.
    pub async fn append(conn: &mut SqliteConnection, entry: &InboxEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_inbox (
                token, entity_kind, public_id, operation, payload, occurred_at, received_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(entry.token)
        .bind(entry.entity_kind.as_str())
        .bind(entry.public_id)
        .bind(entry.operation)
        .bind(entry.payload.as_str())
        .bind(entry.occurred_at)
        .bind(entry.received_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Highest token written so far, `None` on an empty inbox.
    pub async fn max_token(conn: &mut SqliteConnection) -> DbResult<Option<i64>> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(token) FROM sync_inbox")
            .fetch_one(&mut *conn)
            .await?;

        Ok(max)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_inbox")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// The `limit` most recent rows, in ascending token order.
    pub async fn latest(&self, limit: u32) -> DbResult<Vec<InboxEntry>> {
        let mut rows = sqlx::query_as::<_, InboxEntry>(
            r#"
            SELECT token, entity_kind, public_id, operation, payload, occurred_at, received_at
            FROM sync_inbox
            ORDER BY token DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.reverse();
        Ok(rows)
    }
}
