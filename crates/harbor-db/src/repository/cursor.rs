//! # Sync Cursor Repository
//!
//! One watermark row per remote endpoint.
//!
//! ```text
//! sync_cursor
//! ┌──────────┬────────────┐
//! │ name  PK │ last_token │
//! ├──────────┼────────────┤
//! │ "server" │        103 │   created lazily at 0, only ever raised
//! └──────────┴────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use harbor_core::SyncCursor;

/// Repository for cursor rows.
#[derive(Debug, Clone)]
pub struct CursorRepository {
    pool: SqlitePool,
}

impl CursorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CursorRepository { pool }
    }

    /// Reads the named cursor, creating it at token 0 on first use.
    pub async fn get_or_create(conn: &mut SqliteConnection, name: &str) -> DbResult<SyncCursor> {
        sqlx::query("INSERT OR IGNORE INTO sync_cursor (name, last_token) VALUES (?1, 0)")
            .bind(name)
            .execute(&mut *conn)
            .await?;

        let cursor = sqlx::query_as::<_, SyncCursor>(
            "SELECT name, last_token FROM sync_cursor WHERE name = ?1",
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

        Ok(cursor)
    }

    /// Persists the cursor's token.
    ///
    /// The stored value is raised to `last_token` but never lowered, so a
    /// stale in-memory cursor cannot move the row backwards.
    pub async fn store(conn: &mut SqliteConnection, cursor: &SyncCursor) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_cursor (name, last_token) VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET last_token = MAX(last_token, excluded.last_token)
            "#,
        )
        .bind(cursor.name.as_str())
        .bind(cursor.last_token)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Reads the named cursor without creating it.
    pub async fn get(&self, name: &str) -> DbResult<Option<SyncCursor>> {
        let cursor = sqlx::query_as::<_, SyncCursor>(
            "SELECT name, last_token FROM sync_cursor WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cursor)
    }

    /// Sets the named cursor, creating it if needed. Never lowers it.
    pub async fn set(&self, name: &str, last_token: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        let cursor = SyncCursor {
            name: name.to_string(),
            last_token,
        };
        Self::store(&mut conn, &cursor).await
    }
}
