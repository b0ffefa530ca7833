//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use harbor_core::ChangeOperation;
use harbor_db::{Database, DbConfig};
use harbor_sync::{
    EngineOptions, PullResponse, PushRequest, PushResponse, SyncEngine, SyncError, SyncResult,
    SyncTransport, WireChange,
};

// =============================================================================
// Scripted transport
// =============================================================================

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    pushes: Mutex<VecDeque<SyncResult<PushResponse>>>,
    pulls: Mutex<VecDeque<SyncResult<PullResponse>>>,
    pub push_requests: Mutex<Vec<PushRequest>>,
    pub pull_requests: Mutex<Vec<(String, i64, usize)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_push(&self, accepted: u32, server_token: i64) {
        self.pushes.lock().unwrap().push_back(Ok(PushResponse {
            accepted,
            server_token,
        }));
    }

    pub fn on_push_error(&self, error: SyncError) {
        self.pushes.lock().unwrap().push_back(Err(error));
    }

    pub fn on_pull(&self, changes: Vec<WireChange>, server_token: i64) {
        self.pulls.lock().unwrap().push_back(Ok(PullResponse {
            changes,
            server_token,
        }));
    }

    pub fn on_pull_error(&self, error: SyncError) {
        self.pulls.lock().unwrap().push_back(Err(error));
    }

    pub fn push_count(&self) -> usize {
        self.push_requests.lock().unwrap().len()
    }

    pub fn pull_count(&self) -> usize {
        self.pull_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SyncTransport for ScriptedTransport {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.push_requests.lock().unwrap().push(request.clone());
        self.pushes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Internal("no scripted push response".into())))
    }

    async fn pull(&self, terminal_id: &str, since: i64, max: usize) -> SyncResult<PullResponse> {
        self.pull_requests
            .lock()
            .unwrap()
            .push((terminal_id.to_string(), since, max));
        self.pulls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Internal("no scripted pull response".into())))
    }

    async fn ping(&self) -> bool {
        true
    }
}

// =============================================================================
// In-memory server
// =============================================================================

/// A server that keeps one global change log.
///
/// Push appends every change; the server token is the log length. Pull
/// serves the log after `since`.
#[derive(Default)]
pub struct MemoryServer {
    log: Mutex<Vec<WireChange>>,
}

impl MemoryServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

#[async_trait]
impl SyncTransport for MemoryServer {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        let mut log = self.log.lock().unwrap();
        log.extend(request.changes.iter().cloned());
        Ok(PushResponse {
            accepted: request.changes.len() as u32,
            server_token: log.len() as i64,
        })
    }

    async fn pull(&self, _terminal_id: &str, since: i64, max: usize) -> SyncResult<PullResponse> {
        let log = self.log.lock().unwrap();
        let start = (since.max(0) as usize).min(log.len());
        let end = (start + max).min(log.len());
        Ok(PullResponse {
            changes: log[start..end].to_vec(),
            server_token: end as i64,
        })
    }

    async fn ping(&self) -> bool {
        true
    }
}

// =============================================================================
// Builders
// =============================================================================

pub async fn engine_with(transport: Arc<dyn SyncTransport>, terminal: &str) -> SyncEngine {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database");
    SyncEngine::new(db, transport, EngineOptions::new(terminal))
}

pub fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("RFC 3339 timestamp")
}

pub fn change(entity: &str, public_id: Uuid, op: ChangeOperation, payload: &impl Serialize) -> WireChange {
    WireChange {
        entity: entity.to_string(),
        public_id,
        op: op.code().into(),
        payload_json: serde_json::to_string(payload).expect("payload serializes"),
        ts_utc: ts("2024-03-01T12:00:00Z"),
    }
}

pub fn raw_change(entity: &str, public_id: Uuid, payload_json: &str) -> WireChange {
    WireChange {
        entity: entity.to_string(),
        public_id,
        op: ChangeOperation::Upsert.code().into(),
        payload_json: payload_json.to_string(),
        ts_utc: ts("2024-03-01T12:00:00Z"),
    }
}

/// Inserts an outbox row with an explicit token.
pub async fn seed_outbox(db: &Database, token: i64) {
    sqlx::query(
        "INSERT INTO sync_outbox (token, entity_kind, public_id, operation, payload, occurred_at) \
         VALUES (?1, 'Setting', ?2, 0, '{}', ?3)",
    )
    .bind(token)
    .bind(Uuid::new_v4())
    .bind(ts("2024-03-01T12:00:00Z"))
    .execute(db.pool())
    .await
    .expect("seed outbox row");
}

pub async fn outbox_tokens(db: &Database) -> Vec<i64> {
    sqlx::query_scalar("SELECT token FROM sync_outbox ORDER BY token")
        .fetch_all(db.pool())
        .await
        .expect("read outbox tokens")
}

pub async fn inbox_tokens(db: &Database) -> Vec<i64> {
    sqlx::query_scalar("SELECT token FROM sync_inbox ORDER BY token")
        .fetch_all(db.pool())
        .await
        .expect("read inbox tokens")
}
