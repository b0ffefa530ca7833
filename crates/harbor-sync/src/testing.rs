//! Scripted transport for unit tests.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::protocol::{PullResponse, PushRequest, PushResponse, WireChange};
use crate::transport::SyncTransport;
use harbor_core::ChangeOperation;

/// Replays queued responses and records every request.
///
/// With an empty queue, push acknowledges the whole batch and pull returns
/// no changes, both with server token 0.
pub(crate) struct ScriptedTransport {
    push_script: Mutex<VecDeque<SyncResult<PushResponse>>>,
    pull_script: Mutex<VecDeque<SyncResult<PullResponse>>>,
    pushed: Mutex<Vec<PushRequest>>,
    pulled: Mutex<Vec<(String, i64, usize)>>,
    reachable: Mutex<bool>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        ScriptedTransport {
            push_script: Mutex::new(VecDeque::new()),
            pull_script: Mutex::new(VecDeque::new()),
            pushed: Mutex::new(Vec::new()),
            pulled: Mutex::new(Vec::new()),
            reachable: Mutex::new(true),
        }
    }

    pub(crate) fn push_ok(&self, accepted: u32, server_token: i64) {
        self.push_script.lock().unwrap().push_back(Ok(PushResponse {
            accepted,
            server_token,
        }));
    }

    pub(crate) fn push_err(&self, error: SyncError) {
        self.push_script.lock().unwrap().push_back(Err(error));
    }

    pub(crate) fn pull_ok(&self, changes: Vec<WireChange>, server_token: i64) {
        self.pull_script.lock().unwrap().push_back(Ok(PullResponse {
            changes,
            server_token,
        }));
    }

    pub(crate) fn pull_err(&self, error: SyncError) {
        self.pull_script.lock().unwrap().push_back(Err(error));
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        *self.reachable.lock().unwrap() = reachable;
    }

    pub(crate) fn pushed(&self) -> Vec<PushRequest> {
        self.pushed.lock().unwrap().clone()
    }

    pub(crate) fn pulled(&self) -> Vec<(String, i64, usize)> {
        self.pulled.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncTransport for ScriptedTransport {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.pushed.lock().unwrap().push(request.clone());
        self.push_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(PushResponse {
                    accepted: request.changes.len() as u32,
                    server_token: 0,
                })
            })
    }

    async fn pull(&self, terminal_id: &str, since: i64, max: usize) -> SyncResult<PullResponse> {
        self.pulled
            .lock()
            .unwrap()
            .push((terminal_id.to_string(), since, max));
        self.pull_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(PullResponse {
                    changes: Vec::new(),
                    server_token: 0,
                })
            })
    }

    async fn ping(&self) -> bool {
        *self.reachable.lock().unwrap()
    }
}

/// Builds a wire change carrying `payload` as JSON.
pub(crate) fn wire_change(
    entity: &str,
    public_id: Uuid,
    op: ChangeOperation,
    payload: &impl Serialize,
) -> WireChange {
    WireChange {
        entity: entity.to_string(),
        public_id,
        op: op.code().into(),
        payload_json: serde_json::to_string(payload).unwrap(),
        ts_utc: Utc::now(),
    }
}
