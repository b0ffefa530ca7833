//! # Sync Agent
//!
//! Background loop that drives the [`SyncEngine`] on a timer, on demand and
//! with backoff after failures.
//!
//! ## Agent Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Loop                                   │
//! │                                                                         │
//! │   ┌──────────── wait for ─────────────┐                                 │
//! │   │  shutdown      ──► exit           │                                 │
//! │   │  sync_now()    ──► cycle          │                                 │
//! │   │  delay elapsed ──► cycle          │                                 │
//! │   └───────────────────────────────────┘                                 │
//! │                                                                         │
//! │   CYCLE:                                                                │
//! │   ──────                                                                │
//! │   1. ping            (advisory, recorded in status)                     │
//! │   2. push until the outbox has no full batch left                       │
//! │   3. pull until the server returns a short batch                        │
//! │   4. refresh status, emit to listeners                                  │
//! │                                                                         │
//! │   ok              ──► delay = poll_interval, backoff reset              │
//! │   retryable error ──► delay = next exponential backoff                  │
//! │   other error     ──► delay = poll_interval                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The agent is the single caller of push and pull in a running process;
//! manual syncs go through [`SyncAgentHandle::sync_now`].

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Sync Status
// =============================================================================

/// Current sync status for external queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Result of the last health probe.
    pub server_reachable: bool,

    /// Outbox rows waiting to be pushed.
    pub pending_changes: i64,

    /// Last known server watermark.
    pub cursor: i64,

    /// End of the last cycle that finished without error.
    pub last_success: Option<DateTime<Utc>>,

    /// Message of the last failed cycle; cleared on success.
    pub last_error: Option<String>,

    /// Failed cycles since the last success.
    pub consecutive_failures: u32,

    /// True while a cycle is running.
    pub in_progress: bool,
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives agent notifications (status bar, logs, UI bridge).
pub trait SyncEventEmitter: Send + Sync {
    /// Called after every cycle.
    fn emit_status(&self, status: &SyncStatus);

    /// Called when a cycle moved data in either direction.
    fn emit_progress(&self, pushed: usize, pulled: usize);

    /// Called when a cycle fails.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// Emitter that drops every event.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_progress(&self, _pushed: usize, _pulled: usize) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Agent Options
// =============================================================================

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentOptions {
    /// Delay between successful cycles.
    pub poll_interval: Duration,
    /// First delay after a retryable failure.
    pub initial_backoff: Duration,
    /// Upper bound for the failure delay.
    pub max_backoff: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        AgentOptions {
            poll_interval: Duration::from_secs(30),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(300),
        }
    }
}

impl AgentOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        AgentOptions {
            poll_interval: config.poll_interval(),
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Data moved by one cycle.
#[derive(Debug, Clone, Copy, Default)]
struct CycleSummary {
    pushed: usize,
    pulled: usize,
}

// =============================================================================
// Sync Agent
// =============================================================================

/// Drives one engine until shut down.
pub struct SyncAgent {
    engine: Arc<SyncEngine>,
    options: AgentOptions,
    status: Arc<RwLock<SyncStatus>>,
    emitter: Arc<dyn SyncEventEmitter>,
    trigger: Arc<Notify>,
    cancel: CancellationToken,
}

impl SyncAgent {
    pub fn new(engine: Arc<SyncEngine>, options: AgentOptions) -> Self {
        Self::with_emitter(engine, options, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(
        engine: Arc<SyncEngine>,
        options: AgentOptions,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        SyncAgent {
            engine,
            options,
            status: Arc::new(RwLock::new(SyncStatus::default())),
            emitter,
            trigger: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Starts the loop on the current runtime.
    ///
    /// The first cycle runs immediately.
    ///
    /// ## Returns
    /// A handle for control and the task, which finishes after shutdown.
    pub fn spawn(self) -> (SyncAgentHandle, JoinHandle<()>) {
        let handle = SyncAgentHandle {
            status: self.status.clone(),
            trigger: self.trigger.clone(),
            cancel: self.cancel.clone(),
        };

        info!(
            terminal_id = %self.engine.options().terminal_id,
            poll_interval_secs = self.options.poll_interval.as_secs(),
            "Starting sync agent"
        );

        let task = tokio::spawn(self.run());
        (handle, task)
    }

    async fn run(self) {
        let mut backoff = self.options.backoff();
        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.trigger.notified() => debug!("Manual sync requested"),
                _ = tokio::time::sleep(delay) => {}
            }

            match self.run_cycle().await {
                Ok(summary) => {
                    backoff.reset();
                    delay = self.options.poll_interval;
                    if summary.pushed > 0 || summary.pulled > 0 {
                        self.emitter.emit_progress(summary.pushed, summary.pulled);
                    }
                }
                Err(SyncError::Cancelled) => break,
                Err(e) => {
                    let retryable = e.is_retryable();
                    delay = if retryable {
                        backoff.next_backoff().unwrap_or(self.options.max_backoff)
                    } else {
                        self.options.poll_interval
                    };

                    if retryable {
                        warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "Sync cycle failed");
                    } else if e.is_protocol_error() {
                        error!(error = %e, "Sync cycle failed; client and server disagree on the wire format");
                    } else {
                        error!(error = %e, "Sync cycle failed");
                    }

                    self.record_failure(&e).await;
                    self.emitter.emit_error(&e.to_string(), retryable);
                }
            }
        }

        self.status.write().await.in_progress = false;
        info!("Sync agent stopped");
    }

    async fn run_cycle(&self) -> SyncResult<CycleSummary> {
        self.status.write().await.in_progress = true;

        let reachable = self.engine.ping().await;
        self.status.write().await.server_reachable = reachable;
        if !reachable {
            debug!("Health probe failed; attempting sync anyway");
        }

        let batch_size = self.engine.options().batch_size;
        let mut summary = CycleSummary::default();

        loop {
            let report = self.engine.push(&self.cancel).await?;
            summary.pushed += report.accepted;
            if !report.may_have_more(batch_size) {
                break;
            }
        }

        loop {
            let before = self.engine.cursor_token().await?;
            let report = self.engine.pull(&self.cancel).await?;
            summary.pulled += report.received;
            // A full batch that did not move the cursor would repeat forever
            if !report.may_have_more(batch_size) || report.cursor <= before {
                break;
            }
        }

        self.record_success().await?;
        Ok(summary)
    }

    async fn record_success(&self) -> SyncResult<()> {
        let pending = self.engine.pending_count().await?;
        let cursor = self.engine.cursor_token().await?;

        let snapshot = {
            let mut s = self.status.write().await;
            s.pending_changes = pending;
            s.cursor = cursor;
            s.last_success = Some(Utc::now());
            s.last_error = None;
            s.consecutive_failures = 0;
            s.in_progress = false;
            s.clone()
        };

        self.emitter.emit_status(&snapshot);
        Ok(())
    }

    async fn record_failure(&self, e: &SyncError) {
        let pending = self.engine.pending_count().await.ok();

        let snapshot = {
            let mut s = self.status.write().await;
            if let Some(pending) = pending {
                s.pending_changes = pending;
            }
            s.last_error = Some(e.to_string());
            s.consecutive_failures = s.consecutive_failures.saturating_add(1);
            s.in_progress = false;
            s.clone()
        };

        self.emitter.emit_status(&snapshot);
    }
}

// =============================================================================
// Agent Handle (for external control)
// =============================================================================

/// Controls a running [`SyncAgent`].
#[derive(Clone)]
pub struct SyncAgentHandle {
    status: Arc<RwLock<SyncStatus>>,
    trigger: Arc<Notify>,
    cancel: CancellationToken,
}

impl SyncAgentHandle {
    /// Gets the current sync status.
    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    /// Runs a cycle as soon as the current one, if any, finishes.
    pub fn sync_now(&self) {
        self.trigger.notify_one();
    }

    /// Stops the loop. An in-flight request is abandoned; a transaction
    /// that is already committing finishes.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}
