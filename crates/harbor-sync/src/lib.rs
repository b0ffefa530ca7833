//! # harbor-sync: Sync Engine for Harbor POS
//!
//! Offline-first synchronization between a register and the central server.
//! Every sale, price change and ledger entry is written locally first; this
//! crate moves those changes up and brings server changes down whenever the
//! network allows.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Architecture                                │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   SyncAgent (background loop)                    │  │
//! │  │                                                                  │  │
//! │  │  Poll timer, sync_now(), exponential backoff, status events     │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   SyncEngine (push / pull)                       │  │
//! │  └───────┬─────────────────────┬──────────────────────┬─────────────┘  │
//! │          ▼                     ▼                      ▼                 │
//! │  ┌────────────────┐  ┌────────────────────┐  ┌────────────────────┐    │
//! │  │ SyncTransport  │  │   ApplyEngine      │  │ harbor-db          │    │
//! │  │                │  │                    │  │                    │    │
//! │  │ HttpTransport  │  │ Decodes payloads   │  │ sync_outbox        │    │
//! │  │ JSON over HTTP │  │ Upsert/delete by   │  │ sync_inbox         │    │
//! │  │                │  │ public id          │  │ sync_cursor        │    │
//! │  │                │  │ Posted-doc guard   │  │ entity tables      │    │
//! │  └────────────────┘  └────────────────────┘  └────────────────────┘    │
//! │                                                                         │
//! │  GUARANTEES:                                                            │
//! │  • Outbox rows leave only after the server acknowledged them           │
//! │  • A pull batch lands entirely or not at all                           │
//! │  • The cursor never moves backwards                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`agent`] - Background `SyncAgent` and its handle
//! - [`apply`] - Applies server changes to the entity tables
//! - [`config`] - Terminal, server and sync settings (TOML + env)
//! - [`engine`] - `SyncEngine`, options and reports
//! - [`error`] - Sync error types
//! - [`http`] - reqwest implementation of the transport
//! - [`protocol`] - JSON bodies of the sync endpoints
//! - [`transport`] - The `SyncTransport` trait
//!
//! ## Usage
//!
//! ```rust,ignore
//! use harbor_sync::{AgentOptions, EngineOptions, HttpTransport, SyncAgent, SyncConfig, SyncEngine};
//!
//! let config = SyncConfig::load_or_default(None);
//! let transport = Arc::new(HttpTransport::from_config(&config)?);
//! let engine = Arc::new(SyncEngine::new(db, transport, EngineOptions::from_config(&config)));
//!
//! let (handle, task) = SyncAgent::new(engine, AgentOptions::from_config(&config)).spawn();
//!
//! handle.sync_now();
//! println!("Pending: {}", handle.status().await.pending_changes);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod apply;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod protocol;
pub mod transport;

mod pull;
mod push;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{AgentOptions, NoOpEmitter, SyncAgent, SyncAgentHandle, SyncEventEmitter, SyncStatus};
pub use apply::{ApplyEngine, ApplyOutcome};
pub use config::{ServerConfig, SyncConfig, SyncSettings, TerminalConfig};
pub use engine::{EngineOptions, PullReport, PushReport, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use http::HttpTransport;
pub use protocol::{PullResponse, PushRequest, PushResponse, WireChange};
pub use transport::SyncTransport;

pub use tokio_util::sync::CancellationToken;
