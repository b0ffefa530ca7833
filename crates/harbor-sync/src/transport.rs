//! # Sync Transport
//!
//! The seam between the engine and the wire.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SyncEngine ──► Arc<dyn SyncTransport>                                  │
//! │                      │                                                  │
//! │                      ├── HttpTransport    (reqwest, production)         │
//! │                      └── scripted doubles (tests)                       │
//! │                                                                         │
//! │  push  fails on any non-success outcome, body kept for diagnostics     │
//! │  pull  same failure contract                                            │
//! │  ping  advisory only; never consulted by push or pull                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::protocol::{PullResponse, PushRequest, PushResponse};

/// Wire-level operations the sync engine depends on.
///
/// Implementations must not touch local storage.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Sends a batch of local changes.
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;

    /// Fetches up to `max` changes newer than `since`.
    async fn pull(&self, terminal_id: &str, since: i64, max: usize) -> SyncResult<PullResponse>;

    /// Returns true if the server answers its health probe.
    async fn ping(&self) -> bool;
}
