//! # harbor-core: Pure Sync Types for Harbor POS
//!
//! Everything the storage layer and the sync engine agree on, with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Harbor Sync Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    harbor-sync (engine)                         │   │
//! │  │    push pipeline ──► transport ◄── pull pipeline ──► apply      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ harbor-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   kind    │  │  change   │  │  cursor   │  │ entities  │  │   │
//! │  │   │ registry  │  │  records  │  │ watermark │  │ Product.. │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    harbor-db (Database Layer)                   │   │
//! │  │          sync_outbox, sync_inbox, sync_cursor, entity tables    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`kind`] - Closed registry of synchronizable entity kinds
//! - [`change`] - Change records, envelopes and inbox entries
//! - [`cursor`] - Watermark cursor and the local token sequence
//! - [`entities`] - Entity structs carried in change payloads
//! - [`error`] - Domain error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod change;
pub mod cursor;
pub mod entities;
pub mod error;
pub mod kind;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use change::{ChangeEnvelope, ChangeOperation, ChangeRecord, InboxEntry};
pub use cursor::{CursorAdvance, SyncCursor, TokenSequence};
pub use entities::{
    Account, Customer, Employee, LedgerEntry, Product, Purchase, Sale, Setting, Supplier,
    SyncEntity,
};
pub use error::{CoreError, CoreResult};
pub use kind::{EntityCategory, EntityKind};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Name of the cursor row tracking the central server.
pub const DEFAULT_CURSOR_NAME: &str = "server";

/// Upper bound on changes moved in a single push or pull.
///
/// Bounds both memory use and the size of the local transaction that
/// commits a cycle. Larger backlogs are drained by calling again.
pub const MAX_BATCH_SIZE: usize = 500;
