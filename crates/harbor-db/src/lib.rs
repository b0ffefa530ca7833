//! # harbor-db: Local Storage for Harbor POS Sync
//!
//! SQLite persistence for the outbox, inbox, cursor and entity tables,
//! using sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Harbor Sync Data Flow                            │
//! │                                                                         │
//! │  harbor-sync (push / pull / apply)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     harbor-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Outbox        │    │ 001_sync     │  │   │
//! │  │   │ SqlitePool    │◄───│ Inbox         │    │ 002_entities │  │   │
//! │  │   │ Transactions  │    │ Cursor        │    │              │  │   │
//! │  │   │ save/delete   │    │ EntityTable   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, transactions, local change capture
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Outbox, inbox, cursor and entity table access
//!
//! ## Usage
//!
//! ```rust,ignore
//! use harbor_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/harbor.db")).await?;
//!
//! // Mutation + outbox row, one transaction
//! let token = db.save_entity(&product).await?;
//!
//! assert_eq!(db.outbox().count_pending().await?, 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cursor::CursorRepository;
pub use repository::entity::{EntityTable, UpsertOutcome};
pub use repository::inbox::InboxRepository;
pub use repository::outbox::OutboxRepository;
