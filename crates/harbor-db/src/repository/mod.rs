//! # Repository Module
//!
//! SQL for the sync bookkeeping tables and the entity tables.
//!
//! ## Two Calling Styles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Standalone (diagnostics, tests)        Inside a transaction            │
//! │  ─────────────────────────────          ────────────────────            │
//! │  db.outbox().count_pending()            let mut tx = db.begin().await?; │
//! │  db.inbox().latest(20)                  OutboxRepository::enqueue(      │
//! │  db.cursors().get("server")                 &mut *tx, ...)              │
//! │                                         CursorRepository::store(        │
//! │  hold a pool clone                          &mut *tx, &cursor)          │
//! │                                         tx.commit().await?;             │
//! │                                                                         │
//! │  Associated functions take `&mut SqliteConnection` so the push and      │
//! │  pull pipelines can group several writes into one commit.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`OutboxRepository`](outbox::OutboxRepository) - Pending local changes
//! - [`InboxRepository`](inbox::InboxRepository) - Audit log of applied changes
//! - [`CursorRepository`](cursor::CursorRepository) - Per-endpoint watermark
//! - [`entity`] - `EntityTable` mapping and generic identity-keyed CRUD

pub mod cursor;
pub mod entity;
pub mod inbox;
pub mod outbox;
