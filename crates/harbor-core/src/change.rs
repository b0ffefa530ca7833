//! # Change Records
//!
//! The three shapes a single change takes on its way through the system.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Change Lifecycle                                │
//! │                                                                         │
//! │  OUTGOING                                                               │
//! │  business mutation ──► ChangeRecord (outbox, local token)               │
//! │                             │                                           │
//! │                             ▼ .envelope()                               │
//! │                        ChangeEnvelope ──► push batch ──► server         │
//! │                                                                         │
//! │  INCOMING                                                               │
//! │  server ──► pull batch ──► ChangeEnvelope                               │
//! │                                 │                                       │
//! │                                 ▼ .into_inbox_entry(token, now)         │
//! │                            InboxEntry (audit log, never re-read)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The envelope is a change without the local-only token: the server has
//! no idea how this terminal numbers its rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::kind::EntityKind;

// =============================================================================
// Change Operation
// =============================================================================

/// What a change does to the entity identified by its public id.
///
/// Carried as a small integer both on the wire and in SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i32)]
pub enum ChangeOperation {
    /// Insert if absent, otherwise overwrite every field.
    Upsert = 0,
    /// Remove if present, otherwise nothing.
    Delete = 1,
}

impl ChangeOperation {
    /// Integer code used on the wire.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Parses a wire code.
    pub fn from_code(code: i64) -> CoreResult<Self> {
        match code {
            0 => Ok(ChangeOperation::Upsert),
            1 => Ok(ChangeOperation::Delete),
            other => Err(CoreError::UnknownOperation(other)),
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeOperation::Upsert => f.write_str("upsert"),
            ChangeOperation::Delete => f.write_str("delete"),
        }
    }
}

impl Serialize for ChangeOperation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for ChangeOperation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        ChangeOperation::from_code(code).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Change Record (outbox row)
// =============================================================================

/// A locally produced change waiting in the outbox.
///
/// Written in the same transaction as the mutation that caused it and
/// removed once the server acknowledges it. Never updated in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Local, strictly increasing sequence number.
    pub token: i64,
    pub entity_kind: String,
    pub public_id: Uuid,
    pub operation: ChangeOperation,
    /// Serialized entity document (JSON).
    pub payload: String,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeRecord {
    /// Strips the local token, producing what goes on the wire.
    pub fn envelope(&self) -> ChangeEnvelope {
        ChangeEnvelope {
            entity_kind: self.entity_kind.clone(),
            public_id: self.public_id,
            operation: self.operation,
            payload: self.payload.clone(),
            occurred_at: self.occurred_at,
        }
    }
}

// =============================================================================
// Change Envelope (wire form)
// =============================================================================

/// One change as exchanged with the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEnvelope {
    pub entity_kind: String,
    pub public_id: Uuid,
    pub operation: ChangeOperation,
    pub payload: String,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEnvelope {
    /// Looks the kind name up in the registry.
    ///
    /// `None` means the kind is unsupported by this build, not that the
    /// envelope is malformed.
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::resolve(&self.entity_kind)
    }

    /// Stamps the envelope with a local inbox token.
    pub fn into_inbox_entry(self, token: i64, received_at: DateTime<Utc>) -> InboxEntry {
        InboxEntry {
            token,
            entity_kind: self.entity_kind,
            public_id: self.public_id,
            operation: self.operation,
            payload: self.payload,
            occurred_at: self.occurred_at,
            received_at,
        }
    }
}

// =============================================================================
// Inbox Entry (audit row)
// =============================================================================

/// Audit record of an envelope received by a pull.
///
/// Written once, never deleted, never read by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct InboxEntry {
    /// Local inbox sequence number.
    pub token: i64,
    pub entity_kind: String,
    pub public_id: Uuid,
    pub operation: ChangeOperation,
    pub payload: String,
    pub occurred_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
