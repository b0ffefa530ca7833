//! # Apply/Merge Engine
//!
//! Turns one pulled envelope into a local table mutation.
//!
//! ## Decision Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  kind not in registry ───────────────────────────► SkippedUnknownKind   │
//! │  payload does not decode ────────────────────────► Err(PayloadDecode)   │
//! │                                                                         │
//! │  DELETE  row absent ─────────────────────────────► MissingNoop          │
//! │          row present, posted document, guarded ──► Rejected             │
//! │          row present ────────────────────────────► Deleted              │
//! │                                                                         │
//! │  UPSERT  row absent ─────────────────────────────► Inserted             │
//! │          row equals payload ─────────────────────► Unchanged            │
//! │          row differs, posted document, guarded ──► Rejected             │
//! │          row differs ────────────────────────────► Updated (full        │
//! │                                                    replace, LWW)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Applying the same envelope twice leaves the same row state as applying
//! it once. Runs inside the pull transaction; nothing here commits.

use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use harbor_core::{
    Account, ChangeEnvelope, ChangeOperation, Customer, Employee, EntityKind, LedgerEntry, Product,
    Purchase, Sale, Setting, Supplier,
};
use harbor_db::repository::entity;
use harbor_db::EntityTable;

/// What applying an envelope did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Updated,
    /// Upsert of a row that already held the same values.
    Unchanged,
    Deleted,
    /// Delete of a row that does not exist locally.
    MissingNoop,
    /// The kind is not in the registry; nothing was touched.
    SkippedUnknownKind,
    /// A posted document would have been overwritten or deleted.
    Rejected,
}

impl ApplyOutcome {
    /// Returns true if a local entity table changed.
    pub fn mutated(self) -> bool {
        matches!(
            self,
            ApplyOutcome::Inserted | ApplyOutcome::Updated | ApplyOutcome::Deleted
        )
    }
}

/// Applies envelopes to the local entity tables.
#[derive(Debug, Clone, Copy)]
pub struct ApplyEngine {
    guard_posted_documents: bool,
}

impl Default for ApplyEngine {
    fn default() -> Self {
        ApplyEngine {
            guard_posted_documents: true,
        }
    }
}

impl ApplyEngine {
    /// ## Arguments
    /// * `guard_posted_documents` - When false, posted documents follow the
    ///   same last-writer-wins rule as master data.
    pub fn new(guard_posted_documents: bool) -> Self {
        ApplyEngine {
            guard_posted_documents,
        }
    }

    /// Applies one envelope.
    ///
    /// ## Returns
    /// * `Ok(outcome)` - Including skips and rejections, which are not errors
    /// * `Err(SyncError::PayloadDecode)` - The caller must abort the batch
    pub async fn apply(
        &self,
        conn: &mut SqliteConnection,
        envelope: &ChangeEnvelope,
    ) -> SyncResult<ApplyOutcome> {
        let Some(kind) = envelope.kind() else {
            warn!(
                entity_kind = %envelope.entity_kind,
                public_id = %envelope.public_id,
                "Skipping change for unsupported entity kind"
            );
            return Ok(ApplyOutcome::SkippedUnknownKind);
        };

        match kind {
            EntityKind::Product => self.apply_as::<Product>(conn, envelope).await,
            EntityKind::Customer => self.apply_as::<Customer>(conn, envelope).await,
            EntityKind::Supplier => self.apply_as::<Supplier>(conn, envelope).await,
            EntityKind::Setting => self.apply_as::<Setting>(conn, envelope).await,
            EntityKind::Account => self.apply_as::<Account>(conn, envelope).await,
            EntityKind::Sale => self.apply_as::<Sale>(conn, envelope).await,
            EntityKind::Purchase => self.apply_as::<Purchase>(conn, envelope).await,
            EntityKind::LedgerEntry => self.apply_as::<LedgerEntry>(conn, envelope).await,
            EntityKind::Employee => self.apply_as::<Employee>(conn, envelope).await,
        }
    }

    async fn apply_as<E: EntityTable>(
        &self,
        conn: &mut SqliteConnection,
        envelope: &ChangeEnvelope,
    ) -> SyncResult<ApplyOutcome> {
        let incoming = decode::<E>(envelope)?;
        let guarded = self.guard_posted_documents && E::KIND.is_append_only();
        let existing = entity::find::<E>(conn, envelope.public_id).await?;

        let outcome = match (envelope.operation, existing) {
            (ChangeOperation::Delete, None) => ApplyOutcome::MissingNoop,
            (ChangeOperation::Delete, Some(_)) if guarded => ApplyOutcome::Rejected,
            (ChangeOperation::Delete, Some(_)) => {
                entity::delete::<E>(conn, envelope.public_id).await?;
                ApplyOutcome::Deleted
            }

            (ChangeOperation::Upsert, None) => {
                entity::insert(conn, &incoming).await?;
                ApplyOutcome::Inserted
            }
            (ChangeOperation::Upsert, Some(current)) if current == incoming => {
                ApplyOutcome::Unchanged
            }
            (ChangeOperation::Upsert, Some(_)) if guarded => ApplyOutcome::Rejected,
            (ChangeOperation::Upsert, Some(_)) => {
                entity::update(conn, &incoming).await?;
                ApplyOutcome::Updated
            }
        };

        if outcome == ApplyOutcome::Rejected {
            warn!(
                entity_kind = %E::KIND,
                public_id = %envelope.public_id,
                operation = %envelope.operation,
                "Refusing to modify posted document; keeping local row"
            );
        } else {
            debug!(
                entity_kind = %E::KIND,
                public_id = %envelope.public_id,
                ?outcome,
                "Applied change"
            );
        }

        Ok(outcome)
    }
}

/// Deserializes the payload and checks it describes the envelope's entity.
fn decode<E: EntityTable>(envelope: &ChangeEnvelope) -> SyncResult<E> {
    let decode_error = |reason: String| SyncError::PayloadDecode {
        entity_kind: envelope.entity_kind.clone(),
        public_id: envelope.public_id,
        reason,
    };

    let value: E = serde_json::from_str(&envelope.payload).map_err(|e| decode_error(e.to_string()))?;

    if value.public_id() != envelope.public_id {
        return Err(decode_error(format!(
            "payload publicId {} does not match envelope",
            value.public_id()
        )));
    }

    Ok(value)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use harbor_db::{Database, DbConfig};
    use uuid::Uuid;

    fn product(id: Uuid, name: &str) -> Product {
        Product {
            public_id: id,
            sku: "TEA-01".to_string(),
            name: name.to_string(),
            barcode: None,
            price_cents: 350,
            tax_rate_bps: 0,
            is_active: true,
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        }
    }

    fn sale(id: Uuid, total_cents: i64) -> Sale {
        Sale {
            public_id: id,
            receipt_number: "R-42".to_string(),
            terminal_id: "register-02".to_string(),
            customer_id: None,
            subtotal_cents: total_cents,
            tax_cents: 0,
            total_cents,
            posted_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        }
    }

    fn envelope<T: serde::Serialize>(
        kind: &str,
        id: Uuid,
        op: ChangeOperation,
        value: &T,
    ) -> ChangeEnvelope {
        ChangeEnvelope {
            entity_kind: kind.to_string(),
            public_id: id,
            operation: op,
            payload: serde_json::to_string(value).unwrap(),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let engine = ApplyEngine::default();

        let id = Uuid::new_v4();
        let env = envelope("Product", id, ChangeOperation::Upsert, &product(id, "Green tea"));

        assert_eq!(engine.apply(&mut conn, &env).await.unwrap(), ApplyOutcome::Inserted);
        assert_eq!(engine.apply(&mut conn, &env).await.unwrap(), ApplyOutcome::Unchanged);
        assert_eq!(entity::count::<Product>(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_master_data() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let engine = ApplyEngine::default();

        let id = Uuid::new_v4();
        let first = envelope("Product", id, ChangeOperation::Upsert, &product(id, "Green tea"));
        let second = envelope(
            "MasterData.Product",
            id,
            ChangeOperation::Upsert,
            &product(id, "Jasmine tea"),
        );

        engine.apply(&mut conn, &first).await.unwrap();
        assert_eq!(engine.apply(&mut conn, &second).await.unwrap(), ApplyOutcome::Updated);

        let stored = entity::find::<Product>(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Jasmine tea");
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let engine = ApplyEngine::default();

        let id = Uuid::new_v4();
        let env = envelope("Product", id, ChangeOperation::Delete, &product(id, "Gone"));
        assert_eq!(engine.apply(&mut conn, &env).await.unwrap(), ApplyOutcome::MissingNoop);
    }

    #[tokio::test]
    async fn test_delete_removes_master_data() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let engine = ApplyEngine::default();

        let id = Uuid::new_v4();
        let p = product(id, "Old stock");
        engine
            .apply(&mut conn, &envelope("Product", id, ChangeOperation::Upsert, &p))
            .await
            .unwrap();

        let outcome = engine
            .apply(&mut conn, &envelope("Product", id, ChangeOperation::Delete, &p))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Deleted);
        assert!(entity::find::<Product>(&mut conn, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_kind_is_skipped() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let id = Uuid::new_v4();
        let env = ChangeEnvelope {
            entity_kind: "Loyalty.GiftCard".to_string(),
            public_id: id,
            operation: ChangeOperation::Upsert,
            payload: "not even json".to_string(),
            occurred_at: Utc::now(),
        };

        let outcome = ApplyEngine::default().apply(&mut conn, &env).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::SkippedUnknownKind);
        assert!(!outcome.mutated());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_an_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let id = Uuid::new_v4();
        let env = ChangeEnvelope {
            entity_kind: "Product".to_string(),
            public_id: id,
            operation: ChangeOperation::Upsert,
            payload: r#"{"publicId":"not-a-uuid"}"#.to_string(),
            occurred_at: Utc::now(),
        };

        let err = ApplyEngine::default().apply(&mut conn, &env).await.unwrap_err();
        assert!(matches!(err, SyncError::PayloadDecode { .. }));
    }

    #[tokio::test]
    async fn test_mismatched_public_id_is_an_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let env = envelope(
            "Product",
            Uuid::new_v4(),
            ChangeOperation::Upsert,
            &product(Uuid::new_v4(), "Impostor"),
        );

        let err = ApplyEngine::default().apply(&mut conn, &env).await.unwrap_err();
        assert!(matches!(err, SyncError::PayloadDecode { .. }));
    }

    #[tokio::test]
    async fn test_posted_document_guard() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let engine = ApplyEngine::new(true);

        let id = Uuid::new_v4();
        let original = envelope("Sale", id, ChangeOperation::Upsert, &sale(id, 1000));
        let replayed = original.clone();
        let tampered = envelope("Documents.Sale", id, ChangeOperation::Upsert, &sale(id, 1));
        let delete = envelope("Sale", id, ChangeOperation::Delete, &sale(id, 1000));

        assert_eq!(engine.apply(&mut conn, &original).await.unwrap(), ApplyOutcome::Inserted);
        assert_eq!(engine.apply(&mut conn, &replayed).await.unwrap(), ApplyOutcome::Unchanged);
        assert_eq!(engine.apply(&mut conn, &tampered).await.unwrap(), ApplyOutcome::Rejected);
        assert_eq!(engine.apply(&mut conn, &delete).await.unwrap(), ApplyOutcome::Rejected);

        let stored = entity::find::<Sale>(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 1000);
    }

    #[tokio::test]
    async fn test_guard_disabled_allows_overwrite() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let engine = ApplyEngine::new(false);

        let id = Uuid::new_v4();
        engine
            .apply(&mut conn, &envelope("Sale", id, ChangeOperation::Upsert, &sale(id, 1000)))
            .await
            .unwrap();
        let outcome = engine
            .apply(&mut conn, &envelope("Sale", id, ChangeOperation::Upsert, &sale(id, 900)))
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Updated);
        let stored = entity::find::<Sale>(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 900);
    }
}
