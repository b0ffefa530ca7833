//! # Synchronized Entities
//!
//! The local records that travel inside change payloads.
//!
//! ## Identity
//! Every entity carries a `public_id` (UUID v4) generated on whichever
//! side created it. It is stable for the entity's lifetime and is the only
//! key the apply engine uses, which is what makes upsert-by-identity
//! idempotent under replay.
//!
//! ## Money
//! All amounts are integer cents (`*_cents: i64`). Tax rates are basis
//! points (825 = 8.25%).
//!
//! ## Payload Format
//! Payloads are the camelCase JSON serialization of these structs:
//! ```json
//! {"publicId":"5f0c…","sku":"COKE-330","name":"Coke 330ml","priceCents":199,…}
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kind::EntityKind;

// =============================================================================
// SyncEntity Trait
// =============================================================================

/// A record that can be carried in a change payload.
///
/// Implemented once per registered [`EntityKind`]; `KIND` ties the Rust
/// type to its registry entry.
pub trait SyncEntity:
    Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + Unpin + 'static
{
    const KIND: EntityKind;

    /// Stable identity used for upsert and delete.
    fn public_id(&self) -> Uuid;
}

macro_rules! sync_entity {
    ($ty:ident => $kind:ident) => {
        impl SyncEntity for $ty {
            const KIND: EntityKind = EntityKind::$kind;

            fn public_id(&self) -> Uuid {
                self.public_id
            }
        }
    };
}

// =============================================================================
// Master Data
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub public_id: Uuid,
    pub sku: String,
    pub name: String,
    pub barcode: Option<String>,
    pub price_cents: i64,
    pub tax_rate_bps: i64,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub public_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Maximum outstanding balance; zero means cash only.
    pub credit_limit_cents: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub public_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub tax_number: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Store-wide key/value setting (receipt footer, currency, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub public_id: Uuid,
    pub name: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Accounting
// =============================================================================

/// Chart-of-accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub public_id: Uuid,
    pub code: String,
    pub name: String,
    /// "asset", "liability", "equity", "income" or "expense".
    pub account_type: String,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Posted Documents (append-only)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub public_id: Uuid,
    pub receipt_number: String,
    pub terminal_id: String,
    pub customer_id: Option<Uuid>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub public_id: Uuid,
    pub reference: String,
    pub supplier_id: Option<Uuid>,
    pub total_cents: i64,
    pub posted_at: DateTime<Utc>,
}

/// One side-balanced ledger posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub public_id: Uuid,
    pub account_id: Uuid,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub memo: Option<String>,
    pub posted_at: DateTime<Utc>,
}

// =============================================================================
// Human Resources
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub public_id: Uuid,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub hired_at: Option<DateTime<Utc>>,
}

sync_entity!(Product => Product);
sync_entity!(Customer => Customer);
sync_entity!(Supplier => Supplier);
sync_entity!(Setting => Setting);
sync_entity!(Account => Account);
sync_entity!(Sale => Sale);
sync_entity!(Purchase => Purchase);
sync_entity!(LedgerEntry => LedgerEntry);
sync_entity!(Employee => Employee);

// =============================================================================
// Unit Tests
// =============================================================================
