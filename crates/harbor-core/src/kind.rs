//! # Entity Kind Registry
//!
//! The closed set of entity kinds this client knows how to store.
//!
//! ## Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Entity Kind Registry                              │
//! │                                                                         │
//! │  MasterData        Accounting       Documents          HR               │
//! │  ──────────        ──────────       ─────────          ──               │
//! │  Product           Account          Sale               Employee         │
//! │  Customer                           Purchase                            │
//! │  Supplier                           LedgerEntry                         │
//! │  Setting                                                                │
//! │                                                                         │
//! │  last-writer-wins  last-writer-wins append-only       last-writer-wins │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Wire names are the bare kind name (`"Sale"`) or the namespace-qualified
//! form (`"Documents.Sale"`). Anything else resolves to `None`: newer
//! servers may send kinds this build has never heard of.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// =============================================================================
// Entity Category
// =============================================================================

/// Business category an entity kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    /// Reference data edited freely (products, customers, settings).
    MasterData,
    /// Chart of accounts.
    Accounting,
    /// Posted documents. Never mutated after creation.
    PostedDocument,
    /// Staff records.
    HumanResources,
}

impl EntityCategory {
    /// Namespace prefix accepted in qualified kind names.
    pub const fn namespace(self) -> &'static str {
        match self {
            EntityCategory::MasterData => "MasterData",
            EntityCategory::Accounting => "Accounting",
            EntityCategory::PostedDocument => "Documents",
            EntityCategory::HumanResources => "HR",
        }
    }

    /// Returns true if rows of this category must never be overwritten.
    pub const fn is_append_only(self) -> bool {
        matches!(self, EntityCategory::PostedDocument)
    }
}

// =============================================================================
// Entity Kind
// =============================================================================

/// A synchronizable entity kind.
///
/// Resolution is a plain `match`, so every supported kind is statically
/// enumerable in [`EntityKind::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Product,
    Customer,
    Supplier,
    Setting,
    Account,
    Sale,
    Purchase,
    LedgerEntry,
    Employee,
}

impl EntityKind {
    /// Every registered kind.
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Product,
        EntityKind::Customer,
        EntityKind::Supplier,
        EntityKind::Setting,
        EntityKind::Account,
        EntityKind::Sale,
        EntityKind::Purchase,
        EntityKind::LedgerEntry,
        EntityKind::Employee,
    ];

    /// The bare wire name of this kind.
    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::Product => "Product",
            EntityKind::Customer => "Customer",
            EntityKind::Supplier => "Supplier",
            EntityKind::Setting => "Setting",
            EntityKind::Account => "Account",
            EntityKind::Sale => "Sale",
            EntityKind::Purchase => "Purchase",
            EntityKind::LedgerEntry => "LedgerEntry",
            EntityKind::Employee => "Employee",
        }
    }

    pub const fn category(self) -> EntityCategory {
        match self {
            EntityKind::Product
            | EntityKind::Customer
            | EntityKind::Supplier
            | EntityKind::Setting => EntityCategory::MasterData,
            EntityKind::Account => EntityCategory::Accounting,
            EntityKind::Sale | EntityKind::Purchase | EntityKind::LedgerEntry => {
                EntityCategory::PostedDocument
            }
            EntityKind::Employee => EntityCategory::HumanResources,
        }
    }

    /// Returns true for posted documents.
    pub const fn is_append_only(self) -> bool {
        self.category().is_append_only()
    }

    /// Resolves a wire name against the registry.
    ///
    /// Accepts `"Sale"` and `"Documents.Sale"`. A qualified name whose
    /// namespace does not match the kind's category does not resolve.
    pub fn resolve(name: &str) -> Option<EntityKind> {
        let (namespace, bare) = match name.rsplit_once('.') {
            Some((namespace, bare)) => (Some(namespace), bare),
            None => (None, name),
        };

        let kind = EntityKind::ALL.into_iter().find(|k| k.name() == bare)?;

        match namespace {
            Some(ns) if ns != kind.category().namespace() => None,
            _ => Some(kind),
        }
    }

    /// The namespace-qualified name, e.g. `"Documents.Sale"`.
    pub fn qualified_name(self) -> String {
        format!("{}.{}", self.category().namespace(), self.name())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::resolve(s).ok_or_else(|| CoreError::UnknownEntityKind(s.to_string()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
