//! # Entity Tables
//!
//! Maps each synchronized entity onto its SQLite table and provides
//! identity-keyed CRUD that works for any of them.
//!
//! ## How It Fits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  EntityKind::Product ──(match in harbor-sync)──► apply_as::<Product>    │
//! │                                                      │                  │
//! │                                                      ▼                  │
//! │  impl EntityTable for Product                  find / upsert / delete   │
//! │    TABLE   = "products"                        (generic, this module)   │
//! │    COLUMNS = [sku, name, barcode, ...]               │                  │
//! │    bind_columns(query) ◄─────────────────────────────┘                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `public_id` is always parameter `?1`; the remaining columns follow in
//! `COLUMNS` order and `bind_columns` must bind them in that same order.

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::error::DbResult;
use harbor_core::{
    Account, Customer, Employee, LedgerEntry, Product, Purchase, Sale, Setting, Supplier,
    SyncEntity,
};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

// =============================================================================
// EntityTable Trait
// =============================================================================

/// A [`SyncEntity`] with a local table.
pub trait EntityTable: SyncEntity + for<'r> FromRow<'r, SqliteRow> {
    /// Table name.
    const TABLE: &'static str;

    /// Every column except `public_id`, in bind order.
    const COLUMNS: &'static [&'static str];

    /// Binds the `COLUMNS` values, in order, onto `query`.
    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q>;
}

/// What an upsert did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The stored row already equalled the incoming value.
    Unchanged,
}

// =============================================================================
// Generic CRUD
// =============================================================================

/// Looks a row up by public id.
pub async fn find<E: EntityTable>(
    conn: &mut SqliteConnection,
    public_id: Uuid,
) -> DbResult<Option<E>> {
    let sql = format!(
        "SELECT public_id, {} FROM {} WHERE public_id = ?1",
        E::COLUMNS.join(", "),
        E::TABLE
    );

    let row = sqlx::query_as::<_, E>(&sql)
        .bind(public_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row)
}

/// Inserts a new row. Fails with `UniqueViolation` if the id exists.
pub async fn insert<E: EntityTable>(conn: &mut SqliteConnection, entity: &E) -> DbResult<()> {
    let placeholders: Vec<String> = (2..=E::COLUMNS.len() + 1).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} (public_id, {}) VALUES (?1, {})",
        E::TABLE,
        E::COLUMNS.join(", "),
        placeholders.join(", ")
    );

    let query = sqlx::query(&sql).bind(entity.public_id());
    entity.bind_columns(query).execute(&mut *conn).await?;

    Ok(())
}

/// Overwrites every column of the row with the same public id.
///
/// ## Returns
/// `true` if a row was updated.
pub async fn update<E: EntityTable>(conn: &mut SqliteConnection, entity: &E) -> DbResult<bool> {
    let assignments: Vec<String> = E::COLUMNS
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ?{}", i + 2))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE public_id = ?1",
        E::TABLE,
        assignments.join(", ")
    );

    let query = sqlx::query(&sql).bind(entity.public_id());
    let result = entity.bind_columns(query).execute(&mut *conn).await?;

    Ok(result.rows_affected() > 0)
}

/// Insert if absent, otherwise full overwrite.
pub async fn upsert<E: EntityTable>(
    conn: &mut SqliteConnection,
    entity: &E,
) -> DbResult<UpsertOutcome> {
    match find::<E>(conn, entity.public_id()).await? {
        None => {
            insert(conn, entity).await?;
            Ok(UpsertOutcome::Inserted)
        }
        Some(existing) if existing == *entity => Ok(UpsertOutcome::Unchanged),
        Some(_) => {
            update(conn, entity).await?;
            Ok(UpsertOutcome::Updated)
        }
    }
}

/// Deletes by public id.
///
/// ## Returns
/// `true` if a row was removed, `false` if none existed.
pub async fn delete<E: EntityTable>(conn: &mut SqliteConnection, public_id: Uuid) -> DbResult<bool> {
    let sql = format!("DELETE FROM {} WHERE public_id = ?1", E::TABLE);

    let result = sqlx::query(&sql)
        .bind(public_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Number of rows in the entity's table.
pub async fn count<E: EntityTable>(conn: &mut SqliteConnection) -> DbResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", E::TABLE);
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await?;
    Ok(count)
}

// =============================================================================
// Master Data
// =============================================================================

impl EntityTable for Product {
    const TABLE: &'static str = "products";
    const COLUMNS: &'static [&'static str] = &[
        "sku",
        "name",
        "barcode",
        "price_cents",
        "tax_rate_bps",
        "is_active",
        "updated_at",
    ];

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.sku.as_str())
            .bind(self.name.as_str())
            .bind(self.barcode.as_deref())
            .bind(self.price_cents)
            .bind(self.tax_rate_bps)
            .bind(self.is_active)
            .bind(self.updated_at)
    }
}

impl EntityTable for Customer {
    const TABLE: &'static str = "customers";
    const COLUMNS: &'static [&'static str] =
        &["name", "phone", "email", "credit_limit_cents", "updated_at"];

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.name.as_str())
            .bind(self.phone.as_deref())
            .bind(self.email.as_deref())
            .bind(self.credit_limit_cents)
            .bind(self.updated_at)
    }
}

impl EntityTable for Supplier {
    const TABLE: &'static str = "suppliers";
    const COLUMNS: &'static [&'static str] = &["name", "phone", "tax_number", "updated_at"];

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.name.as_str())
            .bind(self.phone.as_deref())
            .bind(self.tax_number.as_deref())
            .bind(self.updated_at)
    }
}

impl EntityTable for Setting {
    const TABLE: &'static str = "settings";
    const COLUMNS: &'static [&'static str] = &["name", "value", "updated_at"];

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.name.as_str())
            .bind(self.value.as_str())
            .bind(self.updated_at)
    }
}

// =============================================================================
// Accounting
// =============================================================================

impl EntityTable for Account {
    const TABLE: &'static str = "accounts";
    const COLUMNS: &'static [&'static str] =
        &["code", "name", "account_type", "is_active", "updated_at"];

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.code.as_str())
            .bind(self.name.as_str())
            .bind(self.account_type.as_str())
            .bind(self.is_active)
            .bind(self.updated_at)
    }
}

// =============================================================================
// Posted Documents
// =============================================================================

impl EntityTable for Sale {
    const TABLE: &'static str = "sales";
    const COLUMNS: &'static [&'static str] = &[
        "receipt_number",
        "terminal_id",
        "customer_id",
        "subtotal_cents",
        "tax_cents",
        "total_cents",
        "posted_at",
    ];

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.receipt_number.as_str())
            .bind(self.terminal_id.as_str())
            .bind(self.customer_id)
            .bind(self.subtotal_cents)
            .bind(self.tax_cents)
            .bind(self.total_cents)
            .bind(self.posted_at)
    }
}

impl EntityTable for Purchase {
    const TABLE: &'static str = "purchases";
    const COLUMNS: &'static [&'static str] =
        &["reference", "supplier_id", "total_cents", "posted_at"];

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.reference.as_str())
            .bind(self.supplier_id)
            .bind(self.total_cents)
            .bind(self.posted_at)
    }
}

impl EntityTable for LedgerEntry {
    const TABLE: &'static str = "ledger_entries";
    const COLUMNS: &'static [&'static str] = &[
        "account_id",
        "debit_cents",
        "credit_cents",
        "memo",
        "posted_at",
    ];

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.account_id)
            .bind(self.debit_cents)
            .bind(self.credit_cents)
            .bind(self.memo.as_deref())
            .bind(self.posted_at)
    }
}

// =============================================================================
// Human Resources
// =============================================================================

impl EntityTable for Employee {
    const TABLE: &'static str = "employees";
    const COLUMNS: &'static [&'static str] = &["full_name", "role", "is_active", "hired_at"];

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.full_name.as_str())
            .bind(self.role.as_str())
            .bind(self.is_active)
            .bind(self.hired_at)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{TimeZone, Utc};

    fn product(name: &str, price_cents: i64) -> Product {
        Product {
            public_id: Uuid::new_v4(),
            sku: "COKE-330".to_string(),
            name: name.to_string(),
            barcode: Some("5449000000996".to_string()),
            price_cents,
            tax_rate_bps: 825,
            is_active: true,
            updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_overwrites() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let mut p = product("Coke", 199);
        assert_eq!(upsert(&mut conn, &p).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(upsert(&mut conn, &p).await.unwrap(), UpsertOutcome::Unchanged);

        p.name = "Coke Zero".to_string();
        p.barcode = None;
        assert_eq!(upsert(&mut conn, &p).await.unwrap(), UpsertOutcome::Updated);

        let stored = find::<Product>(&mut conn, p.public_id).await.unwrap().unwrap();
        assert_eq!(stored, p);
        assert_eq!(count::<Product>(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let p = product("Water", 99);
        insert(&mut conn, &p).await.unwrap();

        assert!(delete::<Product>(&mut conn, p.public_id).await.unwrap());
        assert!(!delete::<Product>(&mut conn, p.public_id).await.unwrap());
        assert!(find::<Product>(&mut conn, p.public_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_optional_uuid_and_timestamp_columns() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let sale = Sale {
            public_id: Uuid::new_v4(),
            receipt_number: "R-0001".to_string(),
            terminal_id: "register-01".to_string(),
            customer_id: Some(Uuid::new_v4()),
            subtotal_cents: 1000,
            tax_cents: 83,
            total_cents: 1083,
            posted_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };
        insert(&mut conn, &sale).await.unwrap();

        let employee = Employee {
            public_id: Uuid::new_v4(),
            full_name: "Ada Clerk".to_string(),
            role: "cashier".to_string(),
            is_active: true,
            hired_at: None,
        };
        insert(&mut conn, &employee).await.unwrap();

        assert_eq!(
            find::<Sale>(&mut conn, sale.public_id).await.unwrap(),
            Some(sale)
        );
        assert_eq!(
            find::<Employee>(&mut conn, employee.public_id).await.unwrap(),
            Some(employee)
        );
    }

    #[tokio::test]
    async fn test_update_missing_row_reports_false() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let p = product("Ghost", 1);
        assert!(!update(&mut conn, &p).await.unwrap());
    }
}
