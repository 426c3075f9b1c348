//! # Item Repository
//!
//! Catalogue reads and writes. Quantity is never written here except at
//! creation; every later change goes through
//! [`StockRepository::conditional_adjust`](super::stock::StockRepository::conditional_adjust).

use chrono::{DateTime, Utc};
use gudang_core::{InventoryItem, Money, StockHistoryEntry};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::records::{format_ts, load_all, load_one, ItemRow, Loaded};
use crate::repository::stock::insert_history;

const ITEM_COLUMNS: &str = r#"
    id, code, title, subject, grade, publisher, item_type,
    price_regular, price_special, discount_regular_bps, discount_special_bps,
    quantity, version, created_at, updated_at
"#;

/// Editable descriptive fields and prices of an item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemDetails {
    pub title: String,
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub publisher: Option<String>,
    pub item_type: Option<String>,
    pub price_regular: Money,
    pub price_special: Money,
    pub discount_regular_bps: u32,
    pub discount_special_bps: u32,
}

/// Repository for item database operations.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Gets an item by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(item))` - Item found
    /// * `Ok(None)` - Item not found
    /// * `Err(MalformedRecord)` - Stored row fails validation
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InventoryItem>> {
        debug!(id = %id, "Loading item");

        let row: Option<ItemRow> =
            sqlx::query_as(&format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(load_one).transpose()
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<InventoryItem>> {
        let row: Option<ItemRow> =
            sqlx::query_as(&format!("SELECT {} FROM items WHERE code = ?1", ITEM_COLUMNS))
                .bind(code.trim())
                .fetch_optional(&self.pool)
                .await?;

        row.map(load_one).transpose()
    }

    /// Lists items ordered by code.
    ///
    /// ## Arguments
    /// * `query` - Substring of code or title; empty lists everything
    /// * `limit` - Maximum rows
    pub async fn list(&self, query: &str, limit: u32) -> DbResult<Loaded<InventoryItem>> {
        let query = query.trim();
        debug!(query = %query, limit = %limit, "Listing items");

        let pattern = format!("%{}%", query);
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {} FROM items
             WHERE ?1 = '' OR code LIKE ?2 OR title LIKE ?2
             ORDER BY code
             LIMIT ?3",
            ITEM_COLUMNS
        ))
        .bind(query)
        .bind(&pattern)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let loaded = load_all("item", rows);
        debug!(count = loaded.records.len(), "Listed items");
        Ok(loaded)
    }

    /// Inserts a new item together with its opening history entry.
    ///
    /// Both rows commit or neither does.
    ///
    /// ## Returns
    /// * `Ok(Some(seq))` - Sequence of the opening entry
    /// * `Ok(None)` - No opening entry was given
    /// * `Err(DbError::UniqueViolation)` - Code already exists
    pub async fn insert(
        &self,
        item: &InventoryItem,
        opening: Option<&StockHistoryEntry>,
    ) -> DbResult<Option<i64>> {
        debug!(id = %item.id, code = %item.code, "Inserting item");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO items (
                id, code, title, subject, grade, publisher, item_type,
                price_regular, price_special, discount_regular_bps, discount_special_bps,
                quantity, version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&item.id)
        .bind(&item.code)
        .bind(&item.title)
        .bind(&item.subject)
        .bind(&item.grade)
        .bind(&item.publisher)
        .bind(&item.item_type)
        .bind(item.price_regular.rupiah())
        .bind(item.price_special.rupiah())
        .bind(i64::from(item.discount_regular_bps))
        .bind(i64::from(item.discount_special_bps))
        .bind(item.quantity)
        .bind(item.version)
        .bind(format_ts(item.created_at))
        .bind(format_ts(item.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("item code", &item.code),
            other => other,
        })?;

        let seq = match opening {
            Some(entry) => Some(insert_history(&mut tx, entry).await?),
            None => None,
        };

        tx.commit().await?;
        Ok(seq)
    }

    /// Replaces the descriptive fields and prices, bumping `version`.
    ///
    /// Bumping the version makes any in-flight stock adjustment re-read, so
    /// its history snapshot carries the new title.
    pub async fn update_details(
        &self,
        id: &str,
        details: &ItemDetails,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, "Updating item details");

        let result = sqlx::query(
            r#"
            UPDATE items SET
                title = ?2,
                subject = ?3,
                grade = ?4,
                publisher = ?5,
                item_type = ?6,
                price_regular = ?7,
                price_special = ?8,
                discount_regular_bps = ?9,
                discount_special_bps = ?10,
                updated_at = ?11,
                version = version + 1
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&details.title)
        .bind(&details.subject)
        .bind(&details.grade)
        .bind(&details.publisher)
        .bind(&details.item_type)
        .bind(details.price_regular.rupiah())
        .bind(details.price_special.rupiah())
        .bind(i64::from(details.discount_regular_bps))
        .bind(i64::from(details.discount_special_bps))
        .bind(format_ts(now))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }

        Ok(())
    }

    /// Counts items (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::generate_id;

    fn item(code: &str) -> InventoryItem {
        let now = Utc::now();
        InventoryItem {
            id: generate_id(),
            code: code.to_string(),
            title: format!("Buku {}", code),
            subject: None,
            grade: None,
            publisher: None,
            item_type: None,
            price_regular: Money::from_rupiah(50_000),
            price_special: Money::from_rupiah(45_000),
            discount_regular_bps: 0,
            discount_special_bps: 0,
            quantity: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.items();

        let new = item("MTK-7A");
        assert_eq!(repo.insert(&new, None).await.unwrap(), None);

        let loaded = repo.get_by_id(&new.id).await.unwrap().unwrap();
        assert_eq!(loaded.code, "MTK-7A");
        assert_eq!(loaded.price_special.rupiah(), 45_000);

        let by_code = repo.get_by_code("MTK-7A").await.unwrap().unwrap();
        assert_eq!(by_code.id, new.id);
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.items();

        repo.insert(&item("MTK-7A"), None).await.unwrap();
        let err = repo.insert(&item("MTK-7A"), None).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_code_or_title() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.items();

        for code in ["MTK-7A", "MTK-8A", "IPA-7A"] {
            repo.insert(&item(code), None).await.unwrap();
        }

        assert_eq!(repo.list("", 10).await.unwrap().records.len(), 3);
        assert_eq!(repo.list("MTK", 10).await.unwrap().records.len(), 2);
        assert_eq!(repo.list("Buku IPA", 10).await.unwrap().records.len(), 1);
        assert_eq!(repo.list("", 2).await.unwrap().records.len(), 2);
    }

    #[tokio::test]
    async fn test_update_details_bumps_version() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.items();

        let new = item("MTK-7A");
        repo.insert(&new, None).await.unwrap();

        let details = ItemDetails {
            title: "Matematika Kelas 7 (Revisi)".to_string(),
            price_regular: Money::from_rupiah(55_000),
            ..Default::default()
        };
        repo.update_details(&new.id, &details, Utc::now()).await.unwrap();

        let loaded = repo.get_by_id(&new.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Matematika Kelas 7 (Revisi)");
        assert_eq!(loaded.version, 1);

        let err = repo.update_details("missing", &details, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_malformed_row_fails_point_read() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let new = item("MTK-7A");
        db.items().insert(&new, None).await.unwrap();

        sqlx::query("UPDATE items SET created_at = 'not a date' WHERE id = ?1")
            .bind(&new.id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.items().get_by_id(&new.id).await.unwrap_err();
        assert!(matches!(err, DbError::MalformedRecord { .. }));

        let listed = db.items().list("", 10).await.unwrap();
        assert!(listed.records.is_empty());
        assert_eq!(listed.quarantined.len(), 1);
    }
}
