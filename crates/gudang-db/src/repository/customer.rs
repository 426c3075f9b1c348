//! # Customer Repository

use chrono::{DateTime, Utc};
use gudang_core::Customer;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::records::{format_ts, load_all, load_one, CustomerRow, Loaded};

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, name = %customer.name, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, special_pricing, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.special_pricing)
        .bind(format_ts(customer.created_at))
        .bind(format_ts(customer.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, name, phone, special_pricing, created_at, updated_at FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(load_one).transpose()
    }

    /// Lists customers by name.
    pub async fn list(&self) -> DbResult<Loaded<Customer>> {
        let rows: Vec<CustomerRow> = sqlx::query_as(
            "SELECT id, name, phone, special_pricing, created_at, updated_at FROM customers ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(load_all("customer", rows))
    }

    /// Replaces name, phone and pricing tier.
    pub async fn update(&self, customer: &Customer, now: DateTime<Utc>) -> DbResult<()> {
        debug!(id = %customer.id, "Updating customer");

        let result = sqlx::query(
            r#"
            UPDATE customers SET name = ?2, phone = ?3, special_pricing = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.special_pricing)
        .bind(format_ts(now))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", &customer.id));
        }

        Ok(())
    }

    /// Deletes a customer. Fails with `ForeignKeyViolation` while sales
    /// still reference it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting customer");

        let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::records::stored_precision;
    use crate::repository::generate_id;

    fn customer(name: &str, special: bool) -> Customer {
        let now = stored_precision(Utc::now());
        Customer {
            id: generate_id(),
            name: name.to_string(),
            phone: Some("0812-3456-7890".to_string()),
            special_pricing: special,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_crud_cycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        let mut budi = customer("SD Negeri 3", true);
        repo.insert(&budi).await.unwrap();
        assert_eq!(repo.get_by_id(&budi.id).await.unwrap(), Some(budi.clone()));

        budi.special_pricing = false;
        repo.update(&budi, Utc::now()).await.unwrap();
        let loaded = repo.get_by_id(&budi.id).await.unwrap().unwrap();
        assert!(!loaded.special_pricing);

        repo.delete(&budi.id).await.unwrap();
        assert!(repo.get_by_id(&budi.id).await.unwrap().is_none());

        let err = repo.delete(&budi.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_sorted_by_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        repo.insert(&customer("Toko Buku Sinar", false)).await.unwrap();
        repo.insert(&customer("Koperasi Guru", true)).await.unwrap();

        let names: Vec<_> = repo
            .list()
            .await
            .unwrap()
            .records
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["Koperasi Guru", "Toko Buku Sinar"]);
    }

    #[tokio::test]
    async fn test_delete_referenced_customer_fails() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        let c = customer("SMP Harapan", true);
        repo.insert(&c).await.unwrap();

        sqlx::query(
            "INSERT INTO sales (invoice, customer_id, total, amount_paid, note, created_at)
             VALUES ('INV-202407-0001', ?1, 0, 0, '', ?2)",
        )
        .bind(&c.id)
        .bind(format_ts(Utc::now()))
        .execute(db.pool())
        .await
        .unwrap();

        let err = repo.delete(&c.id).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
