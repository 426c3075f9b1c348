//! # Cash Mutation Repository
//!
//! Append-only cash log plus an edit trail. An edit never overwrites silently:
//! the previous values land in `cash_mutation_revisions` in the same
//! transaction that changes the row.

use chrono::{DateTime, Utc};
use gudang_core::CashMutationEntry;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::records::{format_ts, load_all, load_one, CashRevision, CashRevisionRow, CashRow, Loaded};

const CASH_COLUMNS: &str = r#"
    seq, id, amount, category, note, occurred_at, proof_ref, revision, created_at, updated_at
"#;

/// Repository for cash mutations.
#[derive(Debug, Clone)]
pub struct CashMutationRepository {
    pool: SqlitePool,
}

impl CashMutationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashMutationRepository { pool }
    }

    /// Appends a mutation and returns its store sequence.
    pub async fn insert(&self, entry: &CashMutationEntry) -> DbResult<i64> {
        debug!(id = %entry.id, category = %entry.category, amount = %entry.amount, "Appending cash mutation");

        let result = sqlx::query(
            r#"
            INSERT INTO cash_mutations (
                id, amount, category, note, occurred_at, proof_ref, revision, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.amount.rupiah())
        .bind(entry.category.as_str())
        .bind(&entry.note)
        .bind(format_ts(entry.occurred_at))
        .bind(&entry.proof_ref)
        .bind(entry.revision)
        .bind(format_ts(entry.created_at))
        .bind(format_ts(entry.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CashMutationEntry>> {
        debug!(id = %id, "Loading cash mutation");

        let row: Option<CashRow> = sqlx::query_as(&format!(
            "SELECT {} FROM cash_mutations WHERE id = ?1",
            CASH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(load_one).transpose()
    }

    /// The whole ledger in chronological order.
    pub async fn list_all(&self) -> DbResult<Loaded<CashMutationEntry>> {
        let rows: Vec<CashRow> = sqlx::query_as(&format!(
            "SELECT {} FROM cash_mutations ORDER BY occurred_at, seq",
            CASH_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let loaded = load_all("cash_mutation", rows);
        debug!(count = loaded.records.len(), quarantined = loaded.quarantined.len(), "Listed cash mutations");
        Ok(loaded)
    }

    /// Replaces `previous` with `updated` and records `previous` in the
    /// revision trail.
    ///
    /// The update is guarded by `previous.revision`; a concurrent edit makes
    /// it touch no row and nothing is written.
    ///
    /// ## Returns
    /// The new revision number.
    pub async fn update_with_revision(
        &self,
        previous: &CashMutationEntry,
        updated: &CashMutationEntry,
        replaced_at: DateTime<Utc>,
    ) -> DbResult<i64> {
        debug!(id = %previous.id, revision = previous.revision, "Editing cash mutation");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE cash_mutations SET
                amount = ?3,
                category = ?4,
                note = ?5,
                occurred_at = ?6,
                proof_ref = ?7,
                updated_at = ?8,
                revision = revision + 1
            WHERE id = ?1 AND revision = ?2
            "#,
        )
        .bind(&previous.id)
        .bind(previous.revision)
        .bind(updated.amount.rupiah())
        .bind(updated.category.as_str())
        .bind(&updated.note)
        .bind(format_ts(updated.occurred_at))
        .bind(&updated.proof_ref)
        .bind(format_ts(replaced_at))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::TransactionFailed(format!(
                "cash mutation {} was edited concurrently",
                previous.id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO cash_mutation_revisions (
                mutation_id, revision, amount, category, note, occurred_at, proof_ref, replaced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&previous.id)
        .bind(previous.revision)
        .bind(previous.amount.rupiah())
        .bind(previous.category.as_str())
        .bind(&previous.note)
        .bind(format_ts(previous.occurred_at))
        .bind(&previous.proof_ref)
        .bind(format_ts(replaced_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(previous.revision + 1)
    }

    /// Edit trail of one mutation, oldest first.
    pub async fn revisions(&self, mutation_id: &str) -> DbResult<Loaded<CashRevision>> {
        let rows: Vec<CashRevisionRow> = sqlx::query_as(
            r#"
            SELECT mutation_id, revision, amount, category, note, occurred_at, proof_ref, replaced_at
            FROM cash_mutation_revisions
            WHERE mutation_id = ?1
            ORDER BY revision
            "#,
        )
        .bind(mutation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(load_all("cash_mutation_revision", rows))
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cash_mutations")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
