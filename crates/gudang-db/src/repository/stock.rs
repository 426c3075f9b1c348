//! # Stock Repository
//!
//! Stock history reads and the compare-and-swap write every stock
//! adjustment goes through.
//!
//! ## Conditional Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  attempt 1..=max_attempts:                                              │
//! │                                                                         │
//! │   read item (quantity, version) ── missing ──► ItemNotFound             │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   plan(item) ── abort ──► Rejected (e.g. negative stock)                │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   BEGIN                                                                 │
//! │     UPDATE items SET quantity = after, version = version + 1            │
//! │       WHERE id = ? AND version = <read version>                         │
//! │        │                                                                │
//! │        ├── 0 rows / SQLITE_BUSY ──► ROLLBACK, next attempt              │
//! │        ▼                                                                │
//! │     INSERT stock_history ── error ──► ROLLBACK, HistoryAppendFailed     │
//! │   COMMIT                                                                │
//! │                                                                         │
//! │  all attempts lost ──► NotConverged                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The UPDATE is the first statement of the transaction, so the write lock
//! is taken before anything is read inside it and WAL never hands the
//! transaction a stale snapshot.

use chrono::{DateTime, Utc};
use gudang_core::{CoreResult, InventoryItem, ItemSnapshot, StockHistoryEntry, StockMovement};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult, LedgerError, LedgerResult, WriteFailure};
use crate::records::{format_ts, load_all, stored_precision, HistoryRow, Loaded};
use crate::repository::generate_id;
use crate::repository::item::ItemRepository;

const HISTORY_COLUMNS: &str = r#"
    seq, id, item_id, code, title, subject, grade, publisher, item_type,
    delta, quantity_before, quantity_after, reason, occurred_at, committed_at
"#;

/// What the history entry of a conditional write should say.
#[derive(Debug, Clone)]
pub struct HistoryDraft {
    pub reason: String,
    pub occurred_at: DateTime<Utc>,

    /// Overrides the snapshot taken from the item at write time.
    pub snapshot: Option<ItemSnapshot>,
}

/// Repository for stock history and conditional stock writes.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// History of one item in commit order.
    pub async fn history_for_item(&self, item_id: &str) -> DbResult<Loaded<StockHistoryEntry>> {
        debug!(item_id = %item_id, "Loading stock history");

        let rows: Vec<HistoryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM stock_history WHERE item_id = ?1 ORDER BY seq",
            HISTORY_COLUMNS
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(load_all("stock_history", rows))
    }

    /// Most recent history entries across all items, newest first.
    pub async fn recent(&self, limit: u32) -> DbResult<Loaded<StockHistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM stock_history ORDER BY seq DESC LIMIT ?1",
            HISTORY_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(load_all("stock_history", rows))
    }

    /// `Σ delta` for an item, computed by the database.
    pub async fn sum_deltas(&self, item_id: &str) -> DbResult<i64> {
        let sum: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(delta), 0) FROM stock_history WHERE item_id = ?1")
                .bind(item_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(sum)
    }

    /// Compare-and-swap stock write with history append.
    ///
    /// `plan` sees the item as read on each attempt and returns the movement
    /// to commit, or an error to abort without writing. Retrying on conflict
    /// happens here; callers see one outcome.
    ///
    /// ## Errors
    /// - `ConditionalWriteFailed { ItemNotFound }` - no such item
    /// - `ConditionalWriteFailed { NotConverged }` - every attempt conflicted
    /// - `Validation` / `Rejected` - `plan` aborted
    /// - `HistoryAppendFailed` - history insert failed, nothing committed
    /// - `Store` - any other store failure
    pub async fn conditional_adjust<F>(
        &self,
        item_id: &str,
        max_attempts: u32,
        draft: &HistoryDraft,
        mut plan: F,
    ) -> LedgerResult<StockHistoryEntry>
    where
        F: FnMut(&InventoryItem) -> CoreResult<StockMovement>,
    {
        let items = ItemRepository::new(self.pool.clone());
        let attempts = max_attempts.max(1);

        for attempt in 1..=attempts {
            let item = items
                .get_by_id(item_id)
                .await?
                .ok_or_else(|| LedgerError::write_failed(item_id, WriteFailure::ItemNotFound))?;

            let movement = plan(&item)?;

            let now = stored_precision(Utc::now());
            let mut entry = StockHistoryEntry {
                id: generate_id(),
                seq: 0,
                item_id: item.id.clone(),
                snapshot: draft.snapshot.clone().unwrap_or_else(|| item.snapshot()),
                delta: movement.delta,
                quantity_before: movement.quantity_before,
                quantity_after: movement.quantity_after,
                reason: draft.reason.clone(),
                occurred_at: stored_precision(draft.occurred_at),
                committed_at: now,
            };

            match self.try_commit(item.version, &entry).await? {
                Attempt::Committed(seq) => {
                    entry.seq = seq;
                    debug!(
                        item_id = %item_id,
                        attempt,
                        delta = entry.delta,
                        after = entry.quantity_after,
                        "Conditional stock write committed"
                    );
                    return Ok(entry);
                }
                Attempt::Conflict(reason) => {
                    debug!(item_id = %item_id, attempt, version = item.version, reason, "Write lost, retrying");
                }
            }
        }

        Err(LedgerError::write_failed(
            item_id,
            WriteFailure::NotConverged { attempts },
        ))
    }

    /// One compare-and-swap attempt against `expected_version`.
    ///
    /// Master update and history insert share one transaction. A lost race
    /// rolls both back and reports [`Attempt::Conflict`].
    async fn try_commit(
        &self,
        expected_version: i64,
        entry: &StockHistoryEntry,
    ) -> LedgerResult<Attempt> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let updated = sqlx::query(
            r#"
            UPDATE items
            SET quantity = ?1, version = version + 1, updated_at = ?2
            WHERE id = ?3 AND version = ?4
            "#,
        )
        .bind(entry.quantity_after)
        .bind(format_ts(entry.committed_at))
        .bind(&entry.item_id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from);

        match updated {
            Ok(result) if result.rows_affected() == 1 => {}
            Ok(_) => {
                let _ = tx.rollback().await;
                return Ok(Attempt::Conflict("version changed"));
            }
            Err(err) if err.is_retryable() => {
                let _ = tx.rollback().await;
                warn!(item_id = %entry.item_id, error = %err, "Store busy on stock update");
                return Ok(Attempt::Conflict("store busy"));
            }
            Err(err) => {
                let _ = tx.rollback().await;
                return Err(err.into());
            }
        }

        let seq = match insert_history(&mut tx, entry).await {
            Ok(seq) => seq,
            Err(err) if err.is_retryable() => {
                let _ = tx.rollback().await;
                return Ok(Attempt::Conflict("store busy"));
            }
            Err(source) => {
                let _ = tx.rollback().await;
                return Err(LedgerError::HistoryAppendFailed {
                    item_id: entry.item_id.clone(),
                    source,
                });
            }
        };

        match tx.commit().await.map_err(DbError::from) {
            Ok(()) => Ok(Attempt::Committed(seq)),
            Err(err) if err.is_retryable() => Ok(Attempt::Conflict("store busy")),
            Err(err) => Err(err.into()),
        }
    }
}

/// Outcome of a single conditional write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Committed(i64),
    Conflict(&'static str),
}

/// Appends a history entry on an open connection or transaction.
///
/// Returns the assigned sequence.
pub(crate) async fn insert_history(
    conn: &mut SqliteConnection,
    entry: &StockHistoryEntry,
) -> DbResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO stock_history (
            id, item_id, code, title, subject, grade, publisher, item_type,
            delta, quantity_before, quantity_after, reason, occurred_at, committed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.item_id)
    .bind(&entry.snapshot.code)
    .bind(&entry.snapshot.title)
    .bind(&entry.snapshot.subject)
    .bind(&entry.snapshot.grade)
    .bind(&entry.snapshot.publisher)
    .bind(&entry.snapshot.item_type)
    .bind(entry.delta)
    .bind(entry.quantity_before)
    .bind(entry.quantity_after)
    .bind(&entry.reason)
    .bind(format_ts(entry.occurred_at))
    .bind(format_ts(entry.committed_at))
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}
