//! # Stock Ledger
//!
//! Every change to a quantity on hand goes through [`StockLedger::adjust_stock`]
//! and leaves exactly one history entry behind.
//!
//! ## Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sum:    item.quantity == Σ history.delta                               │
//! │  Chain:  entry[n].quantity_before == entry[n-1].quantity_after          │
//! │          (in commit order, starting from 0)                             │
//! │                                                                         │
//! │  Both hold after any interleaving of concurrent adjustments because     │
//! │  the master update and the history insert commit together under a      │
//! │  version check.                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use gudang_core::stock::{plan_movement, verify_stock_chain, ChainViolation};
use gudang_core::validation::{
    validate_delta, validate_discount_bps, validate_id, validate_item_code, validate_opening_quantity,
    validate_price, validate_reason, validate_required_text, validate_search_query,
};
use gudang_core::{
    InventoryItem, ItemSnapshot, LedgerSettings, StockHistoryEntry, MAX_LIST_LIMIT, MAX_TITLE_LEN,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{BatchFailure, DbError, LedgerError, LedgerResult};
use crate::feed::{ChangeEvent, Collection};
use crate::pool::Database;
use crate::records::{stored_precision, Loaded, Quarantined};
use crate::repository::generate_id;
use crate::repository::item::ItemDetails;
use crate::repository::stock::HistoryDraft;

/// Reason recorded on the opening entry when none is given.
pub const OPENING_REASON: &str = "opening stock";

/// Default page size for item listings.
pub const DEFAULT_LIST_LIMIT: u32 = 50;

// =============================================================================
// Inputs and Results
// =============================================================================

/// One requested stock adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub item_id: String,

    /// Signed change, never zero.
    pub delta: i64,

    pub reason: String,

    /// When the movement happened; defaults to commit time.
    pub occurred_at: Option<DateTime<Utc>>,

    /// Overrides the item snapshot stored on the history entry.
    pub snapshot: Option<ItemSnapshot>,
}

impl StockAdjustment {
    pub fn new(item_id: impl Into<String>, delta: i64, reason: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            delta,
            reason: reason.into(),
            occurred_at: None,
            snapshot: None,
        }
    }

    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    pub fn snapshot(mut self, snapshot: ItemSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

/// What a committed adjustment did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentReceipt {
    pub item_id: String,
    pub history_entry_id: String,
    pub delta: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
}

impl From<&StockHistoryEntry> for AdjustmentReceipt {
    fn from(entry: &StockHistoryEntry) -> Self {
        Self {
            item_id: entry.item_id.clone(),
            history_entry_id: entry.id.clone(),
            delta: entry.delta,
            quantity_before: entry.quantity_before,
            quantity_after: entry.quantity_after,
        }
    }
}

/// Outcome of [`StockLedger::bulk_adjust_stock`].
#[derive(Debug, Default)]
pub struct BulkAdjustReport {
    pub committed: Vec<AdjustmentReceipt>,
    pub failed: Vec<BatchFailure>,
}

impl BulkAdjustReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// The receipts, or `PartialBatchFailure` if anything failed.
    ///
    /// Committed entries stay committed either way.
    pub fn into_result(self) -> LedgerResult<Vec<AdjustmentReceipt>> {
        if self.failed.is_empty() {
            return Ok(self.committed);
        }
        Err(LedgerError::PartialBatchFailure {
            total: self.committed.len() + self.failed.len(),
            failures: self.failed,
        })
    }
}

/// A new catalogue item with its opening stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub code: String,
    pub details: ItemDetails,
    pub opening_quantity: i64,

    /// Reason on the opening entry; [`OPENING_REASON`] when `None`.
    pub reason: Option<String>,
}

/// An item with its complete history.
#[derive(Debug, Clone)]
pub struct StockCard {
    pub item: InventoryItem,

    /// History in commit order.
    pub entries: Vec<StockHistoryEntry>,

    /// History rows that failed validation on read.
    pub quarantined: Vec<Quarantined>,
}

/// A broken stock invariant found on a [`StockCard`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardViolation {
    #[error("history chain broken: {0}")]
    Chain(ChainViolation),

    #[error("history sums to {history} but {on_hand} is on hand")]
    Sum { history: i64, on_hand: i64 },

    #[error("{count} history rows could not be read")]
    Unreadable { count: usize },
}

impl StockCard {
    /// Checks the chain and sum invariants, returning the first violation.
    pub fn verify(&self) -> Result<(), CardViolation> {
        if !self.quarantined.is_empty() {
            return Err(CardViolation::Unreadable {
                count: self.quarantined.len(),
            });
        }

        let closing = verify_stock_chain(0, &self.entries).map_err(CardViolation::Chain)?;
        if closing != self.item.quantity {
            return Err(CardViolation::Sum {
                history: closing,
                on_hand: self.item.quantity,
            });
        }

        Ok(())
    }
}

// =============================================================================
// StockLedger
// =============================================================================

/// Item catalogue and stock adjustments.
#[derive(Debug, Clone)]
pub struct StockLedger {
    db: Database,
    settings: LedgerSettings,
}

impl StockLedger {
    pub fn new(db: Database, settings: LedgerSettings) -> Self {
        Self { db, settings }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Applies a signed delta to one item.
    ///
    /// ## Flow
    /// 1. Validate (`item_id`, `delta != 0`, reason length) - no store call on failure
    /// 2. Conditional write: master update and history append in one transaction,
    ///    retried on version conflict up to `max_write_attempts`
    /// 3. Publish `items` and `stock_history` change events
    ///
    /// ## Example
    /// ```rust,ignore
    /// let receipt = ledger
    ///     .adjust_stock(&StockAdjustment::new(&item.id, 5, "restock"))
    ///     .await?;
    /// assert_eq!(receipt.quantity_after, receipt.quantity_before + 5);
    /// ```
    pub async fn adjust_stock(&self, adjustment: &StockAdjustment) -> LedgerResult<AdjustmentReceipt> {
        validate_id("item_id", &adjustment.item_id)?;
        validate_delta(adjustment.delta)?;
        validate_reason(&adjustment.reason)?;

        let draft = HistoryDraft {
            reason: adjustment.reason.trim().to_string(),
            occurred_at: adjustment.occurred_at.unwrap_or_else(Utc::now),
            snapshot: adjustment.snapshot.clone(),
        };

        let settings = &self.settings;
        let delta = adjustment.delta;
        let result = self
            .db
            .stock()
            .conditional_adjust(&adjustment.item_id, settings.max_write_attempts, &draft, |item| {
                plan_movement(&item.code, item.quantity, delta, settings)
            })
            .await;

        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!(item_id = %adjustment.item_id, delta, error = %err, "Stock adjustment failed");
                return Err(err);
            }
        };

        self.db.feed().publish(ChangeEvent::new(Collection::Items, &entry.item_id));
        self.db.feed().publish(ChangeEvent::new(Collection::StockHistory, &entry.id));

        info!(
            item_id = %entry.item_id,
            code = %entry.snapshot.code,
            delta = entry.delta,
            before = entry.quantity_before,
            after = entry.quantity_after,
            "Stock adjusted"
        );

        Ok(AdjustmentReceipt::from(&entry))
    }

    /// Applies each adjustment in order as its own atomic unit.
    ///
    /// A failure does not stop the batch and does not undo earlier commits.
    pub async fn bulk_adjust_stock(&self, adjustments: &[StockAdjustment]) -> BulkAdjustReport {
        let mut report = BulkAdjustReport::default();

        for (index, adjustment) in adjustments.iter().enumerate() {
            match self.adjust_stock(adjustment).await {
                Ok(receipt) => report.committed.push(receipt),
                Err(error) => report.failed.push(BatchFailure {
                    index,
                    item_id: adjustment.item_id.clone(),
                    error,
                }),
            }
        }

        info!(
            total = adjustments.len(),
            committed = report.committed.len(),
            failed = report.failed.len(),
            "Bulk stock adjustment finished"
        );

        report
    }

    /// Adds an item and records its opening stock.
    ///
    /// A zero opening quantity creates no history entry.
    pub async fn add_item(&self, new: NewItem) -> LedgerResult<InventoryItem> {
        validate_item_code(&new.code)?;
        validate_details(&new.details)?;
        validate_opening_quantity(new.opening_quantity)?;
        let reason = match new.reason.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => {
                validate_reason(reason)?;
                reason.to_string()
            }
            _ => OPENING_REASON.to_string(),
        };

        let now = stored_precision(Utc::now());
        let details = new.details;
        let item = InventoryItem {
            id: generate_id(),
            code: new.code.trim().to_string(),
            title: details.title.trim().to_string(),
            subject: details.subject,
            grade: details.grade,
            publisher: details.publisher,
            item_type: details.item_type,
            price_regular: details.price_regular,
            price_special: details.price_special,
            discount_regular_bps: details.discount_regular_bps,
            discount_special_bps: details.discount_special_bps,
            quantity: new.opening_quantity,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        let opening = (item.quantity > 0).then(|| StockHistoryEntry {
            id: generate_id(),
            seq: 0,
            item_id: item.id.clone(),
            snapshot: item.snapshot(),
            delta: item.quantity,
            quantity_before: 0,
            quantity_after: item.quantity,
            reason,
            occurred_at: now,
            committed_at: now,
        });

        self.db.items().insert(&item, opening.as_ref()).await?;

        self.db.feed().publish(ChangeEvent::new(Collection::Items, &item.id));
        if let Some(entry) = &opening {
            self.db.feed().publish(ChangeEvent::new(Collection::StockHistory, &entry.id));
        }

        info!(id = %item.id, code = %item.code, opening = item.quantity, "Item added");
        Ok(item)
    }

    /// Replaces descriptive fields and prices. Quantity is untouched.
    pub async fn update_item_details(&self, id: &str, details: ItemDetails) -> LedgerResult<InventoryItem> {
        validate_id("item_id", id)?;
        validate_details(&details)?;

        let details = ItemDetails {
            title: details.title.trim().to_string(),
            ..details
        };
        self.db.items().update_details(id, &details, Utc::now()).await?;
        self.db.feed().publish(ChangeEvent::new(Collection::Items, id));

        info!(id = %id, "Item details updated");
        self.get_item(id).await
    }

    pub async fn get_item(&self, id: &str) -> LedgerResult<InventoryItem> {
        validate_id("item_id", id)?;
        let item = self
            .db
            .items()
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))?;
        Ok(item)
    }

    pub async fn get_item_by_code(&self, code: &str) -> LedgerResult<InventoryItem> {
        let code = code.trim();
        validate_item_code(code)?;
        let item = self
            .db
            .items()
            .get_by_code(code)
            .await?
            .ok_or_else(|| DbError::not_found("Item", code))?;
        Ok(item)
    }

    /// Lists items whose code or title contains `search`.
    pub async fn list_items(&self, search: &str, limit: Option<u32>) -> LedgerResult<Loaded<InventoryItem>> {
        let search = validate_search_query(search)?;
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        Ok(self.db.items().list(&search, limit).await?)
    }

    /// Latest movements across all items, newest first.
    pub async fn recent_movements(&self, limit: Option<u32>) -> LedgerResult<Loaded<StockHistoryEntry>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        Ok(self.db.stock().recent(limit).await?)
    }

    /// The item with its full history in commit order.
    pub async fn stock_card(&self, item_id: &str) -> LedgerResult<StockCard> {
        let item = self.get_item(item_id).await?;
        let history = self.db.stock().history_for_item(item_id).await?;

        Ok(StockCard {
            item,
            entries: gudang_core::balance::sort_stock_history(history.records),
            quarantined: history.quarantined,
        })
    }
}

fn validate_details(details: &ItemDetails) -> LedgerResult<()> {
    validate_required_text("title", &details.title, MAX_TITLE_LEN)?;
    validate_price("price_regular", details.price_regular)?;
    validate_price("price_special", details.price_special)?;
    validate_discount_bps("discount_regular_bps", details.discount_regular_bps)?;
    validate_discount_bps("discount_special_bps", details.discount_special_bps)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WriteFailure;
    use crate::pool::DbConfig;
    use gudang_core::{CoreError, Money, ValidationError};
    use std::sync::Arc;

    async fn ledger(settings: LedgerSettings) -> StockLedger {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        StockLedger::new(db, settings)
    }

    fn new_item(code: &str, opening: i64) -> NewItem {
        NewItem {
            code: code.to_string(),
            details: ItemDetails {
                title: format!("Buku {}", code),
                price_regular: Money::from_rupiah(50_000),
                price_special: Money::from_rupiah(45_000),
                ..Default::default()
            },
            opening_quantity: opening,
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_restock_ten_to_fifteen() {
        let ledger = ledger(LedgerSettings::default()).await;
        let item = ledger.add_item(new_item("MTK-7A", 10)).await.unwrap();

        let receipt = ledger
            .adjust_stock(&StockAdjustment::new(&item.id, 5, "restock"))
            .await
            .unwrap();
        assert_eq!((receipt.quantity_before, receipt.quantity_after), (10, 15));

        let card = ledger.stock_card(&item.id).await.unwrap();
        assert_eq!(card.item.quantity, 15);
        assert_eq!(card.entries.len(), 2);
        assert_eq!(card.entries[0].reason, OPENING_REASON);
        assert_eq!(card.entries[1].id, receipt.history_entry_id);
        assert_eq!(card.verify(), Ok(()));
    }

    #[tokio::test]
    async fn test_negative_stock_follows_policy() {
        let permissive = ledger(LedgerSettings::default()).await;
        let item = permissive.add_item(new_item("IPA-8", 15)).await.unwrap();
        let receipt = permissive
            .adjust_stock(&StockAdjustment::new(&item.id, -20, "sale INV-202407-0001"))
            .await
            .unwrap();
        assert_eq!(receipt.quantity_after, -5);

        let strict = ledger(LedgerSettings::strict()).await;
        let item = strict.add_item(new_item("IPA-8", 15)).await.unwrap();
        let err = strict
            .adjust_stock(&StockAdjustment::new(&item.id, -20, "sale"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(CoreError::NegativeStock { .. })));

        let card = strict.stock_card(&item.id).await.unwrap();
        assert_eq!(card.item.quantity, 15);
        assert_eq!(card.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_delta_rejected_before_store() {
        let ledger = ledger(LedgerSettings::default()).await;
        let item = ledger.add_item(new_item("PKN-9", 4)).await.unwrap();

        let err = ledger
            .adjust_stock(&StockAdjustment::new(&item.id, 0, "noop"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::MustNotBeZero { .. })
        ));
        assert_eq!(err.to_string(), "Validation error: quantity must not be 0");

        let card = ledger.stock_card(&item.id).await.unwrap();
        assert_eq!(card.entries.len(), 1);
        assert_eq!(card.item.version, 0);
    }

    #[tokio::test]
    async fn test_bulk_reports_partial_failure() {
        let ledger = ledger(LedgerSettings::default()).await;
        let a = ledger.add_item(new_item("A-1", 10)).await.unwrap();
        let b = ledger.add_item(new_item("B-1", 10)).await.unwrap();

        let report = ledger
            .bulk_adjust_stock(&[
                StockAdjustment::new(&a.id, 3, "restock"),
                StockAdjustment::new("no-such-item", 1, "restock"),
                StockAdjustment::new(&b.id, -2, "damaged"),
            ])
            .await;

        assert!(!report.is_complete());
        assert_eq!(report.committed.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 1);
        assert!(matches!(
            report.failed[0].error,
            LedgerError::ConditionalWriteFailed {
                reason: WriteFailure::ItemNotFound,
                ..
            }
        ));

        assert_eq!(ledger.get_item(&a.id).await.unwrap().quantity, 13);
        assert_eq!(ledger.get_item(&b.id).await.unwrap().quantity, 8);

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, LedgerError::PartialBatchFailure { total: 3, .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adjustments_converge() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("gudang.db")).max_connections(8))
            .await
            .unwrap();
        let settings = LedgerSettings {
            max_write_attempts: 200,
            ..LedgerSettings::default()
        };
        let ledger = Arc::new(StockLedger::new(db, settings));
        let item = ledger.add_item(new_item("MTK-7A", 10)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..12 {
            let ledger = Arc::clone(&ledger);
            let id = item.id.clone();
            let delta = if i % 2 == 0 { 5 } else { -3 };
            handles.push(tokio::spawn(async move {
                ledger
                    .adjust_stock(&StockAdjustment::new(id, delta, "concurrent"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let card = ledger.stock_card(&item.id).await.unwrap();
        assert_eq!(card.item.quantity, 10 + 6 * 5 - 6 * 3);
        assert_eq!(card.entries.len(), 13);
        assert_eq!(card.verify(), Ok(()));
    }

    #[tokio::test]
    async fn test_adjustment_publishes_events() {
        let ledger = ledger(LedgerSettings::default()).await;
        let item = ledger.add_item(new_item("SBK-7", 1)).await.unwrap();

        let mut events = ledger.db.feed().subscribe();
        let receipt = ledger
            .adjust_stock(&StockAdjustment::new(&item.id, 2, "restock"))
            .await
            .unwrap();

        assert_eq!(events.recv().await.unwrap(), ChangeEvent::new(Collection::Items, &item.id));
        assert_eq!(
            events.recv().await.unwrap(),
            ChangeEvent::new(Collection::StockHistory, &receipt.history_entry_id)
        );
    }

    #[tokio::test]
    async fn test_history_keeps_snapshot_after_rename() {
        let ledger = ledger(LedgerSettings::default()).await;
        let item = ledger.add_item(new_item("BIG-7", 2)).await.unwrap();

        let mut details = ItemDetails {
            title: "Bahasa Inggris 7 (Kurikulum Merdeka)".to_string(),
            price_regular: item.price_regular,
            price_special: item.price_special,
            ..Default::default()
        };
        let updated = ledger.update_item_details(&item.id, details.clone()).await.unwrap();
        assert_eq!(updated.version, 1);

        ledger
            .adjust_stock(&StockAdjustment::new(&item.id, 1, "restock"))
            .await
            .unwrap();

        let card = ledger.stock_card(&item.id).await.unwrap();
        assert_eq!(card.entries[0].snapshot.title, "Buku BIG-7");
        assert_eq!(card.entries[1].snapshot.title, details.title);

        details.title = "  ".to_string();
        assert!(matches!(
            ledger.update_item_details(&item.id, details).await,
            Err(LedgerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_add_item_validation_and_duplicates() {
        let ledger = ledger(LedgerSettings::default()).await;

        let zero = ledger.add_item(new_item("ZERO-1", 0)).await.unwrap();
        assert!(ledger.stock_card(&zero.id).await.unwrap().entries.is_empty());

        let err = ledger.add_item(new_item("ZERO-1", 3)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Store(DbError::UniqueViolation { .. })));

        let err = ledger.add_item(new_item("NEG-1", -1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = ledger.get_item("missing").await.unwrap_err();
        assert!(matches!(err, LedgerError::Store(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_card_detects_broken_sum() {
        let ledger = ledger(LedgerSettings::default()).await;
        let item = ledger.add_item(new_item("TIK-8", 5)).await.unwrap();

        sqlx::query("UPDATE items SET quantity = 7 WHERE id = ?1")
            .bind(&item.id)
            .execute(ledger.db.pool())
            .await
            .unwrap();

        let card = ledger.stock_card(&item.id).await.unwrap();
        assert_eq!(card.verify(), Err(CardViolation::Sum { history: 5, on_hand: 7 }));
    }

    #[tokio::test]
    async fn test_lookup_by_code_and_recent_movements() {
        let ledger = ledger(LedgerSettings::default()).await;
        let a = ledger.add_item(new_item("BIN-9", 4)).await.unwrap();
        let b = ledger.add_item(new_item("ING-9", 6)).await.unwrap();
        ledger
            .adjust_stock(&StockAdjustment::new(&a.id, -1, "sample guru"))
            .await
            .unwrap();

        assert_eq!(ledger.get_item_by_code(" BIN-9 ").await.unwrap().id, a.id);
        assert!(ledger.get_item_by_code("NOPE-1").await.is_err());

        let recent = ledger.recent_movements(Some(2)).await.unwrap().records;
        let reasons: Vec<_> = recent.iter().map(|e| (e.item_id.clone(), e.reason.clone())).collect();
        assert_eq!(
            reasons,
            vec![
                (a.id.clone(), "sample guru".to_string()),
                (b.id.clone(), OPENING_REASON.to_string()),
            ]
        );

        // Limits outside 1..=MAX_LIST_LIMIT are clamped
        assert_eq!(ledger.recent_movements(Some(0)).await.unwrap().records.len(), 1);
        assert_eq!(ledger.recent_movements(Some(u32::MAX)).await.unwrap().records.len(), 3);
        assert_eq!(ledger.list_items("", Some(u32::MAX)).await.unwrap().records.len(), 2);
    }
}
