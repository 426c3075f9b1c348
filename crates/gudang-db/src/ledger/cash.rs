//! # Cash Ledger
//!
//! Signed cash mutations. Income is stored positive and expense negative,
//! whatever sign the operator typed; balances are never stored, they are
//! rebuilt from the log with `gudang_core::balance`.

use chrono::{DateTime, Utc};
use gudang_core::cash::{check_category, normalize_amount};
use gudang_core::validation::{validate_id, validate_note, validate_required_text};
use gudang_core::{
    CashFilter, CashMutationEntry, CashSummary, LedgerView, Money, MutationCategory, MutationKind,
};
use tracing::info;

use crate::error::{DbError, LedgerResult};
use crate::feed::{ChangeEvent, Collection};
use crate::pool::Database;
use crate::records::{stored_precision, CashRevision, Loaded};
use crate::repository::generate_id;

const MAX_PROOF_REF_LEN: usize = 200;

/// A mutation to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMutation {
    pub kind: MutationKind,
    pub category: MutationCategory,

    /// Magnitude; the sign is taken from `kind`.
    pub amount: Money,
    pub note: String,

    /// Defaults to now.
    pub occurred_at: Option<DateTime<Utc>>,
    pub proof_ref: Option<String>,
}

/// Changes to an existing mutation. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CashMutationEdit {
    pub amount: Option<Money>,
    pub category: Option<MutationCategory>,
    pub note: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,

    /// `Some(None)` clears the reference.
    pub proof_ref: Option<Option<String>>,
}

/// The cash mutation log.
#[derive(Debug, Clone)]
pub struct CashLedger {
    db: Database,
}

impl CashLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Appends a mutation.
    ///
    /// ## Errors
    /// - `Rejected(CategoryMismatch)` - category belongs to the other kind
    /// - `Validation` - zero amount, amount beyond `MAX_AMOUNT`, note or proof
    ///   reference too long
    pub async fn record_mutation(&self, new: NewMutation) -> LedgerResult<CashMutationEntry> {
        check_category(new.kind, new.category)?;
        let amount = normalize_amount(new.kind, new.amount)?;
        validate_note(&new.note)?;
        let proof_ref = clean_proof_ref(new.proof_ref)?;

        let now = stored_precision(Utc::now());
        let mut entry = CashMutationEntry {
            id: generate_id(),
            seq: 0,
            amount,
            category: new.category,
            note: new.note.trim().to_string(),
            occurred_at: stored_precision(new.occurred_at.unwrap_or(now)),
            proof_ref,
            revision: 0,
            created_at: now,
            updated_at: now,
        };

        entry.seq = self.db.cash().insert(&entry).await?;
        self.db.feed().publish(ChangeEvent::new(Collection::CashMutations, &entry.id));

        info!(
            id = %entry.id,
            category = %entry.category,
            amount = %entry.amount,
            "Cash mutation recorded"
        );
        Ok(entry)
    }

    /// Edits a mutation, keeping the previous values in its revision trail.
    ///
    /// The stored sign follows the (possibly new) category.
    pub async fn edit_mutation(&self, id: &str, edit: CashMutationEdit) -> LedgerResult<CashMutationEntry> {
        validate_id("mutation_id", id)?;

        let previous = self.get_mutation(id).await?;

        let category = edit.category.unwrap_or(previous.category);
        let amount = normalize_amount(category.kind(), edit.amount.unwrap_or(previous.amount))?;
        let note = match edit.note {
            Some(note) => {
                validate_note(&note)?;
                note.trim().to_string()
            }
            None => previous.note.clone(),
        };
        let proof_ref = match edit.proof_ref {
            Some(proof_ref) => clean_proof_ref(proof_ref)?,
            None => previous.proof_ref.clone(),
        };

        let now = stored_precision(Utc::now());
        let updated = CashMutationEntry {
            amount,
            category,
            note,
            occurred_at: edit.occurred_at.map(stored_precision).unwrap_or(previous.occurred_at),
            proof_ref,
            revision: previous.revision + 1,
            updated_at: now,
            ..previous.clone()
        };

        self.db.cash().update_with_revision(&previous, &updated, now).await?;
        self.db.feed().publish(ChangeEvent::new(Collection::CashMutations, id));

        info!(id = %id, revision = updated.revision, amount = %updated.amount, "Cash mutation edited");
        Ok(updated)
    }

    pub async fn get_mutation(&self, id: &str) -> LedgerResult<CashMutationEntry> {
        let entry = self
            .db
            .cash()
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Cash mutation", id))?;
        Ok(entry)
    }

    /// Previous values of a mutation, oldest edit first.
    pub async fn mutation_revisions(&self, id: &str) -> LedgerResult<Loaded<CashRevision>> {
        validate_id("mutation_id", id)?;
        Ok(self.db.cash().revisions(id).await?)
    }

    /// Every readable mutation in chronological order.
    pub async fn list_mutations(&self) -> LedgerResult<Loaded<CashMutationEntry>> {
        Ok(self.db.cash().list_all().await?)
    }

    /// The whole ledger with running balances.
    pub async fn view(&self) -> LedgerResult<LedgerView> {
        let loaded = self.list_mutations().await?;
        Ok(LedgerView::build(loaded.records)?)
    }

    /// Income, expense and net over the rows matching `filter`.
    pub async fn summary(&self, filter: &CashFilter) -> LedgerResult<CashSummary> {
        Ok(self.view().await?.filter(filter).summary()?)
    }
}

fn clean_proof_ref(proof_ref: Option<String>) -> LedgerResult<Option<String>> {
    match proof_ref.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(proof_ref) => {
            validate_required_text("proof_ref", proof_ref, MAX_PROOF_REF_LEN)?;
            Ok(Some(proof_ref.to_string()))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CashLedgerCache;
    use crate::error::LedgerError;
    use crate::pool::DbConfig;
    use chrono::{Duration, TimeZone};
    use gudang_core::{CoreError, ValidationError};

    async fn ledger() -> CashLedger {
        CashLedger::new(Database::new(DbConfig::in_memory()).await.unwrap())
    }

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, day, 9, 0, 0).unwrap()
    }

    fn income(amount: i64, at: DateTime<Utc>) -> NewMutation {
        NewMutation {
            kind: MutationKind::Income,
            category: MutationCategory::Sales,
            amount: Money::from_rupiah(amount),
            note: "penjualan".to_string(),
            occurred_at: Some(at),
            proof_ref: None,
        }
    }

    fn expense(amount: i64, at: DateTime<Utc>) -> NewMutation {
        NewMutation {
            kind: MutationKind::Expense,
            category: MutationCategory::Operational,
            amount: Money::from_rupiah(amount),
            note: "listrik".to_string(),
            occurred_at: Some(at),
            proof_ref: Some("KW-0012".to_string()),
        }
    }

    #[tokio::test]
    async fn test_running_balance_scenario() {
        let ledger = ledger().await;

        // Recorded out of order on purpose
        let c = ledger.record_mutation(income(200, t(3))).await.unwrap();
        let a = ledger.record_mutation(income(1000, t(1))).await.unwrap();
        let b = ledger.record_mutation(expense(400, t(2))).await.unwrap();
        assert_eq!(b.amount.rupiah(), -400);

        let view = ledger.view().await.unwrap();
        let rows: Vec<_> = view
            .rows
            .iter()
            .map(|r| (r.entry.id.clone(), r.balance.rupiah()))
            .collect();
        assert_eq!(rows, vec![(a.id, 1000), (b.id.clone(), 600), (c.id, 800)]);
        assert_eq!(view.closing.rupiah(), 800);

        let filtered = view.filter(&CashFilter {
            text: Some("listrik".to_string()),
            ..Default::default()
        });
        assert_eq!(filtered.rows[0].entry.id, b.id);
        assert_eq!(filtered.rows[0].balance.rupiah(), 600);
    }

    #[tokio::test]
    async fn test_sign_normalised_from_kind() {
        let ledger = ledger().await;

        let mut negative_income = income(-750, t(1));
        negative_income.category = MutationCategory::CapitalInjection;
        let entry = ledger.record_mutation(negative_income).await.unwrap();
        assert_eq!(entry.amount.rupiah(), 750);

        let entry = ledger.record_mutation(expense(-300, t(2))).await.unwrap();
        assert_eq!(entry.amount.rupiah(), -300);
    }

    #[tokio::test]
    async fn test_invalid_mutations_rejected() {
        let ledger = ledger().await;

        let err = ledger.record_mutation(income(0, t(1))).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ValidationError::MustNotBeZero { .. })));

        let mut mismatched = income(100, t(1));
        mismatched.category = MutationCategory::Salary;
        let err = ledger.record_mutation(mismatched).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(CoreError::CategoryMismatch { .. })));

        assert!(ledger.list_mutations().await.unwrap().records.is_empty());
    }

    #[tokio::test]
    async fn test_amounts_beyond_limit_rejected() {
        use gudang_core::MAX_AMOUNT;

        let ledger = ledger().await;

        let mut salary = expense(0, t(1));
        salary.category = MutationCategory::Salary;
        salary.amount = Money::from_rupiah(i64::MIN);
        let err = ledger.record_mutation(salary).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ValidationError::OutOfRange { .. })));

        for raw in [i64::MAX, MAX_AMOUNT + 1] {
            let err = ledger.record_mutation(income(raw, t(1))).await.unwrap_err();
            assert!(matches!(err, LedgerError::Validation(ValidationError::OutOfRange { .. })));
        }

        let entry = ledger.record_mutation(income(MAX_AMOUNT, t(1))).await.unwrap();
        let err = ledger
            .edit_mutation(
                &entry.id,
                CashMutationEdit {
                    amount: Some(Money::from_rupiah(i64::MAX)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ValidationError::OutOfRange { .. })));

        let view = ledger.view().await.unwrap();
        assert_eq!(view.closing.rupiah(), MAX_AMOUNT);
    }

    #[tokio::test]
    async fn test_oversized_stored_rows_do_not_break_the_view() {
        let ledger = ledger().await;
        ledger.record_mutation(income(1000, t(1))).await.unwrap();

        // Written straight to the store, past the ledger's validation
        for id in ["big-1", "big-2"] {
            let mut entry = ledger.record_mutation(income(1, t(2))).await.unwrap();
            entry.id = id.to_string();
            entry.amount = Money::from_rupiah(i64::MAX);
            ledger.db.cash().insert(&entry).await.unwrap();
        }

        let loaded = ledger.list_mutations().await.unwrap();
        assert_eq!(loaded.quarantined.len(), 2);

        let view = ledger.view().await.unwrap();
        assert_eq!(view.closing.rupiah(), 1002);
        let summary = ledger.summary(&CashFilter::default()).await.unwrap();
        assert_eq!(summary.income.rupiah(), 1002);
    }

    #[tokio::test]
    async fn test_edit_renormalises_and_keeps_trail() {
        let ledger = ledger().await;
        let entry = ledger.record_mutation(income(500, t(1))).await.unwrap();

        let edited = ledger
            .edit_mutation(
                &entry.id,
                CashMutationEdit {
                    category: Some(MutationCategory::Shipping),
                    note: Some("ongkir salah catat".to_string()),
                    proof_ref: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.amount.rupiah(), -500);
        assert_eq!(edited.revision, 1);
        assert_eq!(ledger.get_mutation(&entry.id).await.unwrap(), edited);

        let trail = ledger.mutation_revisions(&entry.id).await.unwrap();
        assert_eq!(trail.records.len(), 1);
        assert_eq!(trail.records[0].category, MutationCategory::Sales);
        assert_eq!(trail.records[0].amount.rupiah(), 500);

        let err = ledger
            .edit_mutation("missing", CashMutationEdit::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Store(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_summary_over_filter() {
        let ledger = ledger().await;
        ledger.record_mutation(income(1000, t(1))).await.unwrap();
        ledger.record_mutation(expense(400, t(2))).await.unwrap();
        ledger.record_mutation(income(200, t(3))).await.unwrap();

        let all = ledger.summary(&CashFilter::default()).await.unwrap();
        assert_eq!((all.income.rupiah(), all.expense.rupiah(), all.net.rupiah()), (1200, 400, 800));

        let first_two_days = ledger
            .summary(&CashFilter {
                from: Some(t(1)),
                to: Some(t(2) + Duration::hours(1)),
                text: None,
            })
            .await
            .unwrap();
        assert_eq!(first_two_days.net.rupiah(), 600);
        assert_eq!(first_two_days.count, 2);
    }

    #[tokio::test]
    async fn test_cache_follows_committed_writes() {
        let ledger = ledger().await;
        ledger.record_mutation(income(1000, t(1))).await.unwrap();

        let cache = CashLedgerCache::start(ledger.db.clone()).await.unwrap();
        assert_eq!(cache.current().closing.rupiah(), 1000);

        let mut sub = cache.subscribe();
        ledger.record_mutation(expense(400, t(2))).await.unwrap();

        let view = sub.changed().await.unwrap();
        assert_eq!(view.closing.rupiah(), 600);
        assert_eq!(view.len(), 2);
        assert_eq!(cache.current().closing.rupiah(), 600);
    }
}
