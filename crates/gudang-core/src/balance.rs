//! # Running Balances
//!
//! Rebuilds per-entry cumulative balances from an unordered ledger.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Sort by (occurred_at, seq, id)        O(n log n)                    │
//! │  2. Walk, accumulator starts at 0         O(n)                          │
//! │  3. Record entry id → accumulator                                       │
//! │                                                                         │
//! │  Filtering happens AFTER step 3, so a retained row always shows the     │
//! │  balance computed over the complete history:                            │
//! │                                                                         │
//! │   full:     +1000 → 1000   -400 → 600   +200 → 800                      │
//! │   filtered:                -400 → 600                (still 600)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sequence number assigned by the store breaks timestamp ties, so the
//! order is total and the result does not depend on the input order.
//!
//! Every sum is checked. A ledger whose balance leaves the i64 range fails
//! with `AmountOverflow` instead of wrapping.
//!
//! Stock history needs no recomputation: `quantity_after` is stored at
//! write time. [`sort_stock_history`] only orders entries for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use ts_rs::TS;

use crate::cash::{CashMutationEntry, MutationKind};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::StockHistoryEntry;

// =============================================================================
// Ordering
// =============================================================================

fn cash_order(a: &CashMutationEntry, b: &CashMutationEntry) -> Ordering {
    a.occurred_at
        .cmp(&b.occurred_at)
        .then(a.seq.cmp(&b.seq))
        .then_with(|| a.id.cmp(&b.id))
}

/// Orders stock history in commit order.
///
/// The store sequence is assigned under the write lock, so it is the commit
/// order even when two writers' clocks disagree.
pub fn sort_stock_history(mut entries: Vec<StockHistoryEntry>) -> Vec<StockHistoryEntry> {
    entries.sort_by_key(|e| e.seq);
    entries
}

// =============================================================================
// Running Balances
// =============================================================================

/// Entry id → cumulative balance after that entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunningBalances {
    balances: HashMap<String, Money>,
    closing: Money,
}

impl RunningBalances {
    pub fn balance_of(&self, id: &str) -> Option<Money> {
        self.balances.get(id).copied()
    }

    /// Balance after the last entry, zero for an empty ledger.
    pub fn closing_balance(&self) -> Money {
        self.closing
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

/// Replays `entries` in chronological order from a zero balance.
///
/// ## Example
/// ```rust
/// use gudang_core::balance::reconstruct_cash;
///
/// let balances = reconstruct_cash(&[]).unwrap();
/// assert!(balances.closing_balance().is_zero());
/// ```
pub fn reconstruct_cash(entries: &[CashMutationEntry]) -> CoreResult<RunningBalances> {
    let mut sorted: Vec<&CashMutationEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| cash_order(a, b));

    let mut balances = HashMap::with_capacity(sorted.len());
    let mut acc = Money::zero();
    for entry in sorted {
        acc = acc
            .checked_add(entry.amount)
            .ok_or_else(|| overflow("running balance"))?;
        balances.insert(entry.id.clone(), acc);
    }

    Ok(RunningBalances {
        balances,
        closing: acc,
    })
}

fn overflow(context: &str) -> CoreError {
    CoreError::AmountOverflow {
        context: context.to_string(),
    }
}

// =============================================================================
// Ledger View
// =============================================================================

/// One displayed row of the cash ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerRow {
    pub entry: CashMutationEntry,

    /// Cumulative balance over the full ledger up to and including `entry`.
    pub balance: Money,
}

/// Row filter for the cash ledger screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashFilter {
    /// Inclusive lower bound on `occurred_at`.
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,

    /// Inclusive upper bound on `occurred_at`.
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,

    /// Case-insensitive match on note, category tag or proof reference.
    pub text: Option<String>,
}

impl CashFilter {
    pub fn matches(&self, entry: &CashMutationEntry) -> bool {
        if self.from.is_some_and(|from| entry.occurred_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.occurred_at > to) {
            return false;
        }

        match self.text.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(text) => {
                let needle = text.to_lowercase();
                entry.note.to_lowercase().contains(&needle)
                    || entry.category.as_str().contains(&needle)
                    || entry
                        .proof_ref
                        .as_deref()
                        .is_some_and(|p| p.to_lowercase().contains(&needle))
            }
        }
    }
}

/// The cash ledger in chronological order with balances attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerView {
    pub rows: Vec<LedgerRow>,

    /// Closing balance of the complete ledger, unaffected by filtering.
    pub closing: Money,
}

impl LedgerView {
    pub fn build(entries: Vec<CashMutationEntry>) -> CoreResult<Self> {
        let balances = reconstruct_cash(&entries)?;

        let mut entries = entries;
        entries.sort_by(cash_order);

        let rows = entries
            .into_iter()
            .map(|entry| {
                let balance = balances.balance_of(&entry.id).unwrap_or_default();
                LedgerRow { entry, balance }
            })
            .collect();

        Ok(Self {
            rows,
            closing: balances.closing_balance(),
        })
    }

    /// Keeps matching rows. Balances are carried over untouched.
    pub fn filter(&self, filter: &CashFilter) -> LedgerView {
        LedgerView {
            rows: self
                .rows
                .iter()
                .filter(|row| filter.matches(&row.entry))
                .cloned()
                .collect(),
            closing: self.closing,
        }
    }

    pub fn summary(&self) -> CoreResult<CashSummary> {
        CashSummary::of(self.rows.iter().map(|row| &row.entry))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Totals over a set of cash mutations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashSummary {
    /// Sum of inflows.
    pub income: Money,

    /// Sum of outflows as a positive magnitude.
    pub expense: Money,

    /// `income - expense`.
    pub net: Money,

    pub count: usize,
}

impl CashSummary {
    pub fn of<'a>(entries: impl IntoIterator<Item = &'a CashMutationEntry>) -> CoreResult<Self> {
        let mut summary = CashSummary::default();
        for entry in entries {
            let magnitude = entry.amount.checked_abs().ok_or_else(|| overflow("cash summary"))?;
            let total = match entry.kind() {
                MutationKind::Income => &mut summary.income,
                MutationKind::Expense => &mut summary.expense,
            };
            *total = total.checked_add(magnitude).ok_or_else(|| overflow("cash summary"))?;
            summary.count += 1;
        }
        summary.net = summary
            .income
            .checked_sub(summary.expense)
            .ok_or_else(|| overflow("cash summary"))?;
        Ok(summary)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cash::MutationCategory;
    use chrono::{Duration, TimeZone};

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, day, 9, 0, 0).unwrap()
    }

    fn mutation(id: &str, seq: i64, amount: i64, at: DateTime<Utc>) -> CashMutationEntry {
        let category = if amount >= 0 {
            MutationCategory::Sales
        } else {
            MutationCategory::Operational
        };
        CashMutationEntry {
            id: id.to_string(),
            seq,
            amount: Money::from_rupiah(amount),
            category,
            note: format!("note {}", id),
            occurred_at: at,
            proof_ref: None,
            revision: 0,
            created_at: at,
            updated_at: at,
        }
    }

    fn sample() -> Vec<CashMutationEntry> {
        vec![
            mutation("c", 3, 200, t(3)),
            mutation("a", 1, 1000, t(1)),
            mutation("b", 2, -400, t(2)),
        ]
    }

    #[test]
    fn test_balances_in_timestamp_order() {
        let balances = reconstruct_cash(&sample()).unwrap();
        assert_eq!(balances.balance_of("a"), Some(Money::from_rupiah(1000)));
        assert_eq!(balances.balance_of("b"), Some(Money::from_rupiah(600)));
        assert_eq!(balances.balance_of("c"), Some(Money::from_rupiah(800)));
        assert_eq!(balances.closing_balance().rupiah(), 800);
    }

    #[test]
    fn test_reconstruction_is_idempotent_and_order_free() {
        let entries = sample();
        let first = reconstruct_cash(&entries).unwrap();
        let second = reconstruct_cash(&entries).unwrap();
        assert_eq!(first, second);

        let mut reversed = entries.clone();
        reversed.reverse();
        assert_eq!(reconstruct_cash(&reversed).unwrap(), first);
    }

    #[test]
    fn test_timestamp_ties_break_on_seq() {
        let at = t(5);
        let mut entries = vec![mutation("late", 9, -300, at), mutation("early", 4, 500, at)];
        let view = LedgerView::build(entries.clone()).unwrap();
        assert_eq!(view.rows[0].entry.id, "early");
        assert_eq!(view.rows[0].balance.rupiah(), 500);
        assert_eq!(view.rows[1].balance.rupiah(), 200);

        entries.reverse();
        assert_eq!(LedgerView::build(entries).unwrap(), view);
    }

    #[test]
    fn test_filter_keeps_full_set_balances() {
        let view = LedgerView::build(sample()).unwrap();

        let by_date = view.filter(&CashFilter {
            from: Some(t(2)),
            to: Some(t(2) + Duration::hours(1)),
            text: None,
        });
        assert_eq!(by_date.len(), 1);
        assert_eq!(by_date.rows[0].entry.id, "b");
        assert_eq!(by_date.rows[0].balance.rupiah(), 600);

        let by_text = view.filter(&CashFilter {
            text: Some("NOTE C".to_string()),
            ..Default::default()
        });
        assert_eq!(by_text.rows[0].balance.rupiah(), 800);

        for row in view.filter(&CashFilter::default()).rows {
            let full = view.rows.iter().find(|r| r.entry.id == row.entry.id).unwrap();
            assert_eq!(full.balance, row.balance);
        }
    }

    #[test]
    fn test_summary() {
        let summary = LedgerView::build(sample()).unwrap().summary().unwrap();
        assert_eq!(summary.income.rupiah(), 1200);
        assert_eq!(summary.expense.rupiah(), 400);
        assert_eq!(summary.net.rupiah(), 800);
        assert_eq!(summary.count, 3);
    }

    #[test]
    fn test_balance_overflow_is_an_error() {
        let entries = vec![
            mutation("a", 1, i64::MAX, t(1)),
            mutation("b", 2, i64::MAX, t(2)),
        ];

        let err = reconstruct_cash(&entries).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { .. }));
        assert!(LedgerView::build(entries.clone()).is_err());
        assert!(CashSummary::of(&entries).is_err());
    }

    #[test]
    fn test_summary_rejects_unrepresentable_magnitude() {
        let entries = vec![mutation("a", 1, i64::MIN, t(1))];
        let err = CashSummary::of(&entries).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { .. }));
    }

    #[test]
    fn test_empty_ledger() {
        let view = LedgerView::build(Vec::new()).unwrap();
        assert!(view.is_empty());
        assert!(view.closing.is_zero());
    }

    #[test]
    fn test_sort_stock_history_by_commit() {
        use crate::types::ItemSnapshot;

        let make = |id: &str, seq: i64, at: DateTime<Utc>| StockHistoryEntry {
            id: id.to_string(),
            seq,
            item_id: "item-1".to_string(),
            snapshot: ItemSnapshot::default(),
            delta: 1,
            quantity_before: 0,
            quantity_after: 1,
            reason: String::new(),
            occurred_at: at,
            committed_at: at,
        };

        let sorted = sort_stock_history(vec![make("z", 3, t(2)), make("y", 2, t(2)), make("x", 1, t(1))]);
        let ids: Vec<_> = sorted.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["x", "y", "z"]);
    }
}
