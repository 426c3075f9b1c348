//! # Stock Movements
//!
//! Plans a single stock adjustment and checks the two history invariants.
//!
//! ## Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Per entry:   quantity_after == quantity_before + delta                 │
//! │                                                                         │
//! │  Per item, in commit order:                                             │
//! │     entry[0].quantity_before == opening (0 for new items)               │
//! │     entry[i].quantity_before == entry[i-1].quantity_after               │
//! │     item.quantity            == opening + Σ delta                       │
//! │                                                                         │
//! │  ┌──────┐  +10   ┌──────┐  +5    ┌──────┐  -20   ┌──────┐             │
//! │  │  0   │ ─────► │  10  │ ─────► │  15  │ ─────► │  -5  │             │
//! │  └──────┘        └──────┘        └──────┘        └──────┘             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store calls [`plan_movement`] on every compare-and-swap attempt with
//! the quantity it just read, so the negative-stock policy is evaluated
//! against the value that actually commits.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::settings::LedgerSettings;
use crate::types::StockHistoryEntry;
use crate::validation::validate_delta;

// =============================================================================
// Stock Movement
// =============================================================================

/// A planned quantity change for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovement {
    pub delta: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
}

/// Computes the movement for `delta` against the quantity currently on hand.
///
/// ## Errors
/// - `Validation` when `delta` is zero
/// - `NegativeStock` when the result is below zero and the policy forbids it
/// - `InvalidRecord` when the addition overflows
pub fn plan_movement(
    code: &str,
    current: i64,
    delta: i64,
    settings: &LedgerSettings,
) -> CoreResult<StockMovement> {
    validate_delta(delta)?;

    let after = current
        .checked_add(delta)
        .ok_or_else(|| CoreError::invalid_record("item", code, "quantity overflow"))?;

    if after < 0 && !settings.allow_negative_stock {
        return Err(CoreError::NegativeStock {
            code: code.to_string(),
            on_hand: current,
            delta,
        });
    }

    Ok(StockMovement {
        delta,
        quantity_before: current,
        quantity_after: after,
    })
}

/// Sum of deltas, the quantity an item should hold given its history.
pub fn sum_deltas<'a>(entries: impl IntoIterator<Item = &'a StockHistoryEntry>) -> i64 {
    entries.into_iter().map(|e| e.delta).sum()
}

// =============================================================================
// Chain Verification
// =============================================================================

/// The first place a history chain breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    /// An entry whose own arithmetic does not add up.
    Arithmetic { entry_id: String },

    /// An entry that does not start where the previous one ended.
    Gap {
        entry_id: String,
        expected_before: i64,
        actual_before: i64,
    },
}

impl fmt::Display for ChainViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainViolation::Arithmetic { entry_id } => {
                write!(f, "entry {} has before + delta != after", entry_id)
            }
            ChainViolation::Gap {
                entry_id,
                expected_before,
                actual_before,
            } => write!(
                f,
                "entry {} starts at {} but the previous entry ended at {}",
                entry_id, actual_before, expected_before
            ),
        }
    }
}

/// Walks `entries` (already in commit order) and returns the first violation.
///
/// On success returns the closing quantity.
///
/// ## Example
/// ```rust
/// use gudang_core::stock::verify_stock_chain;
///
/// let closing = verify_stock_chain(0, &[]).unwrap();
/// assert_eq!(closing, 0);
/// ```
pub fn verify_stock_chain(
    opening: i64,
    entries: &[StockHistoryEntry],
) -> Result<i64, ChainViolation> {
    let mut expected = opening;

    for entry in entries {
        if !entry.is_consistent() {
            return Err(ChainViolation::Arithmetic {
                entry_id: entry.id.clone(),
            });
        }
        if entry.quantity_before != expected {
            return Err(ChainViolation::Gap {
                entry_id: entry.id.clone(),
                expected_before: expected,
                actual_before: entry.quantity_before,
            });
        }
        expected = entry.quantity_after;
    }

    Ok(expected)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemSnapshot;
    use chrono::Utc;

    fn entry(id: &str, seq: i64, before: i64, delta: i64) -> StockHistoryEntry {
        let now = Utc::now();
        StockHistoryEntry {
            id: id.to_string(),
            seq,
            item_id: "item-1".to_string(),
            snapshot: ItemSnapshot::default(),
            delta,
            quantity_before: before,
            quantity_after: before + delta,
            reason: String::new(),
            occurred_at: now,
            committed_at: now,
        }
    }

    #[test]
    fn test_restock_then_oversell() {
        let settings = LedgerSettings::default();

        let restock = plan_movement("MTK-7A", 10, 5, &settings).unwrap();
        assert_eq!(restock.quantity_before, 10);
        assert_eq!(restock.quantity_after, 15);

        let sale = plan_movement("MTK-7A", 15, -20, &settings).unwrap();
        assert_eq!(sale.quantity_after, -5);
    }

    #[test]
    fn test_strict_policy_rejects_negative() {
        let err = plan_movement("MTK-7A", 15, -20, &LedgerSettings::strict()).unwrap_err();
        assert_eq!(
            err,
            CoreError::NegativeStock {
                code: "MTK-7A".to_string(),
                on_hand: 15,
                delta: -20,
            }
        );

        // Down to exactly zero is fine
        let ok = plan_movement("MTK-7A", 15, -15, &LedgerSettings::strict()).unwrap();
        assert_eq!(ok.quantity_after, 0);
    }

    #[test]
    fn test_zero_delta_rejected() {
        let err = plan_movement("MTK-7A", 10, 0, &LedgerSettings::default()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_overflow_rejected() {
        let err = plan_movement("MTK-7A", i64::MAX, 1, &LedgerSettings::default()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord { .. }));
    }

    #[test]
    fn test_chain_verification() {
        let entries = vec![entry("a", 1, 0, 10), entry("b", 2, 10, 5), entry("c", 3, 15, -20)];
        assert_eq!(verify_stock_chain(0, &entries), Ok(-5));
        assert_eq!(sum_deltas(&entries), -5);
    }

    #[test]
    fn test_chain_gap_detected() {
        let entries = vec![entry("a", 1, 0, 10), entry("b", 2, 12, 5)];
        assert_eq!(
            verify_stock_chain(0, &entries),
            Err(ChainViolation::Gap {
                entry_id: "b".to_string(),
                expected_before: 10,
                actual_before: 12,
            })
        );
    }

    #[test]
    fn test_chain_arithmetic_detected() {
        let mut broken = entry("a", 1, 0, 10);
        broken.quantity_after = 11;
        assert_eq!(
            verify_stock_chain(0, &[broken]),
            Err(ChainViolation::Arithmetic {
                entry_id: "a".to_string()
            })
        );
    }
}
