//! # Cash Mutations
//!
//! Categories, directions and sign normalisation for the cash ledger.
//!
//! ```text
//! ┌────────────────────────────┬────────────────────────────┐
//! │ Income (stored positive)   │ Expense (stored negative)  │
//! ├────────────────────────────┼────────────────────────────┤
//! │ sales                      │ purchase                   │
//! │ receivable_payment         │ salary                     │
//! │ capital_injection          │ operational                │
//! │ other_income               │ shipping                   │
//! │                            │ tax                        │
//! │                            │ other_expense              │
//! └────────────────────────────┴────────────────────────────┘
//! ```
//!
//! The caller's sign is ignored: `normalize_amount(Expense, 400)` and
//! `normalize_amount(Expense, -400)` both store `-400`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::validate_amount;

// =============================================================================
// Direction
// =============================================================================

/// Direction of a cash mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Income,
    Expense,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Income => "income",
            MutationKind::Expense => "expense",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(MutationKind::Income),
            "expense" => Ok(MutationKind::Expense),
            _ => Err(ValidationError::NotAllowed {
                field: "kind".to_string(),
                allowed: vec!["income".to_string(), "expense".to_string()],
            }),
        }
    }
}

// =============================================================================
// Category
// =============================================================================

/// Cash mutation category. Each belongs to exactly one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MutationCategory {
    Sales,
    ReceivablePayment,
    CapitalInjection,
    OtherIncome,
    Purchase,
    Salary,
    Operational,
    Shipping,
    Tax,
    OtherExpense,
}

impl MutationCategory {
    pub const ALL: [MutationCategory; 10] = [
        MutationCategory::Sales,
        MutationCategory::ReceivablePayment,
        MutationCategory::CapitalInjection,
        MutationCategory::OtherIncome,
        MutationCategory::Purchase,
        MutationCategory::Salary,
        MutationCategory::Operational,
        MutationCategory::Shipping,
        MutationCategory::Tax,
        MutationCategory::OtherExpense,
    ];

    /// The direction this category belongs to.
    pub fn kind(&self) -> MutationKind {
        match self {
            MutationCategory::Sales
            | MutationCategory::ReceivablePayment
            | MutationCategory::CapitalInjection
            | MutationCategory::OtherIncome => MutationKind::Income,
            MutationCategory::Purchase
            | MutationCategory::Salary
            | MutationCategory::Operational
            | MutationCategory::Shipping
            | MutationCategory::Tax
            | MutationCategory::OtherExpense => MutationKind::Expense,
        }
    }

    /// Stable tag stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationCategory::Sales => "sales",
            MutationCategory::ReceivablePayment => "receivable_payment",
            MutationCategory::CapitalInjection => "capital_injection",
            MutationCategory::OtherIncome => "other_income",
            MutationCategory::Purchase => "purchase",
            MutationCategory::Salary => "salary",
            MutationCategory::Operational => "operational",
            MutationCategory::Shipping => "shipping",
            MutationCategory::Tax => "tax",
            MutationCategory::OtherExpense => "other_expense",
        }
    }
}

impl fmt::Display for MutationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        MutationCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == tag)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "category".to_string(),
                allowed: MutationCategory::ALL
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .collect(),
            })
    }
}

// =============================================================================
// Sign Normalisation
// =============================================================================

/// Returns the stored amount for `kind`: positive for income, negative for
/// expense, whatever sign the caller used.
///
/// ## Example
/// ```rust
/// use gudang_core::cash::normalize_amount;
/// use gudang_core::{Money, MutationKind};
///
/// let out = normalize_amount(MutationKind::Expense, Money::from_rupiah(400)).unwrap();
/// assert_eq!(out.rupiah(), -400);
/// ```
pub fn normalize_amount(kind: MutationKind, amount: Money) -> CoreResult<Money> {
    if amount.is_zero() {
        return Err(ValidationError::MustNotBeZero {
            field: "amount".to_string(),
        }
        .into());
    }
    validate_amount("amount", amount)?;

    let magnitude = amount.checked_abs().ok_or_else(|| CoreError::AmountOverflow {
        context: "cash amount".to_string(),
    })?;
    Ok(match kind {
        MutationKind::Income => magnitude,
        MutationKind::Expense => -magnitude,
    })
}

/// Checks that `category` belongs to `kind`.
pub fn check_category(kind: MutationKind, category: MutationCategory) -> CoreResult<()> {
    if category.kind() != kind {
        return Err(CoreError::CategoryMismatch {
            category: category.to_string(),
            kind: kind.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Entry
// =============================================================================

/// One cash mutation as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashMutationEntry {
    pub id: String,

    /// Store insertion sequence; breaks timestamp ties.
    pub seq: i64,

    /// Signed: inflow positive, outflow negative.
    pub amount: Money,

    pub category: MutationCategory,
    pub note: String,

    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,

    /// Proof-of-payment reference (receipt number, transfer slip path).
    pub proof_ref: Option<String>,

    /// Number of edits applied since creation.
    pub revision: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CashMutationEntry {
    #[inline]
    pub fn kind(&self) -> MutationKind {
        self.category.kind()
    }

    /// Sign of `amount` matches the category's direction.
    pub fn sign_matches_category(&self) -> bool {
        match self.kind() {
            MutationKind::Income => self.amount.is_positive(),
            MutationKind::Expense => self.amount.is_negative(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ignores_caller_sign() {
        for raw in [400, -400] {
            let amount = Money::from_rupiah(raw);
            assert_eq!(
                normalize_amount(MutationKind::Expense, amount).unwrap().rupiah(),
                -400
            );
            assert_eq!(
                normalize_amount(MutationKind::Income, amount).unwrap().rupiah(),
                400
            );
        }
    }

    #[test]
    fn test_normalize_rejects_zero() {
        let err = normalize_amount(MutationKind::Income, Money::zero()).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: amount must not be 0");
    }

    #[test]
    fn test_normalize_rejects_out_of_range() {
        use crate::MAX_AMOUNT;

        for raw in [i64::MIN, i64::MAX, MAX_AMOUNT + 1, -MAX_AMOUNT - 1] {
            let err = normalize_amount(MutationKind::Expense, Money::from_rupiah(raw)).unwrap_err();
            assert!(matches!(err, CoreError::Validation(ValidationError::OutOfRange { .. })));
        }
        assert_eq!(
            normalize_amount(MutationKind::Expense, Money::from_rupiah(MAX_AMOUNT)).unwrap().rupiah(),
            -MAX_AMOUNT
        );
    }

    #[test]
    fn test_category_directions() {
        assert_eq!(MutationCategory::Sales.kind(), MutationKind::Income);
        assert_eq!(MutationCategory::Salary.kind(), MutationKind::Expense);
        assert!(check_category(MutationKind::Expense, MutationCategory::Tax).is_ok());

        let err = check_category(MutationKind::Income, MutationCategory::Salary).unwrap_err();
        assert!(matches!(err, CoreError::CategoryMismatch { .. }));
    }

    #[test]
    fn test_category_tags_roundtrip() {
        for category in MutationCategory::ALL {
            assert_eq!(category.as_str().parse::<MutationCategory>(), Ok(category));
        }
        assert!("gifts".parse::<MutationCategory>().is_err());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("Income".parse::<MutationKind>(), Ok(MutationKind::Income));
        assert!("refund".parse::<MutationKind>().is_err());
    }
}
