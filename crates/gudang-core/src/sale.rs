//! # Sales
//!
//! Sale lines, payments and the derived payment status.
//!
//! ## Payment Status
//! ```text
//! ┌────────────────────────┬──────────────┐
//! │ amount_paid            │ status       │
//! ├────────────────────────┼──────────────┤
//! │ 0                      │ Belum Bayar  │
//! │ 0 < paid < total       │ Sebagian     │
//! │ paid >= total          │ Lunas        │
//! └────────────────────────┴──────────────┘
//! ```
//!
//! Status is never stored. It is recomputed from `(total, amount_paid)`
//! wherever it is shown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::invoice::InvoiceNumber;
use crate::money::Money;
use crate::types::{InventoryItem, PriceTier};
use crate::validation::{validate_line_quantity, validate_positive_amount};

// =============================================================================
// Payment Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentStatus {
    #[serde(rename = "Belum Bayar")]
    Unpaid,
    #[serde(rename = "Sebagian")]
    Partial,
    #[serde(rename = "Lunas")]
    Paid,
}

impl PaymentStatus {
    /// Derives the status from the invoice total and the amount paid.
    ///
    /// ## Example
    /// ```rust
    /// use gudang_core::{Money, PaymentStatus};
    ///
    /// let total = Money::from_rupiah(100_000);
    /// assert_eq!(PaymentStatus::from_amounts(total, Money::zero()), PaymentStatus::Unpaid);
    /// assert_eq!(PaymentStatus::from_amounts(total, Money::from_rupiah(40_000)), PaymentStatus::Partial);
    /// assert_eq!(PaymentStatus::from_amounts(total, total), PaymentStatus::Paid);
    /// ```
    pub fn from_amounts(total: Money, paid: Money) -> Self {
        if paid >= total {
            PaymentStatus::Paid
        } else if paid.is_positive() {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Belum Bayar",
            PaymentStatus::Partial => "Sebagian",
            PaymentStatus::Paid => "Lunas",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "transfer" => Ok(PaymentMethod::Transfer),
            _ => Err(ValidationError::NotAllowed {
                field: "method".to_string(),
                allowed: vec!["cash".to_string(), "transfer".to_string()],
            }),
        }
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// One priced line of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub item_id: String,

    /// Item code at sale time.
    pub code: String,

    /// Item title at sale time.
    pub title: String,

    pub quantity: i64,

    /// List price of the tier used.
    pub unit_price: Money,

    pub discount_bps: u32,

    /// `(unit_price - discount) × quantity`.
    pub line_total: Money,
}

impl SaleLine {
    /// Prices `quantity` units of `item` at `tier`.
    pub fn price(item: &InventoryItem, tier: PriceTier, quantity: i64) -> CoreResult<Self> {
        validate_line_quantity(quantity)?;

        let (unit_price, discount_bps) = item.price_for(tier);
        let line_total = unit_price
            .apply_discount_bps(discount_bps)
            .checked_mul(quantity)
            .ok_or_else(|| CoreError::AmountOverflow {
                context: format!("line total for {}", item.code),
            })?;

        Ok(Self {
            item_id: item.id.clone(),
            code: item.code.clone(),
            title: item.title.clone(),
            quantity,
            unit_price,
            discount_bps,
            line_total,
        })
    }
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentRecord {
    pub id: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub note: String,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
}

// =============================================================================
// Sales Transaction
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesTransaction {
    #[ts(as = "String")]
    pub invoice: InvoiceNumber,
    pub customer_id: Option<String>,
    pub lines: Vec<SaleLine>,
    pub total: Money,
    pub amount_paid: Money,
    pub payments: Vec<PaymentRecord>,
    pub note: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SalesTransaction {
    #[inline]
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from_amounts(self.total, self.amount_paid)
    }

    pub fn outstanding(&self) -> Money {
        self.total
            .checked_sub(self.amount_paid)
            .filter(|due| !due.is_negative())
            .unwrap_or_default()
    }

    /// Checks that a payment of `amount` may be recorded.
    pub fn check_payment(&self, amount: Money) -> CoreResult<()> {
        validate_positive_amount("amount", amount)?;

        let outstanding = self.outstanding();
        if amount > outstanding {
            return Err(CoreError::Overpayment {
                invoice: self.invoice.to_string(),
                amount: amount.rupiah(),
                outstanding: outstanding.rupiah(),
            });
        }
        Ok(())
    }
}

/// Sum of line totals.
pub fn total_of(lines: &[SaleLine]) -> CoreResult<Money> {
    lines
        .iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line.line_total))
        .ok_or_else(|| CoreError::AmountOverflow {
            context: "invoice total".to_string(),
        })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> InventoryItem {
        let now = Utc::now();
        InventoryItem {
            id: "item-1".to_string(),
            code: "IPA-8".to_string(),
            title: "IPA Kelas 8".to_string(),
            subject: None,
            grade: None,
            publisher: None,
            item_type: None,
            price_regular: Money::from_rupiah(60_000),
            price_special: Money::from_rupiah(55_000),
            discount_regular_bps: 500,
            discount_special_bps: 1000,
            quantity: 100,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn sale(total: i64, paid: i64) -> SalesTransaction {
        SalesTransaction {
            invoice: InvoiceNumber::new(2024, 7, 1).unwrap(),
            customer_id: None,
            lines: Vec::new(),
            total: Money::from_rupiah(total),
            amount_paid: Money::from_rupiah(paid),
            payments: Vec::new(),
            note: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_line_pricing_per_tier() {
        let regular = SaleLine::price(&item(), PriceTier::Regular, 3).unwrap();
        assert_eq!(regular.unit_price.rupiah(), 60_000);
        assert_eq!(regular.line_total.rupiah(), 171_000);

        let special = SaleLine::price(&item(), PriceTier::Special, 3).unwrap();
        assert_eq!(special.line_total.rupiah(), 148_500);

        assert_eq!(total_of(&[regular, special]).unwrap().rupiah(), 319_500);
    }

    #[test]
    fn test_line_rejects_bad_quantity() {
        assert!(SaleLine::price(&item(), PriceTier::Regular, 0).is_err());
    }

    #[test]
    fn test_line_and_total_overflow_rejected() {
        let mut pricey = item();
        pricey.price_regular = Money::from_rupiah(i64::MAX / 2);
        pricey.discount_regular_bps = 0;
        let err = SaleLine::price(&pricey, PriceTier::Regular, 3).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { .. }));

        let mut line = SaleLine::price(&item(), PriceTier::Regular, 1).unwrap();
        line.line_total = Money::from_rupiah(i64::MAX);
        let err = total_of(&[line.clone(), line]).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { .. }));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(sale(100, 0).status().to_string(), "Belum Bayar");
        assert_eq!(sale(100, 40).status().to_string(), "Sebagian");
        assert_eq!(sale(100, 100).status().to_string(), "Lunas");
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Partial).unwrap(),
            "\"Sebagian\""
        );
    }

    #[test]
    fn test_zero_total_is_paid() {
        assert_eq!(sale(0, 0).status(), PaymentStatus::Paid);
    }

    #[test]
    fn test_overpayment_rejected() {
        let s = sale(100_000, 60_000);
        assert!(s.check_payment(Money::from_rupiah(40_000)).is_ok());
        assert_eq!(
            s.check_payment(Money::from_rupiah(40_001)),
            Err(CoreError::Overpayment {
                invoice: "INV-202407-0001".to_string(),
                amount: 40_001,
                outstanding: 40_000,
            })
        );
        assert!(s.check_payment(Money::zero()).is_err());
    }
}
