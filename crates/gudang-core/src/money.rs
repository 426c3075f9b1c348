//! # Money Module
//!
//! Provides the `Money` type for rupiah amounts.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Rupiah is traded in whole units. Every amount in the ledger is an     │
//! │  i64 count of rupiah, so a running balance replayed over ten thousand  │
//! │  entries ends exactly where the sum says it should.                    │
//! │                                                                         │
//! │  Discounts are basis points (1000 = 10%) applied with integer math,    │
//! │  rounding half up.                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use gudang_core::money::Money;
//!
//! let price = Money::from_rupiah(45_000);
//! let line = price.checked_mul(3).unwrap();
//! assert_eq!(line.rupiah(), 135_000);
//! assert_eq!(line.to_string(), "Rp135.000");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::MAX_DISCOUNT_BPS;

// =============================================================================
// Money Type
// =============================================================================

/// A signed amount of rupiah.
///
/// Signed so the cash ledger can carry outflows as negative amounts and the
/// running balance can dip below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole rupiah.
    #[inline]
    pub const fn from_rupiah(rupiah: i64) -> Self {
        Money(rupiah)
    }

    /// Returns the value in rupiah.
    #[inline]
    pub const fn rupiah(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Absolute value, `None` for `i64::MIN`.
    #[inline]
    pub const fn checked_abs(&self) -> Option<Money> {
        match self.0.checked_abs() {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Multiplies a unit price by a quantity, `None` on overflow.
    #[inline]
    pub fn checked_mul(self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Returns the amount left after a percentage discount.
    ///
    /// ## Arguments
    /// * `discount_bps` - Discount in basis points (1000 = 10%), clamped to 100%
    ///
    /// ## Example
    /// ```rust
    /// use gudang_core::money::Money;
    ///
    /// let price = Money::from_rupiah(45_000);
    /// assert_eq!(price.apply_discount_bps(1500).rupiah(), 38_250); // 15% off
    /// ```
    pub fn apply_discount_bps(&self, discount_bps: u32) -> Money {
        let bps = discount_bps.min(MAX_DISCOUNT_BPS) as i128;
        // i128 keeps large bulk orders from overflowing the intermediate product
        let discount = (self.0 as i128 * bps + 5000) / 10000;
        Money(self.0 - discount as i64)
    }

    /// Checked addition, `None` on overflow.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Checked subtraction, `None` on overflow.
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Formats as `Rp1.250.000` (dot thousands separator, as printed on invoices).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}Rp{}", sign, grouped)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
