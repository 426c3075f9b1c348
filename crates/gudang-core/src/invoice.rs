//! # Invoice Numbers
//!
//! Invoice keys have the form `INV-YYYYMM-NNNN`: year, month and a four
//! digit sequence that restarts every month. Zero padding keeps keys of one
//! month in lexicographic order.
//!
//! Sequences are minted by the store's per-period counter; this module only
//! formats, parses and advances keys.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};

use crate::error::{CoreError, CoreResult};

const PREFIX: &str = "INV-";

/// Largest sequence that fits the four digit field.
pub const MAX_INVOICE_SEQ: u32 = 9999;

/// A parsed invoice key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvoiceNumber {
    pub year: i32,
    pub month: u32,
    pub seq: u32,
}

impl InvoiceNumber {
    /// Builds a key, checking the month and sequence ranges.
    pub fn new(year: i32, month: u32, seq: u32) -> CoreResult<Self> {
        if !(1000..=9999).contains(&year) || !(1..=12).contains(&month) || seq == 0 {
            return Err(CoreError::InvalidInvoiceNumber(format!(
                "{}{:04}{:02}-{:04}",
                PREFIX, year, month, seq
            )));
        }
        if seq > MAX_INVOICE_SEQ {
            return Err(CoreError::InvoiceSequenceExhausted {
                period: period_key(year, month),
            });
        }
        Ok(Self { year, month, seq })
    }

    /// First key of the month containing `at`.
    pub fn first_of(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
            seq: 1,
        }
    }

    /// `YYYYMM`, the counter key for this invoice's month.
    pub fn period(&self) -> String {
        period_key(self.year, self.month)
    }

    /// The key following `self` in the same month.
    ///
    /// ## Example
    /// ```rust
    /// use gudang_core::InvoiceNumber;
    ///
    /// let last: InvoiceNumber = "INV-202407-0041".parse().unwrap();
    /// assert_eq!(last.next().unwrap().to_string(), "INV-202407-0042");
    /// ```
    pub fn next(&self) -> CoreResult<Self> {
        Self::new(self.year, self.month, self.seq + 1)
    }
}

/// `YYYYMM` for a year and month.
pub fn period_key(year: i32, month: u32) -> String {
    format!("{:04}{:02}", year, month)
}

/// `YYYYMM` for the month containing `at`.
pub fn period_of(at: DateTime<Utc>) -> String {
    period_key(at.year(), at.month())
}

/// Prefix shared by all invoice keys of a period, for `LIKE` scans.
pub fn period_prefix(period: &str) -> String {
    format!("{}{}-", PREFIX, period)
}

/// Sequence the counter should resume from, given the last existing key of
/// the period. `None` means the period is empty.
pub fn next_after(last: Option<&str>) -> CoreResult<u32> {
    match last {
        None => Ok(1),
        Some(key) => Ok(key.parse::<InvoiceNumber>()?.seq + 1),
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:04}{:02}-{:04}",
            PREFIX, self.year, self.month, self.seq
        )
    }
}

impl FromStr for InvoiceNumber {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidInvoiceNumber(s.to_string());

        let rest = s.strip_prefix(PREFIX).ok_or_else(invalid)?;
        let (period, seq) = rest.split_once('-').ok_or_else(invalid)?;

        if period.len() != 6
            || seq.len() != 4
            || !period.bytes().all(|b| b.is_ascii_digit())
            || !seq.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let year: i32 = period[..4].parse().map_err(|_| invalid())?;
        let month: u32 = period[4..].parse().map_err(|_| invalid())?;
        let seq: u32 = seq.parse().map_err(|_| invalid())?;

        Self::new(year, month, seq).map_err(|_| invalid())
    }
}

impl Serialize for InvoiceNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InvoiceNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
