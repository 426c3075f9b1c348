//! # Ledger Settings
//!
//! Policy knobs the ledger services consult on every write. Loaded from the
//! `[ledger]` section of the back-office config file.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Ledger policy.
///
/// ## Example
/// ```rust
/// use gudang_core::LedgerSettings;
///
/// let strict: LedgerSettings =
///     serde_json::from_str(r#"{"allow_negative_stock": false}"#).unwrap();
/// assert!(!strict.allow_negative_stock);
/// assert_eq!(strict.max_write_attempts, 25);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct LedgerSettings {
    /// Whether an adjustment may leave an item below zero (backorders).
    pub allow_negative_stock: bool,

    /// Upper bound on compare-and-swap attempts for one stock adjustment.
    pub max_write_attempts: u32,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            allow_negative_stock: true,
            max_write_attempts: 25,
        }
    }
}

impl LedgerSettings {
    /// Settings that reject any movement below zero.
    pub fn strict() -> Self {
        Self {
            allow_negative_stock: false,
            ..Self::default()
        }
    }
}
