//! # Domain Types
//!
//! Inventory and customer types shared by the store and the ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐   ┌─────────────────┐  │
//! │  │ InventoryItem   │   │  StockHistoryEntry   │   │    Customer     │  │
//! │  │  ─────────────  │   │  ──────────────────  │   │  ─────────────  │  │
//! │  │  id (UUID)      │◄──│  item_id             │   │  id (UUID)      │  │
//! │  │  code, title    │   │  snapshot (frozen)   │   │  name, phone    │  │
//! │  │  prices × tier  │   │  delta               │   │  special_pricing│  │
//! │  │  quantity       │   │  before / after      │   └─────────────────┘  │
//! │  │  version (CAS)  │   │  reason, timestamps  │                        │
//! │  └─────────────────┘   └──────────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! History entries copy the item's descriptive fields at commit time, so the
//! stock card still reads correctly after the item is renamed or re-priced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Price Tier
// =============================================================================

/// Which price list applies to a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    /// Walk-in and ordinary school customers.
    #[default]
    Regular,
    /// Customers flagged for special pricing (resellers, partner schools).
    Special,
}

impl PriceTier {
    pub fn for_customer(special_pricing: bool) -> Self {
        if special_pricing {
            PriceTier::Special
        } else {
            PriceTier::Regular
        }
    }
}

// =============================================================================
// Inventory Item
// =============================================================================

/// A stocked item (textbook, worksheet set, printing plate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryItem {
    /// Unique identifier assigned by the store.
    pub id: String,

    /// Business code printed on stock cards, unique.
    pub code: String,

    pub title: String,
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub publisher: Option<String>,
    pub item_type: Option<String>,

    pub price_regular: Money,
    pub price_special: Money,

    /// Discount in basis points for the regular tier.
    pub discount_regular_bps: u32,

    /// Discount in basis points for the special tier.
    pub discount_special_bps: u32,

    /// Quantity on hand. Equals the sum of all history deltas.
    pub quantity: i64,

    /// Bumped by every committed write; the compare-and-swap token.
    pub version: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Freezes the descriptive fields for a history entry.
    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            code: self.code.clone(),
            title: self.title.clone(),
            subject: self.subject.clone(),
            grade: self.grade.clone(),
            publisher: self.publisher.clone(),
            item_type: self.item_type.clone(),
        }
    }

    /// Returns the list price and discount for a tier.
    pub fn price_for(&self, tier: PriceTier) -> (Money, u32) {
        match tier {
            PriceTier::Regular => (self.price_regular, self.discount_regular_bps),
            PriceTier::Special => (self.price_special, self.discount_special_bps),
        }
    }

    /// Unit price after the tier discount.
    pub fn net_unit_price(&self, tier: PriceTier) -> Money {
        let (price, discount_bps) = self.price_for(tier);
        price.apply_discount_bps(discount_bps)
    }
}

/// Descriptive fields of an item frozen into a history record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemSnapshot {
    pub code: String,
    pub title: String,
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub publisher: Option<String>,
    pub item_type: Option<String>,
}

// =============================================================================
// Stock History Entry
// =============================================================================

/// One committed stock adjustment. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockHistoryEntry {
    pub id: String,

    /// Store insertion sequence; strictly increasing in commit order.
    pub seq: i64,

    pub item_id: String,
    pub snapshot: ItemSnapshot,
    pub delta: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub reason: String,

    /// When the movement happened according to the operator.
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,

    /// When the store committed it.
    #[ts(as = "String")]
    pub committed_at: DateTime<Utc>,
}

impl StockHistoryEntry {
    /// `quantity_after == quantity_before + delta`.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.quantity_before.checked_add(self.delta) == Some(self.quantity_after)
    }
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub special_pricing: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn price_tier(&self) -> PriceTier {
        PriceTier::for_customer(self.special_pricing)
    }
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
            code: "MTK-7A".to_string(),
            title: "Matematika Kelas 7".to_string(),
            subject: Some("Matematika".to_string()),
            grade: Some("7".to_string()),
            publisher: Some("Erlangga".to_string()),
            item_type: Some("buku".to_string()),
            price_regular: Money::from_rupiah(50_000),
            price_special: Money::from_rupiah(45_000),
            discount_regular_bps: 0,
            discount_special_bps: 1000,
            quantity: 10,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_price_tier_selection() {
        let item = item();
        assert_eq!(item.net_unit_price(PriceTier::Regular).rupiah(), 50_000);
        assert_eq!(item.net_unit_price(PriceTier::Special).rupiah(), 40_500);
        assert_eq!(PriceTier::for_customer(true), PriceTier::Special);
    }

    #[test]
    fn test_snapshot_copies_descriptive_fields() {
        let snap = item().snapshot();
        assert_eq!(snap.code, "MTK-7A");
        assert_eq!(snap.publisher.as_deref(), Some("Erlangga"));
    }

    #[test]
    fn test_history_entry_consistency() {
        let now = Utc::now();
        let mut entry = StockHistoryEntry {
            id: "h1".to_string(),
            seq: 1,
            item_id: "item-1".to_string(),
            snapshot: ItemSnapshot::default(),
            delta: 5,
            quantity_before: 10,
            quantity_after: 15,
            reason: "restock".to_string(),
            occurred_at: now,
            committed_at: now,
        };
        assert!(entry.is_consistent());

        entry.quantity_after = 14;
        assert!(!entry.is_consistent());
    }
}
