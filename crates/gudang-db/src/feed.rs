//! # Change Feed
//!
//! Push notification of committed writes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Ledger service commits ──► ChangeFeed::publish(ChangeEvent)            │
//! │                                   │                                     │
//! │                     tokio broadcast channel                             │
//! │                ┌──────────────────┼──────────────────┐                  │
//! │                ▼                  ▼                  ▼                  │
//! │        CashLedgerCache      dashboard task       CLI watcher            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events are published only after the transaction commits, so a subscriber
//! that reloads on an event always sees the write.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of buffered events per subscriber.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// A persisted collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Items,
    StockHistory,
    CashMutations,
    Customers,
    Sales,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Items => "items",
            Collection::StockHistory => "stock_history",
            Collection::CashMutations => "cash_mutations",
            Collection::Customers => "customers",
            Collection::Sales => "sales",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed change to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,

    /// Key of the changed record (item id, entry id, invoice).
    pub id: String,
}

impl ChangeEvent {
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }
}

/// Broadcast of [`ChangeEvent`]s to every subscriber.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Registers a new subscriber. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event. No subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        trace!(collection = %event.collection, id = %event.id, "Publishing change");
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}
