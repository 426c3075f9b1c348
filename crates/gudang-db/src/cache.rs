//! # Snapshot Cache
//!
//! An owned, explicitly passed snapshot of a collection for display.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CashLedger::record_mutation ── COMMIT ──► ChangeFeed (cash_mutations)  │
//! │                                                 │                       │
//! │                                                 ▼                       │
//! │                               CashLedgerCache refresh task              │
//! │                                 list_all → LedgerView::build            │
//! │                                                 │                       │
//! │                                                 ▼                       │
//! │                         SnapshotCache::replace (tokio watch)            │
//! │                       ┌─────────────────┼─────────────────┐             │
//! │                       ▼                 ▼                 ▼             │
//! │                 Subscription      Subscription       current()          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The displayed view changes only after the store confirmed a write. There
//! is no optimistic local update.

use std::sync::Arc;

use gudang_core::LedgerView;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::LedgerResult;
use crate::feed::{ChangeEvent, Collection};
use crate::pool::Database;

// =============================================================================
// SnapshotCache
// =============================================================================

/// Latest snapshot of `T`, shared by reference.
#[derive(Debug)]
pub struct SnapshotCache<T> {
    tx: watch::Sender<Arc<T>>,
}

impl<T> SnapshotCache<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.tx.borrow())
    }

    /// Publishes a new snapshot to every subscriber.
    pub fn replace(&self, value: T) {
        self.tx.send_replace(Arc::new(value));
    }

    /// Registers a subscriber. Dropping the [`Subscription`] unsubscribes.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receives every snapshot published after it was created.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: watch::Receiver<Arc<T>>,
}

impl<T> Subscription<T> {
    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.rx.borrow())
    }

    /// Waits for the next snapshot. `None` once the cache is gone.
    pub async fn changed(&mut self) -> Option<Arc<T>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }
}

// =============================================================================
// CashLedgerCache
// =============================================================================

/// Keeps a [`LedgerView`] of the whole cash ledger in step with the store.
///
/// Dropping the cache stops the refresh task.
#[derive(Debug)]
pub struct CashLedgerCache {
    cache: Arc<SnapshotCache<LedgerView>>,
    task: JoinHandle<()>,
}

impl CashLedgerCache {
    /// Loads the ledger once and starts following the change feed.
    pub async fn start(db: Database) -> LedgerResult<Self> {
        // Subscribe first so no commit between load and subscribe is missed
        let events = db.feed().subscribe();

        let initial = load_view(&db).await?;
        info!(rows = initial.len(), closing = %initial.closing, "Cash ledger cache loaded");

        let cache = Arc::new(SnapshotCache::new(initial));
        let task = tokio::spawn(refresh_loop(db, events, Arc::clone(&cache)));

        Ok(Self { cache, task })
    }

    pub fn current(&self) -> Arc<LedgerView> {
        self.cache.current()
    }

    pub fn subscribe(&self) -> Subscription<LedgerView> {
        self.cache.subscribe()
    }
}

impl Drop for CashLedgerCache {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn load_view(db: &Database) -> LedgerResult<LedgerView> {
    let loaded = db.cash().list_all().await?;
    Ok(LedgerView::build(loaded.records)?)
}

async fn refresh_loop(
    db: Database,
    mut events: broadcast::Receiver<ChangeEvent>,
    cache: Arc<SnapshotCache<LedgerView>>,
) {
    loop {
        match events.recv().await {
            Ok(event) if event.collection == Collection::CashMutations => {
                debug!(id = %event.id, "Cash mutation committed, refreshing view");
            }
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Cash ledger cache lagged, reloading");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }

        match load_view(&db).await {
            Ok(view) => cache.replace(view),
            Err(e) => warn!(error = %e, "Cash ledger reload failed, keeping previous view"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_cache_publishes() {
        let cache = SnapshotCache::new(1u32);
        let mut sub = cache.subscribe();
        assert_eq!(cache.subscriber_count(), 1);

        cache.replace(2);
        assert_eq!(*sub.changed().await.unwrap(), 2);
        assert_eq!(*cache.current(), 2);
        assert_eq!(*sub.current(), 2);

        drop(sub);
        assert_eq!(cache.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_ends_with_cache() {
        let cache = SnapshotCache::new("a".to_string());
        let mut sub = cache.subscribe();
        drop(cache);
        assert!(sub.changed().await.is_none());
    }
}
