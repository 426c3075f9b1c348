//! # Store Handle
//!
//! [`Database`] bundles the SQLite pool with the change feed. Every ledger
//! service is built from a clone of it, so all services on one handle
//! publish to the same feed.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig ──► Database::new ──► SqlitePool (WAL, foreign keys on)       │
//! │                     │                 │                                 │
//! │                     │                 ├── items()      ItemRepository   │
//! │                     │                 ├── stock()      StockRepository  │
//! │                     │                 ├── cash()       CashMutation…    │
//! │                     │                 ├── customers()  CustomerRepo…    │
//! │                     │                 └── sales()      SaleRepository   │
//! │                     ▼                                                   │
//! │               ChangeFeed (one per handle, shared by clones)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQLite admits one writer at a time. Competing writers wait up to
//! `busy_timeout` for the lock; the stock compare-and-swap loop handles
//! whatever changed while they waited.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::feed::{ChangeFeed, DEFAULT_FEED_CAPACITY};
use crate::migrations::{self, SchemaStatus};
use crate::repository::cash::CashMutationRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::item::ItemRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::stock::StockRepository;

const IN_MEMORY: &str = ":memory:";

/// How to open the store.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created on first open. `:memory:` for a throwaway store.
    pub database_path: PathBuf,

    pub max_connections: u32,

    /// Wait for a free pooled connection.
    pub acquire_timeout: Duration,

    /// Wait for the write lock before failing with `Busy`.
    pub busy_timeout: Duration,

    /// Bring the schema up to date on open.
    pub migrate: bool,

    /// Events buffered per change feed subscriber before it lags.
    pub feed_capacity: usize,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }

    /// A private in-memory store for tests.
    ///
    /// Each in-memory connection is a separate database, so the pool holds
    /// exactly one. Code running against it must not hold a transaction
    /// while calling another repository on the same handle.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(IN_MEMORY)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

/// Pool plus change feed. Clones share both.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl Database {
    /// Opens (creating if needed) and migrates the store.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening store");

        let url = format!("sqlite://{}?mode=rwc", config.database_path.display());
        let mut options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        // WAL needs a file; in-memory stores keep the default journal
        if !config.is_in_memory() {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(max_connections = config.max_connections, "Pool ready");

        let db = Database {
            pool,
            feed: ChangeFeed::new(config.feed_capacity),
        };
        if config.migrate {
            migrations::run_migrations(&db.pool).await?;
        }
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The feed every service on this handle publishes committed writes to.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn items(&self) -> ItemRepository {
        ItemRepository::new(self.pool.clone())
    }

    /// History reads and conditional quantity writes.
    pub fn stock(&self) -> StockRepository {
        StockRepository::new(self.pool.clone())
    }

    pub fn cash(&self) -> CashMutationRepository {
        CashMutationRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    pub async fn schema_status(&self) -> DbResult<SchemaStatus> {
        migrations::schema_status(&self.pool).await
    }

    pub async fn close(&self) {
        debug!("Closing store");
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let status = db.schema_status().await.unwrap();
        assert!(status.is_current());
        assert!(status.known >= 1);
    }

    #[tokio::test]
    async fn test_unmigrated_store_reports_zero() {
        let mut config = DbConfig::in_memory();
        config.migrate = false;

        let db = Database::new(config).await.unwrap();
        let status = db.schema_status().await.unwrap();
        assert_eq!(status.applied, 0);
        assert!(!status.is_current());
    }

    #[tokio::test]
    async fn test_file_store_created_and_reopened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gudang.db");

        let db = Database::new(DbConfig::new(&path).max_connections(2)).await.unwrap();
        assert!(path.exists());
        db.close().await;

        // Second open finds the schema already applied
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        assert!(db.schema_status().await.unwrap().is_current());
        db.close().await;
    }
}
