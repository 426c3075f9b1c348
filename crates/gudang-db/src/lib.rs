//! # gudang-db: Store and Ledger Services for Gudang
//!
//! SQLite store for the back office plus the ledger services that run on
//! it. All SQL lives in [`repository`]; all business rules live in
//! `gudang-core`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Gudang Data Flow                                 │
//! │                                                                         │
//! │  backoffice CLI (stock adjust, cash record, sale create, …)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     gudang-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │    ledger     │    │  repository   │    │   records    │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ StockLedger   │───►│ ItemRepo      │───►│ Row → core   │  │   │
//! │  │   │ CashLedger    │    │ StockRepo CAS │    │ TryFrom,     │  │   │
//! │  │   │ SalesService  │    │ CashRepo      │    │ quarantine   │  │   │
//! │  │   └──────┬────────┘    │ SaleRepo      │    └──────────────┘  │   │
//! │  │          │             └───────────────┘                       │   │
//! │  │          ▼                                                     │   │
//! │  │   ┌───────────────┐    ┌───────────────┐                       │   │
//! │  │   │  ChangeFeed   │───►│ SnapshotCache │                       │   │
//! │  │   │  (broadcast)  │    │   (watch)     │                       │   │
//! │  │   └───────────────┘    └───────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Store and ledger error types
//! - [`records`] - Row structs and validated conversion to core types
//! - [`repository`] - Repository implementations
//! - [`ledger`] - Stock, cash, sales and customer services
//! - [`feed`] - Change feed of committed writes
//! - [`cache`] - Snapshot cache driven by the change feed
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gudang_db::{Database, DbConfig, StockAdjustment, StockLedger};
//! use gudang_core::LedgerSettings;
//!
//! let db = Database::new(DbConfig::new("gudang.db")).await?;
//! let stock = StockLedger::new(db.clone(), LedgerSettings::default());
//!
//! let receipt = stock
//!     .adjust_stock(&StockAdjustment::new(item_id, 5, "restock"))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod records;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::{CashLedgerCache, SnapshotCache, Subscription};
pub use error::{BatchFailure, DbError, DbResult, LedgerError, LedgerResult, WriteFailure};
pub use feed::{ChangeEvent, ChangeFeed, Collection};
pub use migrations::SchemaStatus;
pub use pool::{Database, DbConfig};
pub use records::{CashRevision, Loaded, Quarantined};

// Ledger service re-exports for convenience
pub use ledger::cash::{CashLedger, CashMutationEdit, NewMutation};
pub use ledger::customers::{CustomerDetails, CustomerService};
pub use ledger::sales::{LineRequest, NewPayment, NewSale, SaleReceipt, SalesService};
pub use ledger::stock::{
    AdjustmentReceipt, BulkAdjustReport, CardViolation, NewItem, StockAdjustment, StockCard,
    StockLedger,
};
pub use repository::item::ItemDetails;
