//! # gudang-core: Pure Business Logic for Gudang
//!
//! This crate holds the ledger rules of the back office as pure functions
//! with zero I/O dependencies. The store (`gudang-db`) calls into it to plan
//! every write and to validate every record it reads back.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Gudang Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Operator CLI / Dashboard (collaborator)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               gudang-db (store + ledger services)               │   │
//! │  │     conditional writes, history append, change feed, cache      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ gudang-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  stock  │ │  cash   │ │ balance │ │ invoice │ │  sale   │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Inventory items, stock history entries, customers
//! - [`money`] - Whole-rupiah money type with integer arithmetic
//! - [`stock`] - Stock movement planning and history invariants
//! - [`cash`] - Cash mutation categories and sign normalisation
//! - [`balance`] - Running balance reconstruction over a ledger
//! - [`invoice`] - Invoice keys (`INV-YYYYMM-NNNN`)
//! - [`sale`] - Sale lines, payments and derived payment status
//! - [`settings`] - Ledger policy knobs
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use gudang_core::stock::plan_movement;
//! use gudang_core::LedgerSettings;
//!
//! let movement = plan_movement("MTK-7A", 10, 5, &LedgerSettings::default()).unwrap();
//! assert_eq!(movement.quantity_before, 10);
//! assert_eq!(movement.quantity_after, 15);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod balance;
pub mod cash;
pub mod error;
pub mod invoice;
pub mod money;
pub mod sale;
pub mod settings;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use balance::{CashFilter, CashSummary, LedgerRow, LedgerView, RunningBalances};
pub use cash::{CashMutationEntry, MutationCategory, MutationKind};
pub use error::{CoreError, CoreResult, ValidationError};
pub use invoice::InvoiceNumber;
pub use money::Money;
pub use sale::{PaymentMethod, PaymentRecord, PaymentStatus, SaleLine, SalesTransaction};
pub use settings::LedgerSettings;
pub use stock::StockMovement;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a free-text stock adjustment reason.
pub const MAX_REASON_LEN: usize = 200;

/// Maximum length of an item title.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum length of a customer name.
pub const MAX_CUSTOMER_NAME_LEN: usize = 120;

/// Maximum length of a cash mutation or sale note.
pub const MAX_NOTE_LEN: usize = 500;

/// Largest single amount in rupiah: a price, a cash mutation, a payment or an
/// invoice total. Rp1 quadrillion leaves room for sums over thousands of
/// entries inside an i64.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

/// Discounts are basis points; 10000 = 100%.
pub const MAX_DISCOUNT_BPS: u32 = 10_000;

/// Maximum number of lines on one invoice.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity on a single sale line.
///
/// Guards against typing 100000 instead of 100 on bulk school orders.
pub const MAX_LINE_QUANTITY: i64 = 50_000;

/// Upper bound on rows returned by one catalogue or history listing.
pub const MAX_LIST_LIMIT: u32 = 500;
