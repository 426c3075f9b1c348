//! # Ledger Services
//!
//! The operations the back office performs. Each service validates input
//! before touching the store, plans the write with `gudang-core`, commits
//! through a repository and then publishes on the change feed.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  input ──► validate ──► plan (gudang-core) ──► repository (one tx)     │
//! │              │               │                        │                 │
//! │              ▼               ▼                        ▼                 │
//! │         Validation       Rejected            ChangeFeed::publish        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`StockLedger`](stock::StockLedger) - Item catalogue, stock adjustments, stock card
//! - [`CashLedger`](cash::CashLedger) - Cash mutations, edits, balances
//! - [`SalesService`](sales::SalesService) - Invoices and payments
//! - [`CustomerService`](customers::CustomerService) - Customer directory

pub mod cash;
pub mod customers;
pub mod sales;
pub mod stock;
