//! # Repository Module
//!
//! SQL lives here and nowhere else.
//!
//! ## Store Interface
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Store primitive        Repository method                               │
//! │  ───────────────        ─────────────────                               │
//! │  read(path)             ItemRepository::get_by_id, …                   │
//! │  conditionalWrite       StockRepository::conditional_adjust             │
//! │  append(collection)     StockRepository (history), CashMutation::insert │
//! │  subscribe(path)        ChangeFeed::subscribe (crate::feed)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads come back through [`crate::records`]: single-record reads fail on a
//! malformed row, collection reads quarantine it.
//!
//! ## Available Repositories
//!
//! - [`ItemRepository`](item::ItemRepository) - Item catalogue
//! - [`StockRepository`](stock::StockRepository) - History and conditional writes
//! - [`CashMutationRepository`](cash::CashMutationRepository) - Cash log and edit trail
//! - [`CustomerRepository`](customer::CustomerRepository) - Customer CRUD
//! - [`SaleRepository`](sale::SaleRepository) - Invoices, lines, payments

use uuid::Uuid;

pub mod cash;
pub mod customer;
pub mod item;
pub mod sale;
pub mod stock;

/// New record identifier.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
