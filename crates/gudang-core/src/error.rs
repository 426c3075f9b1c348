//! # Error Types
//!
//! Domain-specific error types for gudang-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  gudang-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  gudang-db errors (separate crate)                                     │
//! │  ├── DbError          - Store operation failures                       │
//! │  └── LedgerError      - Ledger operation outcomes (CAS, batches)       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → CLI (anyhow)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A stock movement would leave the item below zero while negative stock
    /// is disabled.
    ///
    /// ## When This Occurs
    /// - `LedgerSettings::allow_negative_stock` is `false`
    /// - `quantity_on_hand + delta < 0`
    #[error("Insufficient stock for {code}: on hand {on_hand}, change {delta}")]
    NegativeStock {
        code: String,
        on_hand: i64,
        delta: i64,
    },

    /// A cash category was used with the wrong direction, e.g. `salary` on an
    /// income entry.
    #[error("Category {category} is not an {kind} category")]
    CategoryMismatch { category: String, kind: String },

    /// A payment would push the paid amount above the invoice total.
    #[error("Payment of {amount} exceeds outstanding {outstanding} on {invoice}")]
    Overpayment {
        invoice: String,
        amount: i64,
        outstanding: i64,
    },

    /// An invoice key could not be parsed.
    #[error("Invalid invoice number '{0}'")]
    InvalidInvoiceNumber(String),

    /// The monthly invoice sequence ran past four digits.
    #[error("Invoice sequence exhausted for period {period}")]
    InvoiceSequenceExhausted { period: String },

    /// A sum or product of amounts left the i64 range.
    ///
    /// ## When This Occurs
    /// - a line total (`price × quantity`) or an invoice total overflows
    /// - a running balance or summary over the cash ledger overflows
    #[error("Amount overflow in {context}")]
    AmountOverflow { context: String },

    /// A record read back from the store breaks a schema rule.
    #[error("Invalid {entity} record {id}: {reason}")]
    InvalidRecord {
        entity: String,
        id: String,
        reason: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidRecord error.
    pub fn invalid_record(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::InvalidRecord {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any store call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be zero.
    #[error("{field} must not be 0")]
    MustNotBeZero { field: String },

    /// Invalid format (e.g., invalid phone number, unknown category tag).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn too_long(field: impl Into<String>, max: usize) -> Self {
        ValidationError::TooLong {
            field: field.into(),
            max,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
