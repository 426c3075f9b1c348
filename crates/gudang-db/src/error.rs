//! # Store and Ledger Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← classified: constraint, busy, pool, malformed row           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LedgerError ← what the operation means to the operator                │
//! │       │         (validation, rejected, CAS failed, partial batch)      │
//! │       ▼                                                                 │
//! │  backoffice CLI (anyhow) ← printed                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use gudang_core::{CoreError, ValidationError};
use thiserror::Error;

// =============================================================================
// DbError
// =============================================================================

/// Store operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate item code
    /// - Two writers minting the same invoice key
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Deleting a customer that sales still reference
    /// - Referencing a non-existent item on a sale line
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// The database is locked by another writer, or a snapshot went stale.
    ///
    /// Retryable: compare-and-swap loops treat this like a version conflict.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A stored row does not pass schema validation.
    #[error("Malformed {entity} record {id}: {reason}")]
    MalformedRecord {
        entity: String,
        id: String,
        reason: String,
    },

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn malformed(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DbError::MalformedRecord {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Whether a retry with fresh reads may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Busy(_))
    }
}

/// SQLite primary result codes that mean "try again".
///
/// 5 = SQLITE_BUSY, 6 = SQLITE_LOCKED, 261 = BUSY_RECOVERY, 517 = BUSY_SNAPSHOT.
const BUSY_CODES: [&str; 4] = ["5", "6", "261", "517"];

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → constraint / busy / QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();

                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if code.as_deref().is_some_and(|c| BUSY_CODES.contains(&c))
                    || msg.contains("database is locked")
                {
                    DbError::Busy(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// LedgerError
// =============================================================================

/// Why a conditional stock write did not commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteFailure {
    /// The item did not exist at write time.
    ItemNotFound,

    /// Every attempt lost to a concurrent writer.
    NotConverged { attempts: u32 },
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteFailure::ItemNotFound => f.write_str("item not found"),
            WriteFailure::NotConverged { attempts } => {
                write!(f, "no commit after {} attempts", attempts)
            }
        }
    }
}

/// One failed entry of a bulk adjustment.
#[derive(Debug)]
pub struct BatchFailure {
    /// Position in the submitted batch.
    pub index: usize,
    pub item_id: String,
    pub error: LedgerError,
}

/// Ledger operation errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Input rejected before any store call.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A business rule rejected the write (negative stock, overpayment,
    /// category mismatch).
    #[error("{0}")]
    Rejected(CoreError),

    /// The compare-and-swap write on an item did not commit.
    #[error("Stock adjustment failed for {item_id}: {reason}")]
    ConditionalWriteFailed { item_id: String, reason: WriteFailure },

    /// Some entries of a bulk adjustment failed; the rest are committed.
    #[error("{} of {total} stock adjustments failed", .failures.len())]
    PartialBatchFailure {
        total: usize,
        failures: Vec<BatchFailure>,
    },

    /// The history insert failed; the master update was rolled back with it.
    #[error("History append failed for {item_id}: {source}")]
    HistoryAppendFailed {
        item_id: String,
        #[source]
        source: DbError,
    },

    #[error(transparent)]
    Store(#[from] DbError),
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => LedgerError::Validation(v),
            other => LedgerError::Rejected(other),
        }
    }
}

impl LedgerError {
    pub fn write_failed(item_id: impl Into<String>, reason: WriteFailure) -> Self {
        LedgerError::ConditionalWriteFailed {
            item_id: item_id.into(),
            reason,
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_validation_maps_to_validation() {
        let err: LedgerError = CoreError::from(ValidationError::required("item_id")).into();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_negative_stock_maps_to_rejected() {
        let err: LedgerError = CoreError::NegativeStock {
            code: "MTK-7A".to_string(),
            on_hand: 1,
            delta: -2,
        }
        .into();
        assert!(matches!(err, LedgerError::Rejected(CoreError::NegativeStock { .. })));
    }

    #[test]
    fn test_write_failure_message() {
        let err = LedgerError::write_failed("item-2", WriteFailure::ItemNotFound);
        assert_eq!(err.to_string(), "Stock adjustment failed for item-2: item not found");

        let err = LedgerError::write_failed("item-2", WriteFailure::NotConverged { attempts: 25 });
        assert_eq!(
            err.to_string(),
            "Stock adjustment failed for item-2: no commit after 25 attempts"
        );
    }

    #[test]
    fn test_busy_is_retryable() {
        assert!(DbError::Busy("database is locked".to_string()).is_retryable());
        assert!(!DbError::PoolExhausted.is_retryable());
    }
}
