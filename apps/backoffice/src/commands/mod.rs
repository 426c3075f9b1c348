//! # Commands
//!
//! One module per ledger area. Each exposes a clap subcommand enum whose
//! `run` calls a service on [`App`] and prints the outcome.

pub mod cash;
pub mod customer;
pub mod item;
pub mod sale;
pub mod stock;

use chrono::{DateTime, NaiveDate, Utc};
use gudang_core::LedgerSettings;
use gudang_db::{CashLedger, CustomerService, Database, Loaded, SalesService, StockLedger};
use serde::Serialize;
use tracing::warn;

// =============================================================================
// App Context
// =============================================================================

/// Services shared by every command.
pub struct App {
    db: Database,
    pub stock: StockLedger,
    pub cash: CashLedger,
    pub sales: SalesService,
    pub customers: CustomerService,

    /// Print JSON instead of text.
    pub json: bool,
}

impl App {
    pub fn new(db: Database, settings: LedgerSettings, json: bool) -> Self {
        Self {
            stock: StockLedger::new(db.clone(), settings.clone()),
            cash: CashLedger::new(db.clone()),
            sales: SalesService::new(db.clone(), settings),
            customers: CustomerService::new(db.clone()),
            db,
            json,
        }
    }

    pub async fn close(&self) {
        self.db.close().await;
    }

    /// Prints `value` as JSON, or calls `text` for the human form.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text(value);
        }
        Ok(())
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Parses `2024-07-01` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
        .ok_or_else(|| format!("expected YYYY-MM-DD or RFC 3339, got '{}'", value))
}

/// Unwraps a collection read, reporting skipped rows on stderr.
pub fn take_records<T>(what: &str, loaded: Loaded<T>) -> Vec<T> {
    if !loaded.quarantined.is_empty() {
        eprintln!(
            "warning: {} unreadable {} record(s) skipped",
            loaded.quarantined.len(),
            what
        );
        for q in &loaded.quarantined {
            warn!(id = %q.id, reason = %q.reason, "Skipped {} record", what);
        }
    }
    loaded.records
}

/// `-` for empty optional text columns.
pub fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}
