//! # Schema Migrations
//!
//! The schema ships inside the binary. `Database::new` brings any store up
//! to the latest version before the first ledger call.
//!
//! ```text
//! migrations/sqlite/
//! └── 001_initial_schema.sql   items, stock_history, cash_mutations,
//!                              cash_mutation_revisions, customers, sales,
//!                              sale_lines, sale_payments, invoice_counters
//! ```
//!
//! Applied files are checksummed in `_sqlx_migrations`; changing one after
//! release breaks every existing store. Schema changes go in a new
//! `NNN_description.sql`.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Schema version of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    /// Migrations embedded in this build.
    pub known: usize,

    /// Migrations recorded as applied in the store.
    pub applied: usize,
}

impl SchemaStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.known
    }
}

pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let before = schema_status(pool).await?;
    debug!(known = before.known, applied = before.applied, "Schema status");

    MIGRATOR.run(pool).await?;

    if !before.is_current() {
        info!(from = before.applied, to = before.known, "Schema migrated");
    }
    Ok(())
}

/// Reads the schema version. A store that was never migrated reports zero
/// applied migrations.
pub async fn schema_status(pool: &SqlitePool) -> DbResult<SchemaStatus> {
    let table_exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if table_exists == 0 {
        0
    } else {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    };

    Ok(SchemaStatus {
        known: MIGRATOR.migrations.len(),
        applied: applied as usize,
    })
}
