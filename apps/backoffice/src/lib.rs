//! # Gudang Back-Office CLI
//!
//! Operator front end for the ledger services in `gudang-db`.
//!
//! ## Module Organization
//! ```text
//! gudang_backoffice/
//! ├── lib.rs          ◄─── You are here (argument parsing, startup)
//! ├── config.rs       ◄─── File + environment configuration
//! └── commands/
//!     ├── mod.rs      ◄─── App context, shared parsers, output helpers
//!     ├── item.rs     ◄─── Item catalogue
//!     ├── stock.rs    ◄─── Stock adjustments and stock cards
//!     ├── cash.rs     ◄─── Cash mutations, ledger view, summaries
//!     ├── customer.rs ◄─── Customer directory
//!     └── sale.rs     ◄─── Invoices and payments
//! ```
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  parse args ──► load AppConfig ──► init tracing ──► open Database      │
//! │                                                         │               │
//! │                                                         ▼               │
//! │                                          App { stock, cash, sales, … } │
//! │                                                         │               │
//! │                                                         ▼               │
//! │                                              run the chosen command     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gudang_db::{Database, DbConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use commands::App;
use config::AppConfig;

/// Gudang back-office ledger.
#[derive(Debug, Parser)]
#[command(name = "gudang", version, about)]
pub struct Cli {
    /// Config file (defaults to backoffice.toml in the platform config folder).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the config file and GUDANG_DB_PATH.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Item catalogue.
    #[command(subcommand)]
    Item(commands::item::ItemCommand),

    /// Stock adjustments and stock cards.
    #[command(subcommand)]
    Stock(commands::stock::StockCommand),

    /// Cash mutation ledger.
    #[command(subcommand)]
    Cash(commands::cash::CashCommand),

    /// Customer directory.
    #[command(subcommand)]
    Customer(commands::customer::CustomerCommand),

    /// Sales invoices and payments.
    #[command(subcommand)]
    Sale(commands::sale::SaleCommand),
}

/// Loads configuration, opens the store and runs one command.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.db {
        config.database.path = Some(path);
    }

    init_tracing(&config.logging.level);

    let path = config.database_path()?;
    info!(path = %path.display(), "Opening database");
    let db = Database::new(DbConfig::new(path).max_connections(config.database.max_connections)).await?;

    let app = App::new(db, config.ledger.clone(), cli.json);
    let result = match cli.command {
        Command::Item(cmd) => cmd.run(&app).await,
        Command::Stock(cmd) => cmd.run(&app).await,
        Command::Cash(cmd) => cmd.run(&app).await,
        Command::Customer(cmd) => cmd.run(&app).await,
        Command::Sale(cmd) => cmd.run(&app).await,
    };

    app.close().await;
    result
}

/// `RUST_LOG` wins; otherwise the configured level. Logs go to stderr so
/// `--json` output stays clean.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
