//! Gudang back-office entry point.

use clap::Parser;
use gudang_backoffice::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run(Cli::parse()).await
}
