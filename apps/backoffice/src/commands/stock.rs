//! # Stock Commands
//!
//! ## Bulk File Format
//! `stock bulk --file restock.json` reads a JSON array of adjustments:
//! ```text
//! [
//!   { "item_id": "…", "delta": 40, "reason": "kiriman penerbit" },
//!   { "item_id": "…", "delta": -2, "reason": "rusak", "occurred_at": "2024-07-01T00:00:00Z" }
//! ]
//! ```
//! Each line commits on its own; failures are listed and the command exits
//! non-zero without undoing the committed lines.

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use gudang_core::{InventoryItem, StockHistoryEntry};
use gudang_db::{AdjustmentReceipt, BulkAdjustReport, StockAdjustment};
use serde::Serialize;

use super::{parse_time, take_records, App};

#[derive(Debug, Subcommand)]
pub enum StockCommand {
    /// Apply a signed change to one item.
    Adjust {
        item_id: String,

        /// Signed change, e.g. 40 or -3.
        #[arg(long, allow_negative_numbers = true)]
        delta: i64,

        #[arg(long)]
        reason: String,

        /// When it happened (YYYY-MM-DD or RFC 3339). Defaults to now.
        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<Utc>>,
    },

    /// Apply a JSON file of adjustments, each independently.
    Bulk {
        #[arg(long)]
        file: PathBuf,
    },

    /// Show an item's history and check it against the quantity on hand.
    Card { item_id: String },

    /// Latest movements across all items.
    Recent {
        #[arg(long)]
        limit: Option<u32>,
    },
}

/// Printable form of a [`BulkAdjustReport`].
#[derive(Debug, Serialize)]
pub(super) struct BatchOutcome {
    pub committed: Vec<AdjustmentReceipt>,
    pub failed: Vec<FailedLine>,
}

#[derive(Debug, Serialize)]
pub(super) struct FailedLine {
    pub index: usize,
    pub item_id: String,
    pub error: String,
}

impl From<BulkAdjustReport> for BatchOutcome {
    fn from(report: BulkAdjustReport) -> Self {
        Self {
            committed: report.committed,
            failed: report
                .failed
                .into_iter()
                .map(|f| FailedLine {
                    index: f.index,
                    item_id: f.item_id,
                    error: f.error.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CardOutput<'a> {
    item: &'a InventoryItem,
    entries: &'a [StockHistoryEntry],
    unreadable: usize,
    violation: Option<String>,
}

impl StockCommand {
    pub async fn run(self, app: &App) -> anyhow::Result<()> {
        match self {
            StockCommand::Adjust {
                item_id,
                delta,
                reason,
                at,
            } => {
                let mut adjustment = StockAdjustment::new(item_id, delta, reason);
                adjustment.occurred_at = at;

                let receipt = app.stock.adjust_stock(&adjustment).await?;
                app.emit(&receipt, |r| {
                    println!(
                        "{:+} on {}: {} -> {} (entry {})",
                        r.delta, r.item_id, r.quantity_before, r.quantity_after, r.history_entry_id
                    );
                })
            }

            StockCommand::Bulk { file } => {
                let contents = std::fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?;
                let adjustments = parse_batch(&contents)
                    .with_context(|| format!("parsing {}", file.display()))?;

                let outcome = BatchOutcome::from(app.stock.bulk_adjust_stock(&adjustments).await);
                app.emit(&outcome, |o| {
                    for r in &o.committed {
                        println!("ok    {} {:+} -> {}", r.item_id, r.delta, r.quantity_after);
                    }
                    for f in &o.failed {
                        println!("FAIL  #{} {}: {}", f.index, f.item_id, f.error);
                    }
                })?;

                if !outcome.failed.is_empty() {
                    bail!(
                        "{} of {} stock adjustments failed",
                        outcome.failed.len(),
                        adjustments.len()
                    );
                }
                Ok(())
            }

            StockCommand::Card { item_id } => {
                let card = app.stock.stock_card(&item_id).await?;
                let violation = card.verify().err().map(|v| v.to_string());
                let output = CardOutput {
                    item: &card.item,
                    entries: &card.entries,
                    unreadable: card.quarantined.len(),
                    violation,
                };

                app.emit(&output, |o| {
                    println!("{} {} (on hand {})", o.item.code, o.item.title, o.item.quantity);
                    for e in o.entries {
                        println!(
                            "  #{:<5} {}  {:>+6}  {:>6} -> {:<6} {}",
                            e.seq,
                            e.occurred_at.format("%Y-%m-%d %H:%M"),
                            e.delta,
                            e.quantity_before,
                            e.quantity_after,
                            e.reason
                        );
                    }
                    match &o.violation {
                        None => println!("history consistent"),
                        Some(v) => println!("INCONSISTENT: {}", v),
                    }
                })
            }

            StockCommand::Recent { limit } => {
                let entries = take_records("stock history", app.stock.recent_movements(limit).await?);
                app.emit(&entries, |entries| {
                    for e in entries {
                        println!(
                            "{}  {:<12} {:>+6} -> {:<6} {}",
                            e.committed_at.format("%Y-%m-%d %H:%M"),
                            e.snapshot.code,
                            e.delta,
                            e.quantity_after,
                            e.reason
                        );
                    }
                })
            }
        }
    }
}

fn parse_batch(contents: &str) -> anyhow::Result<Vec<StockAdjustment>> {
    let adjustments: Vec<StockAdjustment> = serde_json::from_str(contents)?;
    if adjustments.is_empty() {
        bail!("no adjustments in file");
    }
    Ok(adjustments)
}
