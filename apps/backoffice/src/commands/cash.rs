//! # Cash Commands
//!
//! Amounts are entered as magnitudes; the stored sign follows the kind
//! (income positive, expense negative).

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use gudang_core::{CashFilter, CashMutationEntry, LedgerView, Money, MutationCategory, MutationKind};
use gudang_db::{CashMutationEdit, CashRevision, NewMutation};
use serde::Serialize;

use super::{or_dash, parse_time, take_records, App};

#[derive(Debug, Subcommand)]
pub enum CashCommand {
    /// Record a cash mutation.
    Record {
        /// Category, e.g. sales, capital_injection, operational, salary.
        #[arg(long)]
        category: MutationCategory,

        /// income or expense. Defaults to the category's direction.
        #[arg(long)]
        kind: Option<MutationKind>,

        /// Amount in rupiah.
        #[arg(long, allow_negative_numbers = true)]
        amount: i64,

        #[arg(long, default_value = "")]
        note: String,

        /// When it happened (YYYY-MM-DD or RFC 3339). Defaults to now.
        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<Utc>>,

        /// Receipt or transfer reference.
        #[arg(long)]
        proof: Option<String>,
    },

    /// Edit a recorded mutation; the previous values are kept.
    Edit {
        id: String,

        #[arg(long, allow_negative_numbers = true)]
        amount: Option<i64>,

        #[arg(long)]
        category: Option<MutationCategory>,

        #[arg(long)]
        note: Option<String>,

        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<Utc>>,

        #[arg(long, conflicts_with = "clear_proof")]
        proof: Option<String>,

        /// Remove the proof reference.
        #[arg(long)]
        clear_proof: bool,
    },

    /// Show one mutation and its edit history.
    Show { id: String },

    /// The ledger with running balances.
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Income, expense and net over the matching rows.
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// First day or instant to include.
    #[arg(long, value_parser = parse_time)]
    from: Option<DateTime<Utc>>,

    /// Last instant to include.
    #[arg(long, value_parser = parse_time)]
    to: Option<DateTime<Utc>>,

    /// Case-insensitive match on note, category or proof reference.
    #[arg(long)]
    text: Option<String>,
}

impl From<FilterArgs> for CashFilter {
    fn from(args: FilterArgs) -> Self {
        CashFilter {
            from: args.from,
            to: args.to,
            text: args.text,
        }
    }
}

#[derive(Debug, Serialize)]
struct MutationWithTrail<'a> {
    mutation: &'a CashMutationEntry,
    revisions: Vec<CashRevision>,
}

impl CashCommand {
    pub async fn run(self, app: &App) -> anyhow::Result<()> {
        match self {
            CashCommand::Record {
                category,
                kind,
                amount,
                note,
                at,
                proof,
            } => {
                let entry = app
                    .cash
                    .record_mutation(NewMutation {
                        kind: kind.unwrap_or_else(|| category.kind()),
                        category,
                        amount: Money::from_rupiah(amount),
                        note,
                        occurred_at: at,
                        proof_ref: proof,
                    })
                    .await?;
                app.emit(&entry, print_entry)
            }

            CashCommand::Edit {
                id,
                amount,
                category,
                note,
                at,
                proof,
                clear_proof,
            } => {
                let proof_ref = if clear_proof { Some(None) } else { proof.map(Some) };
                let entry = app
                    .cash
                    .edit_mutation(
                        &id,
                        CashMutationEdit {
                            amount: amount.map(Money::from_rupiah),
                            category,
                            note,
                            occurred_at: at,
                            proof_ref,
                        },
                    )
                    .await?;
                app.emit(&entry, print_entry)
            }

            CashCommand::Show { id } => {
                let entry = app.cash.get_mutation(&id).await?;
                let revisions = take_records("cash revision", app.cash.mutation_revisions(&id).await?);
                let output = MutationWithTrail {
                    mutation: &entry,
                    revisions,
                };

                app.emit(&output, |o| {
                    print_entry(o.mutation);
                    for r in &o.revisions {
                        println!(
                            "  rev {} until {}: {} {} '{}' at {}",
                            r.revision,
                            r.replaced_at.format("%Y-%m-%d %H:%M"),
                            r.category,
                            r.amount,
                            r.note,
                            r.occurred_at.format("%Y-%m-%d")
                        );
                    }
                })
            }

            CashCommand::List { filter } => {
                let view = app.cash.view().await?.filter(&filter.into());
                app.emit(&view, print_view)
            }

            CashCommand::Summary { filter } => {
                let summary = app.cash.summary(&filter.into()).await?;
                app.emit(&summary, |s| {
                    println!("income   {}", s.income);
                    println!("expense  {}", s.expense);
                    println!("net      {}", s.net);
                    println!("rows     {}", s.count);
                })
            }
        }
    }
}

fn print_entry(entry: &CashMutationEntry) {
    println!(
        "{} {} {} {}",
        entry.occurred_at.format("%Y-%m-%d %H:%M"),
        entry.category,
        entry.amount,
        entry.note
    );
    println!("  id {} (rev {}, proof {})", entry.id, entry.revision, or_dash(entry.proof_ref.as_deref()));
}

fn print_view(view: &LedgerView) {
    for row in &view.rows {
        let e = &row.entry;
        println!(
            "{}  {:<18} {:>16} {:>16}  {}",
            e.occurred_at.format("%Y-%m-%d"),
            e.category.as_str(),
            e.amount.to_string(),
            row.balance.to_string(),
            e.note
        );
    }
    println!("closing balance {}", view.closing);
}
