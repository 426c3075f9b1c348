//! # Item Commands
//!
//! Catalogue maintenance. Quantity only changes through `stock adjust`;
//! `item add --opening` records the first movement.

use clap::{Args, Subcommand};
use gudang_core::{InventoryItem, Money};
use gudang_db::{DbError, ItemDetails, LedgerError, NewItem};

use super::{or_dash, take_records, App};

#[derive(Debug, Subcommand)]
pub enum ItemCommand {
    /// Add an item to the catalogue.
    Add {
        /// Unique item code.
        #[arg(long)]
        code: String,

        #[command(flatten)]
        details: DetailArgs,

        /// Opening stock.
        #[arg(long, default_value_t = 0)]
        opening: i64,

        /// Reason on the opening stock entry.
        #[arg(long)]
        reason: Option<String>,
    },

    /// Change descriptive fields or prices. Omitted fields keep their value.
    Update {
        id: String,

        #[command(flatten)]
        details: DetailArgs,
    },

    /// Show one item by id or code.
    Show { key: String },

    /// List items by code or title.
    List {
        #[arg(long, default_value = "")]
        search: String,

        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Debug, Args)]
pub struct DetailArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    grade: Option<String>,
    #[arg(long)]
    publisher: Option<String>,
    #[arg(long = "type")]
    item_type: Option<String>,

    /// Regular-tier unit price in rupiah.
    #[arg(long)]
    price_regular: Option<i64>,

    /// Special-tier unit price in rupiah.
    #[arg(long)]
    price_special: Option<i64>,

    /// Regular-tier discount in basis points (1000 = 10%).
    #[arg(long)]
    discount_regular_bps: Option<u32>,

    /// Special-tier discount in basis points.
    #[arg(long)]
    discount_special_bps: Option<u32>,
}

impl DetailArgs {
    /// Overlays the given flags on `base`.
    fn apply(self, base: ItemDetails) -> ItemDetails {
        ItemDetails {
            title: self.title.unwrap_or(base.title),
            subject: self.subject.or(base.subject),
            grade: self.grade.or(base.grade),
            publisher: self.publisher.or(base.publisher),
            item_type: self.item_type.or(base.item_type),
            price_regular: self.price_regular.map(Money::from_rupiah).unwrap_or(base.price_regular),
            price_special: self.price_special.map(Money::from_rupiah).unwrap_or(base.price_special),
            discount_regular_bps: self.discount_regular_bps.unwrap_or(base.discount_regular_bps),
            discount_special_bps: self.discount_special_bps.unwrap_or(base.discount_special_bps),
        }
    }
}

fn details_of(item: &InventoryItem) -> ItemDetails {
    ItemDetails {
        title: item.title.clone(),
        subject: item.subject.clone(),
        grade: item.grade.clone(),
        publisher: item.publisher.clone(),
        item_type: item.item_type.clone(),
        price_regular: item.price_regular,
        price_special: item.price_special,
        discount_regular_bps: item.discount_regular_bps,
        discount_special_bps: item.discount_special_bps,
    }
}

impl ItemCommand {
    pub async fn run(self, app: &App) -> anyhow::Result<()> {
        match self {
            ItemCommand::Add {
                code,
                details,
                opening,
                reason,
            } => {
                let item = app
                    .stock
                    .add_item(NewItem {
                        code,
                        details: details.apply(ItemDetails::default()),
                        opening_quantity: opening,
                        reason,
                    })
                    .await?;
                app.emit(&item, print_item)
            }

            ItemCommand::Update { id, details } => {
                let current = app.stock.get_item(&id).await?;
                let item = app
                    .stock
                    .update_item_details(&id, details.apply(details_of(&current)))
                    .await?;
                app.emit(&item, print_item)
            }

            ItemCommand::Show { key } => {
                let item = match app.stock.get_item(&key).await {
                    Err(LedgerError::Store(DbError::NotFound { .. })) => {
                        app.stock.get_item_by_code(&key).await?
                    }
                    other => other?,
                };
                app.emit(&item, print_item)
            }

            ItemCommand::List { search, limit } => {
                let items = take_records("item", app.stock.list_items(&search, limit).await?);
                app.emit(&items, |items| {
                    for item in items {
                        println!(
                            "{:<12} {:>7}  {:<40} {}",
                            item.code,
                            item.quantity,
                            item.title,
                            item.id
                        );
                    }
                    println!("{} item(s)", items.len());
                })
            }
        }
    }
}

fn print_item(item: &InventoryItem) {
    println!("{} {}", item.code, item.title);
    println!("  id         {}", item.id);
    println!(
        "  subject    {} / grade {} / {}",
        or_dash(item.subject.as_deref()),
        or_dash(item.grade.as_deref()),
        or_dash(item.publisher.as_deref())
    );
    println!("  type       {}", or_dash(item.item_type.as_deref()));
    println!(
        "  regular    {} less {} bps",
        item.price_regular, item.discount_regular_bps
    );
    println!(
        "  special    {} less {} bps",
        item.price_special, item.discount_special_bps
    );
    println!("  on hand    {} (version {})", item.quantity, item.version);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_flags_overlay_current_values() {
        let base = ItemDetails {
            title: "Matematika Kelas 7".to_string(),
            publisher: Some("Erlangga".to_string()),
            price_regular: Money::from_rupiah(45_000),
            price_special: Money::from_rupiah(40_000),
            ..Default::default()
        };
        let args = DetailArgs {
            title: None,
            subject: None,
            grade: Some("7".to_string()),
            publisher: None,
            item_type: None,
            price_regular: Some(47_500),
            price_special: None,
            discount_regular_bps: None,
            discount_special_bps: Some(500),
        };

        let merged = args.apply(base);
        assert_eq!(merged.title, "Matematika Kelas 7");
        assert_eq!(merged.publisher.as_deref(), Some("Erlangga"));
        assert_eq!(merged.grade.as_deref(), Some("7"));
        assert_eq!(merged.price_regular.rupiah(), 47_500);
        assert_eq!(merged.price_special.rupiah(), 40_000);
        assert_eq!(merged.discount_special_bps, 500);
    }
}
