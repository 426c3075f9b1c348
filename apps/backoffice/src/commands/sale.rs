//! # Sale Commands
//!
//! `sale create --line <item_id>:<qty> --line …` prices each line at the
//! customer's tier and takes the next invoice number of the month.

use anyhow::bail;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use gudang_core::{Money, PaymentMethod, SalesTransaction};
use gudang_db::{LineRequest, NewPayment, NewSale};
use serde::Serialize;

use super::stock::BatchOutcome;
use super::{parse_time, take_records, App};

#[derive(Debug, Subcommand)]
pub enum SaleCommand {
    /// Record a sale.
    Create {
        /// Customer id; omit for a walk-in sale at the regular tier.
        #[arg(long)]
        customer: Option<String>,

        /// `<item_id>:<quantity>`, repeatable.
        #[arg(long = "line", value_parser = parse_line, required = true)]
        lines: Vec<LineRequest>,

        #[arg(long, default_value = "")]
        note: String,

        /// Take the sold quantities out of stock.
        #[arg(long)]
        deduct_stock: bool,
    },

    /// Record a payment against an invoice.
    Pay {
        /// Invoice key, e.g. INV-202407-0001.
        invoice: String,

        /// Amount in rupiah.
        #[arg(long)]
        amount: i64,

        /// cash or transfer.
        #[arg(long, default_value = "cash")]
        method: PaymentMethod,

        #[arg(long, default_value = "")]
        note: String,

        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<Utc>>,
    },

    Show { invoice: String },

    /// List invoices, newest first.
    List {
        /// Restrict to one month, as YYYYMM.
        #[arg(long)]
        period: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct CreatedSale {
    sale: SaleOutput,
    stock: Option<BatchOutcome>,
}

/// A sale with its derived payment status.
#[derive(Debug, Serialize)]
struct SaleOutput {
    #[serde(flatten)]
    sale: SalesTransaction,
    status: String,
    outstanding: Money,
}

impl From<SalesTransaction> for SaleOutput {
    fn from(sale: SalesTransaction) -> Self {
        Self {
            status: sale.status().to_string(),
            outstanding: sale.outstanding(),
            sale,
        }
    }
}

impl SaleCommand {
    pub async fn run(self, app: &App) -> anyhow::Result<()> {
        match self {
            SaleCommand::Create {
                customer,
                lines,
                note,
                deduct_stock,
            } => {
                let receipt = app
                    .sales
                    .create_sale(NewSale {
                        customer_id: customer,
                        lines,
                        note,
                        deduct_stock,
                    })
                    .await?;

                let output = CreatedSale {
                    sale: receipt.sale.into(),
                    stock: receipt.stock.map(BatchOutcome::from),
                };
                app.emit(&output, |o| {
                    print_sale(&o.sale);
                    if let Some(stock) = &o.stock {
                        for f in &stock.failed {
                            println!("  stock not deducted for {}: {}", f.item_id, f.error);
                        }
                    }
                })?;

                if let Some(stock) = &output.stock {
                    if !stock.failed.is_empty() {
                        bail!(
                            "invoice {} recorded but {} stock deduction(s) failed",
                            output.sale.sale.invoice,
                            stock.failed.len()
                        );
                    }
                }
                Ok(())
            }

            SaleCommand::Pay {
                invoice,
                amount,
                method,
                note,
                at,
            } => {
                let sale = app
                    .sales
                    .record_payment(
                        &invoice,
                        NewPayment {
                            amount: Money::from_rupiah(amount),
                            method,
                            note,
                            paid_at: at,
                        },
                    )
                    .await?;
                app.emit(&SaleOutput::from(sale), print_sale)
            }

            SaleCommand::Show { invoice } => {
                let sale = app.sales.get_sale(invoice.trim()).await?;
                app.emit(&SaleOutput::from(sale), print_sale)
            }

            SaleCommand::List { period } => {
                let sales = take_records("sale", app.sales.list_sales(period.as_deref()).await?);
                let sales: Vec<SaleOutput> = sales.into_iter().map(SaleOutput::from).collect();
                app.emit(&sales, |sales| {
                    for s in sales {
                        println!(
                            "{}  {}  {:>16}  {:>16}  {}",
                            s.sale.invoice,
                            s.sale.created_at.format("%Y-%m-%d"),
                            s.sale.total.to_string(),
                            s.outstanding.to_string(),
                            s.status
                        );
                    }
                })
            }
        }
    }
}

fn parse_line(value: &str) -> Result<LineRequest, String> {
    let (item_id, quantity) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected <item_id>:<quantity>, got '{}'", value))?;
    let quantity = quantity
        .trim()
        .parse()
        .map_err(|_| format!("invalid quantity '{}'", quantity))?;
    Ok(LineRequest::new(item_id.trim(), quantity))
}

fn print_sale(output: &SaleOutput) {
    let sale = &output.sale;
    println!("{} {}", sale.invoice, output.status);
    for line in &sale.lines {
        println!(
            "  {:<12} {:<32} {:>5} x {:>12} less {:>4} bps = {}",
            line.code,
            line.title,
            line.quantity,
            line.unit_price.to_string(),
            line.discount_bps,
            line.line_total
        );
    }
    println!("  total        {}", sale.total);
    println!("  paid         {}", sale.amount_paid);
    println!("  outstanding  {}", output.outstanding);
}

#[cfg(test)]
mod tests {
    use super::*;
    use gudang_core::LedgerSettings;
    use gudang_db::{Database, DbConfig, ItemDetails, NewItem};

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("abc:12").unwrap(), LineRequest::new("abc", 12));
        assert!(parse_line("abc").is_err());
        assert!(parse_line("abc:x").is_err());
    }

    #[tokio::test]
    async fn test_create_then_pay_in_full() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let app = App::new(db, LedgerSettings::default(), true);
        let item = app
            .stock
            .add_item(NewItem {
                code: "IPA-8".to_string(),
                details: ItemDetails {
                    title: "IPA Kelas 8".to_string(),
                    price_regular: Money::from_rupiah(50_000),
                    price_special: Money::from_rupiah(45_000),
                    ..Default::default()
                },
                opening_quantity: 10,
                reason: None,
            })
            .await
            .unwrap();

        SaleCommand::Create {
            customer: None,
            lines: vec![LineRequest::new(&item.id, 3)],
            note: String::new(),
            deduct_stock: true,
        }
        .run(&app)
        .await
        .unwrap();

        let sale = app.sales.list_sales(None).await.unwrap().records.remove(0);
        assert_eq!(sale.total.rupiah(), 150_000);
        assert_eq!(app.stock.get_item(&item.id).await.unwrap().quantity, 7);

        SaleCommand::Pay {
            invoice: sale.invoice.to_string(),
            amount: 150_000,
            method: PaymentMethod::Transfer,
            note: String::new(),
            at: None,
        }
        .run(&app)
        .await
        .unwrap();

        let paid = app.sales.get_sale(&sale.invoice.to_string()).await.unwrap();
        assert!(paid.outstanding().is_zero());
    }
}
