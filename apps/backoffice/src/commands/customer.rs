//! # Customer Commands

use clap::Subcommand;
use gudang_core::Customer;
use gudang_db::CustomerDetails;

use super::{or_dash, take_records, App};

#[derive(Debug, Subcommand)]
pub enum CustomerCommand {
    /// Add a customer.
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        phone: Option<String>,

        /// Buys at the special price tier.
        #[arg(long)]
        special: bool,
    },

    /// Change a customer. Omitted fields keep their value.
    Update {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        /// true or false.
        #[arg(long)]
        special: Option<bool>,
    },

    /// Delete a customer with no sales.
    Delete { id: String },

    Show { id: String },

    List,
}

impl CustomerCommand {
    pub async fn run(self, app: &App) -> anyhow::Result<()> {
        match self {
            CustomerCommand::Add {
                name,
                phone,
                special,
            } => {
                let customer = app
                    .customers
                    .add_customer(CustomerDetails {
                        name,
                        phone,
                        special_pricing: special,
                    })
                    .await?;
                app.emit(&customer, print_customer)
            }

            CustomerCommand::Update {
                id,
                name,
                phone,
                special,
            } => {
                let current = app.customers.get_customer(&id).await?;
                let customer = app
                    .customers
                    .update_customer(
                        &id,
                        CustomerDetails {
                            name: name.unwrap_or(current.name),
                            phone: phone.or(current.phone),
                            special_pricing: special.unwrap_or(current.special_pricing),
                        },
                    )
                    .await?;
                app.emit(&customer, print_customer)
            }

            CustomerCommand::Delete { id } => {
                app.customers.delete_customer(&id).await?;
                if !app.json {
                    println!("deleted {}", id);
                }
                Ok(())
            }

            CustomerCommand::Show { id } => {
                let customer = app.customers.get_customer(&id).await?;
                app.emit(&customer, print_customer)
            }

            CustomerCommand::List => {
                let customers = take_records("customer", app.customers.list_customers().await?);
                app.emit(&customers, |customers| {
                    for c in customers {
                        println!(
                            "{:<30} {:<16} {:<8} {}",
                            c.name,
                            or_dash(c.phone.as_deref()),
                            if c.special_pricing { "special" } else { "regular" },
                            c.id
                        );
                    }
                })
            }
        }
    }
}

fn print_customer(c: &Customer) {
    println!("{} ({:?} tier)", c.name, c.price_tier());
    println!("  id     {}", c.id);
    println!("  phone  {}", or_dash(c.phone.as_deref()));
}
