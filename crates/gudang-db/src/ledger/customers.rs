//! # Customer Directory
//!
//! Thin validation layer over [`CustomerRepository`](crate::repository::customer::CustomerRepository).
//! The only business meaning a customer carries is its price tier.

use chrono::Utc;
use gudang_core::validation::{validate_id, validate_phone, validate_required_text};
use gudang_core::{Customer, MAX_CUSTOMER_NAME_LEN};
use tracing::info;

use crate::error::{DbError, LedgerResult};
use crate::feed::{ChangeEvent, Collection};
use crate::pool::Database;
use crate::records::{stored_precision, Loaded};
use crate::repository::generate_id;

/// Editable customer fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerDetails {
    pub name: String,
    pub phone: Option<String>,

    /// Buys at the special price tier.
    pub special_pricing: bool,
}

#[derive(Debug, Clone)]
pub struct CustomerService {
    db: Database,
}

impl CustomerService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn add_customer(&self, details: CustomerDetails) -> LedgerResult<Customer> {
        let details = clean(details)?;
        let now = stored_precision(Utc::now());
        let customer = Customer {
            id: generate_id(),
            name: details.name,
            phone: details.phone,
            special_pricing: details.special_pricing,
            created_at: now,
            updated_at: now,
        };

        self.db.customers().insert(&customer).await?;
        self.db.feed().publish(ChangeEvent::new(Collection::Customers, &customer.id));

        info!(id = %customer.id, special = customer.special_pricing, "Customer added");
        Ok(customer)
    }

    pub async fn update_customer(&self, id: &str, details: CustomerDetails) -> LedgerResult<Customer> {
        validate_id("customer_id", id)?;
        let details = clean(details)?;

        let current = self.get_customer(id).await?;
        let now = stored_precision(Utc::now());
        let updated = Customer {
            name: details.name,
            phone: details.phone,
            special_pricing: details.special_pricing,
            updated_at: now,
            ..current
        };

        self.db.customers().update(&updated, now).await?;
        self.db.feed().publish(ChangeEvent::new(Collection::Customers, id));
        Ok(updated)
    }

    /// Fails with `ForeignKeyViolation` while sales reference the customer.
    pub async fn delete_customer(&self, id: &str) -> LedgerResult<()> {
        validate_id("customer_id", id)?;
        self.db.customers().delete(id).await?;
        self.db.feed().publish(ChangeEvent::new(Collection::Customers, id));

        info!(id = %id, "Customer deleted");
        Ok(())
    }

    pub async fn get_customer(&self, id: &str) -> LedgerResult<Customer> {
        let customer = self
            .db
            .customers()
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;
        Ok(customer)
    }

    pub async fn list_customers(&self) -> LedgerResult<Loaded<Customer>> {
        Ok(self.db.customers().list().await?)
    }
}

fn clean(details: CustomerDetails) -> LedgerResult<CustomerDetails> {
    validate_required_text("name", &details.name, MAX_CUSTOMER_NAME_LEN)?;

    let phone = match details.phone.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(phone) => {
            validate_phone(phone)?;
            Some(phone.to_string())
        }
    };

    Ok(CustomerDetails {
        name: details.name.trim().to_string(),
        phone,
        special_pricing: details.special_pricing,
    })
}
