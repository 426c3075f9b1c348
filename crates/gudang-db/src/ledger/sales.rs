//! # Sales
//!
//! Invoices priced from the customer's tier, numbered per month, paid in
//! one or more instalments.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NewSale ──► validate lines ──► price at customer tier                  │
//! │                                        │                                │
//! │                                        ▼                                │
//! │                   insert_with_next_invoice (counter + sale + lines)     │
//! │                                        │                                │
//! │                          deduct_stock? ▼                                │
//! │                   StockLedger::bulk_adjust_stock(-qty, "sale INV-…")    │
//! │                                        │                                │
//! │                                        ▼                                │
//! │                           SaleReceipt { sale, stock }                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock deduction happens after the sale commits and each line is its own
//! adjustment. A failed deduction is reported on the receipt; the invoice
//! stands.
//!
//! Payment status is derived from `amount_paid` and `total`, never stored.

use chrono::{DateTime, Utc};
use gudang_core::invoice::InvoiceNumber;
use gudang_core::sale::total_of;
use gudang_core::validation::{validate_amount, validate_id, validate_line_quantity, validate_note};
use gudang_core::{
    CoreError, LedgerSettings, Money, PaymentMethod, PaymentRecord, PriceTier, SaleLine,
    SalesTransaction, ValidationError, MAX_SALE_LINES,
};
use tracing::{info, warn};

use crate::error::{DbError, LedgerResult};
use crate::feed::{ChangeEvent, Collection};
use crate::ledger::stock::{BulkAdjustReport, StockAdjustment, StockLedger};
use crate::pool::Database;
use crate::records::{stored_precision, Loaded};
use crate::repository::generate_id;
use crate::repository::sale::SaleDraft;

/// One requested invoice line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequest {
    pub item_id: String,
    pub quantity: i64,
}

impl LineRequest {
    pub fn new(item_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSale {
    /// Walk-in sales have no customer and use the regular tier.
    pub customer_id: Option<String>,
    pub lines: Vec<LineRequest>,
    pub note: String,

    /// Apply `-quantity` to each line's item after the sale commits.
    pub deduct_stock: bool,
}

/// A committed sale plus the outcome of its stock deduction.
#[derive(Debug)]
pub struct SaleReceipt {
    pub sale: SalesTransaction,

    /// `None` when `deduct_stock` was off.
    pub stock: Option<BulkAdjustReport>,
}

/// A payment to record against an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub amount: Money,
    pub method: PaymentMethod,
    pub note: String,

    /// Defaults to now.
    pub paid_at: Option<DateTime<Utc>>,
}

/// Sales and payments.
#[derive(Debug, Clone)]
pub struct SalesService {
    db: Database,
    stock: StockLedger,
}

impl SalesService {
    pub fn new(db: Database, settings: LedgerSettings) -> Self {
        Self {
            stock: StockLedger::new(db.clone(), settings),
            db,
        }
    }

    /// Prices and records a sale under the next invoice key of the month.
    pub async fn create_sale(&self, new: NewSale) -> LedgerResult<SaleReceipt> {
        if new.lines.is_empty() {
            return Err(ValidationError::required("lines").into());
        }
        if new.lines.len() > MAX_SALE_LINES {
            return Err(ValidationError::OutOfRange {
                field: "lines".to_string(),
                min: 1,
                max: MAX_SALE_LINES as i64,
            }
            .into());
        }
        validate_note(&new.note)?;
        for line in &new.lines {
            validate_id("item_id", &line.item_id)?;
            validate_line_quantity(line.quantity)?;
        }

        let tier = match new.customer_id.as_deref() {
            Some(customer_id) => {
                validate_id("customer_id", customer_id)?;
                self.db
                    .customers()
                    .get_by_id(customer_id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Customer", customer_id))?
                    .price_tier()
            }
            None => PriceTier::Regular,
        };

        let mut lines = Vec::with_capacity(new.lines.len());
        for request in &new.lines {
            let item = self.stock.get_item(&request.item_id).await?;
            lines.push(SaleLine::price(&item, tier, request.quantity)?);
        }

        let total = total_of(&lines)?;
        validate_amount("total", total)?;

        let draft = SaleDraft {
            customer_id: new.customer_id.clone(),
            total,
            lines,
            note: new.note.trim().to_string(),
        };

        let sale = self.db.sales().insert_with_next_invoice(&draft, Utc::now()).await?;
        self.db.feed().publish(ChangeEvent::new(Collection::Sales, sale.invoice.to_string()));

        info!(
            invoice = %sale.invoice,
            lines = sale.lines.len(),
            total = %sale.total,
            tier = ?tier,
            "Sale recorded"
        );

        let stock = if new.deduct_stock {
            let reason = format!("sale {}", sale.invoice);
            let adjustments: Vec<_> = sale
                .lines
                .iter()
                .map(|line| StockAdjustment::new(&line.item_id, -line.quantity, reason.as_str()))
                .collect();

            let report = self.stock.bulk_adjust_stock(&adjustments).await;
            if !report.is_complete() {
                warn!(
                    invoice = %sale.invoice,
                    failed = report.failed.len(),
                    "Sale committed but stock deduction incomplete"
                );
            }
            Some(report)
        } else {
            None
        };

        Ok(SaleReceipt { sale, stock })
    }

    /// Records a payment and returns the updated sale.
    ///
    /// ## Errors
    /// - `Validation` - amount not positive or beyond `MAX_AMOUNT`, note too long
    /// - `Rejected(Overpayment)` - amount exceeds what is outstanding
    pub async fn record_payment(&self, invoice: &str, payment: NewPayment) -> LedgerResult<SalesTransaction> {
        let key: InvoiceNumber = invoice.trim().parse()?;
        let key = key.to_string();
        validate_note(&payment.note)?;

        let sale = self.get_sale(&key).await?;
        sale.check_payment(payment.amount)?;

        let record = PaymentRecord {
            id: generate_id(),
            amount: payment.amount,
            method: payment.method,
            note: payment.note.trim().to_string(),
            paid_at: stored_precision(payment.paid_at.unwrap_or_else(Utc::now)),
        };

        if !self.db.sales().add_payment(&key, &record).await? {
            // Another payment landed between the check and the write
            let fresh = self.get_sale(&key).await?;
            return Err(CoreError::Overpayment {
                invoice: key,
                amount: record.amount.rupiah(),
                outstanding: fresh.outstanding().rupiah(),
            }
            .into());
        }

        self.db.feed().publish(ChangeEvent::new(Collection::Sales, &key));

        let sale = self.get_sale(&key).await?;
        info!(
            invoice = %key,
            amount = %record.amount,
            method = %record.method,
            status = %sale.status(),
            "Payment recorded"
        );
        Ok(sale)
    }

    pub async fn get_sale(&self, invoice: &str) -> LedgerResult<SalesTransaction> {
        let sale = self
            .db
            .sales()
            .get(invoice)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", invoice))?;
        Ok(sale)
    }

    /// Sales of one `YYYYMM` period, or all sales.
    pub async fn list_sales(&self, period: Option<&str>) -> LedgerResult<Loaded<SalesTransaction>> {
        if let Some(period) = period {
            let valid = period.len() == 6
                && period.bytes().all(|b| b.is_ascii_digit())
                && matches!(period[4..].parse::<u32>(), Ok(1..=12));
            if !valid {
                return Err(ValidationError::InvalidFormat {
                    field: "period".to_string(),
                    reason: "expected YYYYMM".to_string(),
                }
                .into());
            }
        }
        Ok(self.db.sales().list(period).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
