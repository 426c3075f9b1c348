//! # Sale Repository
//!
//! Invoices with their lines and payments.
//!
//! ## Invoice Numbering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  outside tx:  last = MAX(invoice) LIKE 'INV-202407-%'   → seed = 42    │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    INSERT INTO invoice_counters (period, last_seq) VALUES ('202407', 42)│
//! │      ON CONFLICT DO UPDATE SET last_seq = MAX(last_seq + 1, 42)         │
//! │      RETURNING last_seq                          ← takes the write lock │
//! │    INSERT sales, sale_lines                                             │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter row is the serialisation point: two writers in the same month
//! can never mint the same key. The seed only matters the first time a
//! period is seen, e.g. for keys imported before the counter existed.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use gudang_core::invoice::{next_after, period_of, period_prefix};
use gudang_core::{CoreError, InvoiceNumber, Money, PaymentRecord, SaleLine, SalesTransaction};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult, LedgerResult};
use crate::records::{
    format_ts, load_all, load_one, stored_precision, Loaded, PaymentRow, SaleLineRow, SaleRow,
    SaleRows,
};

/// A priced sale that has no invoice key yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleDraft {
    pub customer_id: Option<String>,
    pub lines: Vec<SaleLine>,
    pub total: Money,
    pub note: String,
}

/// Repository for sales, lines and payments.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Allocates the next invoice key of the month of `at` and inserts the
    /// sale with its lines in one transaction.
    ///
    /// ## Errors
    /// - `Rejected(InvoiceSequenceExhausted)` - the month already has 9999 invoices
    /// - `Store(ForeignKeyViolation)` - unknown customer or item
    pub async fn insert_with_next_invoice(
        &self,
        draft: &SaleDraft,
        at: DateTime<Utc>,
    ) -> LedgerResult<SalesTransaction> {
        let at = stored_precision(at);
        let period = period_of(at);

        let last: Option<String> = sqlx::query_scalar(
            "SELECT invoice FROM sales WHERE invoice LIKE ?1 ORDER BY invoice DESC LIMIT 1",
        )
        .bind(format!("{}%", period_prefix(&period)))
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;
        let seed = next_after(last.as_deref())?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_counters (period, last_seq) VALUES (?1, ?2)
            ON CONFLICT(period) DO UPDATE SET last_seq = MAX(last_seq + 1, excluded.last_seq)
            RETURNING last_seq
            "#,
        )
        .bind(&period)
        .bind(i64::from(seed))
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::from)?;

        let seq = u32::try_from(seq).map_err(|_| CoreError::InvoiceSequenceExhausted {
            period: period.clone(),
        })?;
        // Dropping the transaction on error rolls the counter back
        let invoice = InvoiceNumber::new(at.year(), at.month(), seq)?;
        let key = invoice.to_string();

        debug!(invoice = %key, lines = draft.lines.len(), total = %draft.total, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (invoice, customer_id, total, amount_paid, note, created_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?5)
            "#,
        )
        .bind(&key)
        .bind(&draft.customer_id)
        .bind(draft.total.rupiah())
        .bind(&draft.note)
        .bind(format_ts(at))
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        for (index, line) in draft.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_lines (
                    invoice, line_no, item_id, code, title, quantity, unit_price, discount_bps, line_total
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&key)
            .bind(index as i64 + 1)
            .bind(&line.item_id)
            .bind(&line.code)
            .bind(&line.title)
            .bind(line.quantity)
            .bind(line.unit_price.rupiah())
            .bind(i64::from(line.discount_bps))
            .bind(line.line_total.rupiah())
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;
        }

        tx.commit().await.map_err(DbError::from)?;

        Ok(SalesTransaction {
            invoice,
            customer_id: draft.customer_id.clone(),
            lines: draft.lines.clone(),
            total: draft.total,
            amount_paid: Money::zero(),
            payments: Vec::new(),
            note: draft.note.clone(),
            created_at: at,
        })
    }

    pub async fn get(&self, invoice: &str) -> DbResult<Option<SalesTransaction>> {
        debug!(invoice = %invoice, "Loading sale");

        let sale: Option<SaleRow> = sqlx::query_as(
            "SELECT invoice, customer_id, total, amount_paid, note, created_at FROM sales WHERE invoice = ?1",
        )
        .bind(invoice)
        .fetch_optional(&self.pool)
        .await?;

        let Some(sale) = sale else {
            return Ok(None);
        };

        let lines = self.lines_matching(invoice).await?;
        let payments = self.payments_matching(invoice).await?;

        load_one(SaleRows {
            sale,
            lines,
            payments,
        })
        .map(Some)
    }

    /// Lists sales of one `YYYYMM` period, or all sales, newest key first.
    pub async fn list(&self, period: Option<&str>) -> DbResult<Loaded<SalesTransaction>> {
        let pattern = match period {
            Some(period) => format!("{}%", period_prefix(period)),
            None => "%".to_string(),
        };
        debug!(pattern = %pattern, "Listing sales");

        let sales: Vec<SaleRow> = sqlx::query_as(
            r#"
            SELECT invoice, customer_id, total, amount_paid, note, created_at
            FROM sales WHERE invoice LIKE ?1
            ORDER BY invoice DESC
            "#,
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<String, Vec<SaleLineRow>> = HashMap::new();
        for line in self.lines_matching(&pattern).await? {
            lines.entry(line.invoice.clone()).or_default().push(line);
        }

        let mut payments: HashMap<String, Vec<PaymentRow>> = HashMap::new();
        for payment in self.payments_matching(&pattern).await? {
            payments.entry(payment.invoice.clone()).or_default().push(payment);
        }

        let grouped = sales
            .into_iter()
            .map(|sale| SaleRows {
                lines: lines.remove(&sale.invoice).unwrap_or_default(),
                payments: payments.remove(&sale.invoice).unwrap_or_default(),
                sale,
            })
            .collect();

        Ok(load_all("sale", grouped))
    }

    /// Adds a payment if it does not push `amount_paid` past `total`.
    ///
    /// ## Returns
    /// * `Ok(true)` - Payment recorded
    /// * `Ok(false)` - Sale missing or payment exceeds the outstanding amount
    pub async fn add_payment(&self, invoice: &str, payment: &PaymentRecord) -> DbResult<bool> {
        debug!(invoice = %invoice, amount = %payment.amount, "Recording payment");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE sales SET amount_paid = amount_paid + ?1
            WHERE invoice = ?2 AND amount_paid + ?1 <= total
            "#,
        )
        .bind(payment.amount.rupiah())
        .bind(invoice)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO sale_payments (id, invoice, amount, method, note, paid_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&payment.id)
        .bind(invoice)
        .bind(payment.amount.rupiah())
        .bind(payment.method.as_str())
        .bind(&payment.note)
        .bind(format_ts(payment.paid_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn lines_matching(&self, pattern: &str) -> DbResult<Vec<SaleLineRow>> {
        let rows = sqlx::query_as(
            r#"
            SELECT invoice, line_no, item_id, code, title, quantity, unit_price, discount_bps, line_total
            FROM sale_lines WHERE invoice LIKE ?1
            ORDER BY invoice, line_no
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn payments_matching(&self, pattern: &str) -> DbResult<Vec<PaymentRow>> {
        let rows = sqlx::query_as(
            r#"
            SELECT seq, id, invoice, amount, method, note, paid_at
            FROM sale_payments WHERE invoice LIKE ?1
            ORDER BY invoice, seq
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
