//! # Row Boundary
//!
//! Every read goes through a primitive row struct and a `TryFrom` into the
//! core type. Nothing loosely typed gets past this module.
//!
//! ```text
//! ┌────────────┐  FromRow   ┌────────────┐  TryFrom   ┌──────────────────┐
//! │  SQLite    │ ─────────► │  ItemRow   │ ─────────► │  InventoryItem   │
//! │  row       │            │ (i64, str) │  checks:   │  (Money, enums,  │
//! └────────────┘            └────────────┘  ranges,   │   DateTime)      │
//!                                           tags,     └──────────────────┘
//!                                           timestamps,
//!                                           arithmetic, sign
//! ```
//!
//! Point reads turn a bad row into [`DbError::MalformedRecord`]. Collection
//! reads keep going: bad rows land in [`Loaded::quarantined`] and are logged.

use chrono::{DateTime, SecondsFormat, Utc};
use gudang_core::invoice::InvoiceNumber;
use gudang_core::{
    CashMutationEntry, CoreError, Customer, InventoryItem, ItemSnapshot, Money, MutationCategory,
    PaymentMethod, PaymentRecord, SaleLine, SalesTransaction, StockHistoryEntry,
    MAX_DISCOUNT_BPS,
};
use gudang_core::validation::validate_amount;
use tracing::warn;

use crate::error::{DbError, DbResult};

// =============================================================================
// Timestamps
// =============================================================================

/// Canonical stored form: UTC, microseconds, `Z` suffix. Fixed width, so
/// text order is time order.
pub fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(entity: &str, id: &str, field: &str, raw: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::invalid_record(entity, id, format!("{}: {}", field, e)))
}

/// Truncates to the stored precision so values compare equal after a round
/// trip through the database.
pub fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&format_ts(at))
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(at)
}

fn bps(entity: &str, id: &str, field: &str, raw: i64) -> Result<u32, CoreError> {
    u32::try_from(raw)
        .ok()
        .filter(|v| *v <= MAX_DISCOUNT_BPS)
        .ok_or_else(|| CoreError::invalid_record(entity, id, format!("{} out of range: {}", field, raw)))
}

// =============================================================================
// Loaded
// =============================================================================

/// A row that failed validation on a collection read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quarantined {
    pub id: String,
    pub reason: String,
}

/// Result of a collection read.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub quarantined: Vec<Quarantined>,
}

impl<T> Loaded<T> {
    pub fn is_clean(&self) -> bool {
        self.quarantined.is_empty()
    }
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            quarantined: Vec::new(),
        }
    }
}

/// Row types expose their key for quarantine reporting.
pub trait RowKey {
    fn key(&self) -> String;
}

/// Converts a collection, quarantining rows that fail.
pub fn load_all<R, T>(entity: &str, rows: Vec<R>) -> Loaded<T>
where
    R: RowKey,
    T: TryFrom<R, Error = CoreError>,
{
    let mut loaded = Loaded {
        records: Vec::with_capacity(rows.len()),
        quarantined: Vec::new(),
    };

    for row in rows {
        let id = row.key();
        match T::try_from(row) {
            Ok(record) => loaded.records.push(record),
            Err(err) => {
                warn!(entity = %entity, id = %id, error = %err, "Quarantined malformed record");
                loaded.quarantined.push(Quarantined {
                    id,
                    reason: err.to_string(),
                });
            }
        }
    }

    loaded
}

/// Converts a single row; a bad row is an error.
pub fn load_one<R, T>(row: R) -> DbResult<T>
where
    T: TryFrom<R, Error = CoreError>,
{
    T::try_from(row).map_err(into_malformed)
}

pub(crate) fn into_malformed(err: CoreError) -> DbError {
    match err {
        CoreError::InvalidRecord { entity, id, reason } => DbError::MalformedRecord { entity, id, reason },
        other => DbError::malformed("record", "unknown", other.to_string()),
    }
}

// =============================================================================
// Items
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: String,
    pub code: String,
    pub title: String,
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub publisher: Option<String>,
    pub item_type: Option<String>,
    pub price_regular: i64,
    pub price_special: i64,
    pub discount_regular_bps: i64,
    pub discount_special_bps: i64,
    pub quantity: i64,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl RowKey for ItemRow {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl TryFrom<ItemRow> for InventoryItem {
    type Error = CoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        const E: &str = "item";
        let id = row.id.as_str();

        if row.price_regular < 0 || row.price_special < 0 {
            return Err(CoreError::invalid_record(E, id, "negative price"));
        }

        Ok(InventoryItem {
            discount_regular_bps: bps(E, id, "discount_regular_bps", row.discount_regular_bps)?,
            discount_special_bps: bps(E, id, "discount_special_bps", row.discount_special_bps)?,
            created_at: parse_ts(E, id, "created_at", &row.created_at)?,
            updated_at: parse_ts(E, id, "updated_at", &row.updated_at)?,
            price_regular: Money::from_rupiah(row.price_regular),
            price_special: Money::from_rupiah(row.price_special),
            quantity: row.quantity,
            version: row.version,
            code: row.code,
            title: row.title,
            subject: row.subject,
            grade: row.grade,
            publisher: row.publisher,
            item_type: row.item_type,
            id: row.id,
        })
    }
}

// =============================================================================
// Stock History
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryRow {
    pub seq: i64,
    pub id: String,
    pub item_id: String,
    pub code: String,
    pub title: String,
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub publisher: Option<String>,
    pub item_type: Option<String>,
    pub delta: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub reason: String,
    pub occurred_at: String,
    pub committed_at: String,
}

impl RowKey for HistoryRow {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl TryFrom<HistoryRow> for StockHistoryEntry {
    type Error = CoreError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        const E: &str = "stock_history";
        let id = row.id.as_str();

        if row.delta == 0 {
            return Err(CoreError::invalid_record(E, id, "zero delta"));
        }

        let entry = StockHistoryEntry {
            occurred_at: parse_ts(E, id, "occurred_at", &row.occurred_at)?,
            committed_at: parse_ts(E, id, "committed_at", &row.committed_at)?,
            seq: row.seq,
            item_id: row.item_id,
            snapshot: ItemSnapshot {
                code: row.code,
                title: row.title,
                subject: row.subject,
                grade: row.grade,
                publisher: row.publisher,
                item_type: row.item_type,
            },
            delta: row.delta,
            quantity_before: row.quantity_before,
            quantity_after: row.quantity_after,
            reason: row.reason,
            id: row.id,
        };

        if !entry.is_consistent() {
            return Err(CoreError::invalid_record(
                E,
                &entry.id,
                "quantity_after != quantity_before + delta",
            ));
        }

        Ok(entry)
    }
}

// =============================================================================
// Cash Mutations
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CashRow {
    pub seq: i64,
    pub id: String,
    pub amount: i64,
    pub category: String,
    pub note: String,
    pub occurred_at: String,
    pub proof_ref: Option<String>,
    pub revision: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl RowKey for CashRow {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl TryFrom<CashRow> for CashMutationEntry {
    type Error = CoreError;

    fn try_from(row: CashRow) -> Result<Self, Self::Error> {
        const E: &str = "cash_mutation";
        let id = row.id.as_str();

        let category: MutationCategory = row
            .category
            .parse()
            .map_err(|_| CoreError::invalid_record(E, id, format!("unknown category '{}'", row.category)))?;

        let entry = CashMutationEntry {
            occurred_at: parse_ts(E, id, "occurred_at", &row.occurred_at)?,
            created_at: parse_ts(E, id, "created_at", &row.created_at)?,
            updated_at: parse_ts(E, id, "updated_at", &row.updated_at)?,
            seq: row.seq,
            amount: Money::from_rupiah(row.amount),
            category,
            note: row.note,
            proof_ref: row.proof_ref,
            revision: row.revision,
            id: row.id,
        };

        if validate_amount("amount", entry.amount).is_err() {
            return Err(CoreError::invalid_record(
                E,
                &entry.id,
                format!("amount {} is beyond the ledger limit", entry.amount.rupiah()),
            ));
        }

        if !entry.sign_matches_category() {
            return Err(CoreError::invalid_record(
                E,
                &entry.id,
                format!("amount {} has the wrong sign for {}", entry.amount, entry.category),
            ));
        }

        Ok(entry)
    }
}

/// Previous values of an edited cash mutation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CashRevisionRow {
    pub mutation_id: String,
    pub revision: i64,
    pub amount: i64,
    pub category: String,
    pub note: String,
    pub occurred_at: String,
    pub proof_ref: Option<String>,
    pub replaced_at: String,
}

/// One entry of a mutation's edit trail.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CashRevision {
    pub mutation_id: String,

    /// The revision number these values had before the edit.
    pub revision: i64,
    pub amount: Money,
    pub category: MutationCategory,
    pub note: String,
    pub occurred_at: DateTime<Utc>,
    pub proof_ref: Option<String>,
    pub replaced_at: DateTime<Utc>,
}

impl RowKey for CashRevisionRow {
    fn key(&self) -> String {
        format!("{}#{}", self.mutation_id, self.revision)
    }
}

impl TryFrom<CashRevisionRow> for CashRevision {
    type Error = CoreError;

    fn try_from(row: CashRevisionRow) -> Result<Self, Self::Error> {
        const E: &str = "cash_mutation_revision";
        let id = row.key();

        Ok(CashRevision {
            category: row
                .category
                .parse()
                .map_err(|_| CoreError::invalid_record(E, &id, "unknown category"))?,
            occurred_at: parse_ts(E, &id, "occurred_at", &row.occurred_at)?,
            replaced_at: parse_ts(E, &id, "replaced_at", &row.replaced_at)?,
            amount: Money::from_rupiah(row.amount),
            mutation_id: row.mutation_id,
            revision: row.revision,
            note: row.note,
            proof_ref: row.proof_ref,
        })
    }
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub special_pricing: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl RowKey for CustomerRow {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl TryFrom<CustomerRow> for Customer {
    type Error = CoreError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        const E: &str = "customer";
        let id = row.id.as_str();

        if row.name.trim().is_empty() {
            return Err(CoreError::invalid_record(E, id, "empty name"));
        }

        Ok(Customer {
            created_at: parse_ts(E, id, "created_at", &row.created_at)?,
            updated_at: parse_ts(E, id, "updated_at", &row.updated_at)?,
            name: row.name,
            phone: row.phone,
            special_pricing: row.special_pricing,
            id: row.id,
        })
    }
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleRow {
    pub invoice: String,
    pub customer_id: Option<String>,
    pub total: i64,
    pub amount_paid: i64,
    pub note: String,
    pub created_at: String,
}

impl RowKey for SaleRow {
    fn key(&self) -> String {
        self.invoice.clone()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleLineRow {
    pub invoice: String,
    pub line_no: i64,
    pub item_id: String,
    pub code: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub discount_bps: i64,
    pub line_total: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub seq: i64,
    pub id: String,
    pub invoice: String,
    pub amount: i64,
    pub method: String,
    pub note: String,
    pub paid_at: String,
}

/// A sale header with its lines and payments, as read.
#[derive(Debug, Clone)]
pub struct SaleRows {
    pub sale: SaleRow,
    pub lines: Vec<SaleLineRow>,
    pub payments: Vec<PaymentRow>,
}

impl RowKey for SaleRows {
    fn key(&self) -> String {
        self.sale.invoice.clone()
    }
}

impl TryFrom<SaleRows> for SalesTransaction {
    type Error = CoreError;

    fn try_from(rows: SaleRows) -> Result<Self, Self::Error> {
        const E: &str = "sale";
        let SaleRows { sale, lines, payments } = rows;
        let id = sale.invoice.clone();

        let invoice: InvoiceNumber = sale
            .invoice
            .parse()
            .map_err(|_| CoreError::invalid_record(E, &id, "malformed invoice key"))?;

        let lines = lines
            .into_iter()
            .map(|l| -> Result<SaleLine, CoreError> {
                if l.quantity <= 0 {
                    return Err(CoreError::invalid_record(E, &id, format!("line {} quantity", l.line_no)));
                }
                Ok(SaleLine {
                    discount_bps: bps(E, &id, "discount_bps", l.discount_bps)?,
                    item_id: l.item_id,
                    code: l.code,
                    title: l.title,
                    quantity: l.quantity,
                    unit_price: Money::from_rupiah(l.unit_price),
                    line_total: Money::from_rupiah(l.line_total),
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let payments = payments
            .into_iter()
            .map(|p| -> Result<PaymentRecord, CoreError> {
                let method: PaymentMethod = p
                    .method
                    .parse()
                    .map_err(|_| CoreError::invalid_record(E, &id, format!("payment method '{}'", p.method)))?;
                Ok(PaymentRecord {
                    paid_at: parse_ts(E, &id, "paid_at", &p.paid_at)?,
                    id: p.id,
                    amount: Money::from_rupiah(p.amount),
                    method,
                    note: p.note,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let total = Money::from_rupiah(sale.total);
        let amount_paid = Money::from_rupiah(sale.amount_paid);

        if gudang_core::sale::total_of(&lines).ok() != Some(total) {
            return Err(CoreError::invalid_record(E, &id, "total differs from line totals"));
        }
        let paid = payments
            .iter()
            .try_fold(Money::zero(), |acc, p| acc.checked_add(p.amount));
        if paid != Some(amount_paid) {
            return Err(CoreError::invalid_record(E, &id, "amount_paid differs from payments"));
        }

        Ok(SalesTransaction {
            created_at: parse_ts(E, &id, "created_at", &sale.created_at)?,
            invoice,
            customer_id: sale.customer_id,
            lines,
            total,
            amount_paid,
            payments,
            note: sale.note,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cash_row(amount: i64, category: &str) -> CashRow {
        let now = format_ts(Utc::now());
        CashRow {
            seq: 1,
            id: "m1".to_string(),
            amount,
            category: category.to_string(),
            note: String::new(),
            occurred_at: now.clone(),
            proof_ref: None,
            revision: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let a = format_ts("2024-07-01T09:00:00Z".parse().unwrap());
        let b = format_ts("2024-07-01T09:00:00.5Z".parse().unwrap());
        assert_eq!(a, "2024-07-01T09:00:00.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    #[test]
    fn test_cash_row_sign_checked() {
        let ok: Result<CashMutationEntry, _> = cash_row(-400, "salary").try_into();
        assert!(ok.is_ok());

        let bad: Result<CashMutationEntry, _> = cash_row(400, "salary").try_into();
        assert!(matches!(bad, Err(CoreError::InvalidRecord { .. })));

        let unknown: Result<CashMutationEntry, _> = cash_row(400, "gifts").try_into();
        assert!(unknown.is_err());
    }

    #[test]
    fn test_cash_row_amount_bounded() {
        for raw in [i64::MIN, i64::MAX] {
            let category = if raw < 0 { "salary" } else { "sales" };
            let bad: Result<CashMutationEntry, _> = cash_row(raw, category).try_into();
            assert!(matches!(bad, Err(CoreError::InvalidRecord { .. })));
        }
    }

    #[test]
    fn test_load_all_quarantines_bad_rows() {
        let mut broken = cash_row(100, "sales");
        broken.id = "m2".to_string();
        broken.occurred_at = "yesterday".to_string();

        let loaded: Loaded<CashMutationEntry> =
            load_all("cash_mutation", vec![cash_row(100, "sales"), broken]);
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.quarantined.len(), 1);
        assert_eq!(loaded.quarantined[0].id, "m2");
        assert!(!loaded.is_clean());
    }

    #[test]
    fn test_load_one_maps_to_malformed() {
        let err = load_one::<_, CashMutationEntry>(cash_row(-5, "sales")).unwrap_err();
        assert!(matches!(err, DbError::MalformedRecord { ref id, .. } if id == "m1"));
    }

    #[test]
    fn test_history_row_arithmetic_checked() {
        let now = format_ts(Utc::now());
        let row = HistoryRow {
            seq: 1,
            id: "h1".to_string(),
            item_id: "i1".to_string(),
            code: "MTK-7A".to_string(),
            title: "Matematika".to_string(),
            subject: None,
            grade: None,
            publisher: None,
            item_type: None,
            delta: 5,
            quantity_before: 10,
            quantity_after: 16,
            reason: String::new(),
            occurred_at: now.clone(),
            committed_at: now,
        };
        assert!(StockHistoryEntry::try_from(row).is_err());
    }
}
