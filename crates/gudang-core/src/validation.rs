//! # Validation Module
//!
//! Input validation run before any store call.
//!
//! ## Usage
//! ```rust
//! use gudang_core::validation::{validate_delta, validate_item_code};
//!
//! assert!(validate_item_code("MTK-7A").is_ok());
//! assert!(validate_delta(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_AMOUNT, MAX_DISCOUNT_BPS, MAX_LINE_QUANTITY, MAX_NOTE_LEN, MAX_REASON_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates an opaque store identifier.
///
/// IDs are assigned by the store; only emptiness and length are checked.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::required(field));
    }

    if id.len() > 64 {
        return Err(ValidationError::too_long(field, 64));
    }

    Ok(())
}

/// Validates an item code.
///
/// ## Rules
/// - Must not be empty, at most 40 characters
/// - Letters, digits, hyphens, underscores, dots and slashes
///
/// ## Example
/// ```rust
/// use gudang_core::validation::validate_item_code;
///
/// assert!(validate_item_code("IPA-8/K13").is_ok());
/// assert!(validate_item_code("has space").is_err());
/// ```
pub fn validate_item_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required("code"));
    }

    if code.len() > 40 {
        return Err(ValidationError::too_long("code", 40));
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, '-', '_', '.' and '/'".to_string(),
        });
    }

    Ok(())
}

/// Validates a required display text (item title, customer name).
pub fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::too_long(field, max));
    }

    Ok(())
}

/// Validates a stock adjustment reason. Empty is allowed.
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(ValidationError::too_long("reason", MAX_REASON_LEN));
    }
    Ok(())
}

/// Validates a free-text note. Empty is allowed.
pub fn validate_note(note: &str) -> ValidationResult<()> {
    if note.chars().count() > MAX_NOTE_LEN {
        return Err(ValidationError::too_long("note", MAX_NOTE_LEN));
    }
    Ok(())
}

/// Validates a phone number.
///
/// ## Rules
/// - Digits, spaces, `+` and `-` only
/// - At most 20 characters
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();

    if phone.len() > 20 {
        return Err(ValidationError::too_long("phone", 20));
    }

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces, '+' and '-'".to_string(),
        });
    }

    Ok(())
}

/// Validates a search query and returns it trimmed.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::too_long("query", 100));
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a stock delta.
///
/// ## Rules
/// - Must not be zero ("quantity must not be 0")
///
/// ## Example
/// ```rust
/// use gudang_core::validation::validate_delta;
///
/// assert!(validate_delta(5).is_ok());
/// assert!(validate_delta(-20).is_ok());
/// assert!(validate_delta(0).is_err());
/// ```
pub fn validate_delta(delta: i64) -> ValidationResult<()> {
    if delta == 0 {
        return Err(ValidationError::MustNotBeZero {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates an opening quantity for a new item. Zero is allowed.
pub fn validate_opening_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::OutOfRange {
            field: "opening quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a quantity on a sale line.
pub fn validate_line_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a list price. Zero is allowed (complimentary copies).
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if !(0..=MAX_AMOUNT).contains(&price.rupiah()) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT,
        });
    }
    Ok(())
}

/// Validates a discount in basis points (0..=10000).
pub fn validate_discount_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > MAX_DISCOUNT_BPS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_DISCOUNT_BPS as i64,
        });
    }
    Ok(())
}

/// Validates a monetary amount that must be strictly positive.
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    validate_amount(field, amount)
}

/// Validates the magnitude of a signed amount: at most [`MAX_AMOUNT`] either
/// way. Zero passes; callers that forbid it check separately.
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !(-MAX_AMOUNT..=MAX_AMOUNT).contains(&amount.rupiah()) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: -MAX_AMOUNT,
            max: MAX_AMOUNT,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("item_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_id("item_id", "  ").is_err());
        assert!(validate_id("item_id", &"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_item_code() {
        assert!(validate_item_code("MTK-7A").is_ok());
        assert!(validate_item_code("IPA_8.2").is_ok());
        assert!(validate_item_code("").is_err());
        assert!(validate_item_code("bad code").is_err());
        assert!(validate_item_code(&"A".repeat(41)).is_err());
    }

    #[test]
    fn test_validate_delta() {
        assert!(validate_delta(1).is_ok());
        assert!(validate_delta(-1).is_ok());
        assert_eq!(
            validate_delta(0).unwrap_err().to_string(),
            "quantity must not be 0"
        );
    }

    #[test]
    fn test_validate_line_quantity() {
        assert!(validate_line_quantity(1).is_ok());
        assert!(validate_line_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(validate_line_quantity(0).is_err());
        assert!(validate_line_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+62 812-3456-7890").is_ok());
        assert!(validate_phone("0812abc").is_err());
    }

    #[test]
    fn test_validate_discount_and_price() {
        assert!(validate_discount_bps("discount", 10_000).is_ok());
        assert!(validate_discount_bps("discount", 10_001).is_err());
        assert!(validate_price("price", Money::zero()).is_ok());
        assert!(validate_price("price", Money::from_rupiah(-1)).is_err());
        assert!(validate_price("price", Money::from_rupiah(MAX_AMOUNT)).is_ok());
        assert!(validate_price("price", Money::from_rupiah(MAX_AMOUNT + 1)).is_err());
    }

    #[test]
    fn test_validate_amount_bounds() {
        assert!(validate_amount("amount", Money::from_rupiah(-MAX_AMOUNT)).is_ok());
        assert!(validate_amount("amount", Money::from_rupiah(MAX_AMOUNT)).is_ok());
        assert!(validate_amount("amount", Money::from_rupiah(i64::MIN)).is_err());
        assert!(validate_amount("amount", Money::from_rupiah(i64::MAX)).is_err());

        assert!(validate_positive_amount("amount", Money::from_rupiah(MAX_AMOUNT)).is_ok());
        assert!(validate_positive_amount("amount", Money::from_rupiah(MAX_AMOUNT + 1)).is_err());
        assert!(validate_positive_amount("amount", Money::zero()).is_err());
    }

    #[test]
    fn test_validate_reason_length() {
        assert!(validate_reason("").is_ok());
        assert!(validate_reason(&"r".repeat(MAX_REASON_LEN + 1)).is_err());
    }
}
