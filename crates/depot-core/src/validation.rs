//! # Validation Module
//!
//! Input checks that run before any business rule or query.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP / CLI                                                    │
//! │  └── Deserialization (serde, clap)                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  └── sku, names, quantities, prices, emails, ids, date ranges           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Workflow rules (workflow, ledger, attendance)                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite constraints (UNIQUE, CHECK, FOREIGN KEY)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::{MAX_DOCUMENT_LINES, MAX_EXPORT_DAYS, MAX_LINE_QUANTITY, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - 1 to 50 characters after trimming
/// - Letters, numbers, hyphens, underscores
///
/// ```rust
/// use depot_core::validation::validate_sku;
///
/// assert!(validate_sku("RO-500").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    validate_code("sku", sku, 50)
}

/// Validates a short business code (warehouse code, reference number).
pub fn validate_code(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a required free-text name (product, customer, warehouse).
pub fn validate_name(field: &str, name: &str, max: usize) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an email address: one `@`, non-empty local part, dotted domain.
///
/// ```rust
/// use depot_core::validation::validate_email;
///
/// assert!(validate_email("owner@example.com").is_ok());
/// assert!(validate_email("owner@localhost").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }
    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: 254,
        });
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain spaces"));
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("missing @"))?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid("must be name@domain"));
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid("domain must contain a dot"));
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a document line quantity (1..=MAX_LINE_QUANTITY).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
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

/// Validates a price in cents (0..=MAX_PRICE_CENTS). Zero is allowed (free
/// parts under warranty).
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

/// Validates the number of lines on one document.
pub fn validate_line_count(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    if lines > MAX_DOCUMENT_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_DOCUMENT_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Identifier / Date Validators
// =============================================================================

/// Validates a UUID string.
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates an inclusive report range: `from <= to`, at most a year and a day.
pub fn validate_date_range(from: NaiveDate, to: NaiveDate) -> ValidationResult<()> {
    if from > to {
        return Err(ValidationError::InvalidFormat {
            field: "date range".to_string(),
            reason: format!("start {from} is after end {to}"),
        });
    }
    if (to - from).num_days() > MAX_EXPORT_DAYS {
        return Err(ValidationError::OutOfRange {
            field: "date range (days)".to_string(),
            min: 0,
            max: MAX_EXPORT_DAYS,
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
    fn test_validate_sku() {
        assert!(validate_sku("RO-500").is_ok());
        assert!(validate_sku("FLT_SED_10").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Sediment filter 10\"", 200).is_ok());
        assert!(validate_name("name", "  ", 200).is_err());
        assert!(validate_name("name", &"é".repeat(10), 10).is_ok());
        assert!(validate_name("name", &"é".repeat(11), 10).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at.example.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@b@c.com").is_err());
        assert!(validate_email("a b@c.com").is_err());
        assert!(validate_email("a@.com").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_price_and_tax() {
        assert!(validate_price_cents("price", 0).is_ok());
        assert!(validate_price_cents("price", -1).is_err());
        assert!(validate_price_cents("price", crate::MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents("price", crate::MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_tax_rate_bps(10000).is_ok());
        assert!(validate_tax_rate_bps(10001).is_err());
    }

    #[test]
    fn test_validate_line_count() {
        assert!(validate_line_count(1).is_ok());
        assert!(validate_line_count(0).is_err());
        assert!(validate_line_count(MAX_DOCUMENT_LINES + 1).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
    }

    #[test]
    fn test_validate_date_range() {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        assert!(validate_date_range(d(1, 1), d(1, 31)).is_ok());
        assert!(validate_date_range(d(1, 1), d(1, 1)).is_ok());
        assert!(validate_date_range(d(2, 1), d(1, 1)).is_err());
        assert!(validate_date_range(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            d(12, 31)
        )
        .is_err());
    }
}
