//! # Error Types
//!
//! Domain-specific error types for depot-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  depot-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  depot-db errors (separate crate)                                       │
//! │  └── DbError          - Database failures, wraps CoreError              │
//! │                                                                         │
//! │  HTTP errors (in app)                                                   │
//! │  └── ApiError         - What API clients see (status + JSON)            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough stock to apply a decrement.
    ///
    /// ## When This Occurs
    /// - Dispatching a stock-out larger than the warehouse balance
    /// - Completing a sale whose lines exceed the sale warehouse balance
    /// - Transferring more than the source warehouse holds
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// A status change that the workflow does not allow.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale (completed)
    ///      │
    ///      ▼
    /// set status: processing
    ///      │
    ///      ▼
    /// InvalidTransition { entity: "sale", from: "completed", to: "processing" }
    /// ```
    #[error("Cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// Transfer source and destination are the same warehouse.
    #[error("Transfer source and destination must differ (warehouse {0})")]
    SameWarehouseTransfer(String),

    /// Discount larger than the sale total.
    #[error("Discount {discount} exceeds total {total}")]
    DiscountExceedsTotal { discount: i64, total: i64 },

    /// A document without any lines.
    #[error("{0} must have at least one item")]
    EmptyDocument(String),

    /// Check-out timestamp earlier than check-in.
    #[error("Check-out at {check_out} is before check-in at {check_in}")]
    CheckOutBeforeCheckIn { check_in: String, check_out: String },

    /// Attendance already complete for the day.
    #[error("Attendance for {date} is already complete")]
    AttendanceComplete { date: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidTransition error from any displayable states.
    pub fn invalid_transition(
        entity: impl Into<String>,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        CoreError::InvalidTransition {
            entity: entity.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
