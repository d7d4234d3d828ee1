//! # Status Workflows
//!
//! Every document in Depot moves through a small state machine. The rules
//! live here and nowhere else; repositories call [`Workflow::transition`]
//! before writing a status.
//!
//! ## Sale Workflow
//! ```text
//!   pending ──► deposited ──► processing ──► ready ──► completed
//!      │            │             │            │
//!      └────────────┴─────────────┴────────────┴──────► cancelled
//!
//!   Forward skips are allowed (a walk-in sale goes pending ──► completed).
//!   completed and cancelled are terminal.
//! ```
//!
//! ## Document Workflows
//! ```text
//!   StockIn:   pending ──► received    | pending ──► cancelled
//!   StockOut:  pending ──► dispatched  | pending ──► cancelled
//!   Transfer:  pending ──► completed   | pending ──► cancelled
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::TaxRate;
use crate::validation::{validate_price_cents, validate_quantity};

// =============================================================================
// Workflow Trait
// =============================================================================

/// A status enum with validated transitions.
pub trait Workflow: Copy + Eq + fmt::Display {
    /// Entity name used in error messages ("sale", "stock_in", ...).
    const ENTITY: &'static str;

    fn can_transition_to(&self, next: Self) -> bool;

    fn is_terminal(&self) -> bool;

    /// Validates the move and returns the new status.
    fn transition(self, next: Self) -> CoreResult<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::invalid_transition(Self::ENTITY, self, next))
        }
    }
}

// =============================================================================
// Sale Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Pending,
    Deposited,
    Processing,
    Ready,
    Completed,
    Cancelled,
}

impl SaleStatus {
    /// Every status, in workflow order.
    pub const ALL: [SaleStatus; 6] = [
        SaleStatus::Pending,
        SaleStatus::Deposited,
        SaleStatus::Processing,
        SaleStatus::Ready,
        SaleStatus::Completed,
        SaleStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Deposited => "deposited",
            SaleStatus::Processing => "processing",
            SaleStatus::Ready => "ready",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        }
    }

    /// Position in the forward workflow; `None` for cancelled.
    fn rank(&self) -> Option<u8> {
        match self {
            SaleStatus::Pending => Some(0),
            SaleStatus::Deposited => Some(1),
            SaleStatus::Processing => Some(2),
            SaleStatus::Ready => Some(3),
            SaleStatus::Completed => Some(4),
            SaleStatus::Cancelled => None,
        }
    }
}

impl Workflow for SaleStatus {
    const ENTITY: &'static str = "sale";

    fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == SaleStatus::Cancelled {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(current), Some(target)) => target > current,
            _ => false,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Completed | SaleStatus::Cancelled)
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SaleStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: SaleStatus::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Document Statuses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum StockInStatus {
    Pending,
    Received,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum StockOutStatus {
    Pending,
    Dispatched,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Completed,
    Cancelled,
}

impl Workflow for StockInStatus {
    const ENTITY: &'static str = "stock_in";

    fn can_transition_to(&self, next: Self) -> bool {
        *self == StockInStatus::Pending && next != StockInStatus::Pending
    }

    fn is_terminal(&self) -> bool {
        *self != StockInStatus::Pending
    }
}

impl Workflow for StockOutStatus {
    const ENTITY: &'static str = "stock_out";

    fn can_transition_to(&self, next: Self) -> bool {
        *self == StockOutStatus::Pending && next != StockOutStatus::Pending
    }

    fn is_terminal(&self) -> bool {
        *self != StockOutStatus::Pending
    }
}

impl Workflow for TransferStatus {
    const ENTITY: &'static str = "transfer";

    fn can_transition_to(&self, next: Self) -> bool {
        *self == TransferStatus::Pending && next != TransferStatus::Pending
    }

    fn is_terminal(&self) -> bool {
        *self != TransferStatus::Pending
    }
}

impl fmt::Display for StockInStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StockInStatus::Pending => "pending",
            StockInStatus::Received => "received",
            StockInStatus::Cancelled => "cancelled",
        })
    }
}

impl fmt::Display for StockOutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StockOutStatus::Pending => "pending",
            StockOutStatus::Dispatched => "dispatched",
            StockOutStatus::Cancelled => "cancelled",
        })
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        })
    }
}

// =============================================================================
// Sale Totals
// =============================================================================

/// One priced line of a sale, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl PricedLine {
    #[inline]
    pub fn line_total(&self) -> CoreResult<Money> {
        self.unit_price
            .multiply_quantity(self.quantity)
            .ok_or_else(|| amount_out_of_range("line_total"))
    }
}

fn amount_out_of_range(field: &str) -> CoreError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

/// Totals of a sale.
///
/// ```text
/// total_amount = Σ unit_price × quantity
/// tax          = (total_amount − discount) × rate
/// net_total    = total_amount − discount + tax
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub total_amount: Money,
    pub discount: Money,
    pub tax: Money,
    pub net_total: Money,
}

impl SaleTotals {
    /// Computes totals, rejecting empty sales, bad quantities and
    /// discounts larger than the total.
    pub fn compute(lines: &[PricedLine], discount: Money, tax_rate: TaxRate) -> CoreResult<Self> {
        if lines.is_empty() {
            return Err(CoreError::EmptyDocument("sale".to_string()));
        }
        for line in lines {
            validate_quantity(line.quantity)?;
            validate_price_cents("unit_price", line.unit_price.cents())?;
        }
        validate_price_cents("discount", discount.cents())?;

        let mut total_amount = Money::zero();
        for line in lines {
            total_amount = total_amount
                .checked_add(line.line_total()?)
                .ok_or_else(|| amount_out_of_range("total_amount"))?;
        }
        if discount > total_amount {
            return Err(CoreError::DiscountExceedsTotal {
                discount: discount.cents(),
                total: total_amount.cents(),
            });
        }

        let tax = (total_amount - discount).calculate_tax(tax_rate);
        Ok(SaleTotals {
            total_amount,
            discount,
            tax,
            net_total: total_amount - discount + tax,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
