//! # Stock Ledger
//!
//! Pure stock math. The database layer applies these rules inside its
//! transactions; nothing here touches storage.
//!
//! ## Movement Types
//! ```text
//! ┌──────────────────────┬────────┬───────────────────────────────────────┐
//! │ MovementType         │ Sign   │ Written by                            │
//! ├──────────────────────┼────────┼───────────────────────────────────────┤
//! │ stock_in             │   +    │ receiving a stock-in                  │
//! │ stock_out            │   −    │ dispatching a stock-out               │
//! │ transfer_out         │   −    │ completing a transfer (source)        │
//! │ transfer_in          │   +    │ completing a transfer (destination)   │
//! │ sale                 │   −    │ completing a sale                     │
//! │ filter_replacement   │   −    │ replacing a machine filter            │
//! │ adjustment           │   ±    │ manual correction                     │
//! └──────────────────────┴────────┴───────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::MAX_LINE_QUANTITY;

// =============================================================================
// Movement Type
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    StockIn,
    StockOut,
    TransferIn,
    TransferOut,
    Sale,
    FilterReplacement,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::StockIn => "stock_in",
            MovementType::StockOut => "stock_out",
            MovementType::TransferIn => "transfer_in",
            MovementType::TransferOut => "transfer_out",
            MovementType::Sale => "sale",
            MovementType::FilterReplacement => "filter_replacement",
            MovementType::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Lines
// =============================================================================

/// A product quantity on a stock document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: String,
    pub quantity: i64,
}

impl StockLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        StockLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Validates lines and sums duplicate products.
///
/// A document that lists the same product twice must be checked against the
/// combined quantity, otherwise each line passes on its own and the balance
/// goes negative. First-seen order is kept.
pub fn merge_lines(lines: &[StockLine]) -> CoreResult<Vec<StockLine>> {
    if lines.is_empty() {
        return Err(CoreError::EmptyDocument("stock document".to_string()));
    }

    let mut merged: Vec<StockLine> = Vec::with_capacity(lines.len());
    let mut index: HashMap<&str, usize> = HashMap::new();

    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "product_id".to_string(),
            }
            .into());
        }
        if line.quantity <= 0 || line.quantity > MAX_LINE_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_LINE_QUANTITY,
            }
            .into());
        }

        match index.get(line.product_id.as_str()) {
            Some(&i) => merged[i].quantity += line.quantity,
            None => {
                index.insert(line.product_id.as_str(), merged.len());
                merged.push(line.clone());
            }
        }
    }

    Ok(merged)
}

/// Merges transfer lines and rejects a transfer into the same warehouse.
pub fn plan_transfer(from_warehouse: &str, to_warehouse: &str, lines: &[StockLine]) -> CoreResult<Vec<StockLine>> {
    if from_warehouse == to_warehouse {
        return Err(CoreError::SameWarehouseTransfer(from_warehouse.to_string()));
    }
    merge_lines(lines)
}

// =============================================================================
// Balance Math
// =============================================================================

/// Applies a signed delta to a balance; the result may never be negative.
///
/// ```rust
/// use depot_core::ledger::apply_delta;
///
/// assert_eq!(apply_delta("FLT-1", 10, -4).unwrap(), 6);
/// assert!(apply_delta("FLT-1", 3, -5).is_err());
/// ```
pub fn apply_delta(sku: &str, current: i64, delta: i64) -> CoreResult<i64> {
    let next = current.checked_add(delta).ok_or_else(|| ValidationError::OutOfRange {
        field: "quantity".to_string(),
        min: 0,
        max: i64::MAX,
    })?;
    if next < 0 {
        return Err(CoreError::InsufficientStock {
            sku: sku.to_string(),
            available: current,
            requested: -delta,
        });
    }
    Ok(next)
}

/// A balance is low when it has fallen to a positive threshold.
#[inline]
pub fn is_low_stock(quantity: i64, threshold: i64) -> bool {
    threshold > 0 && quantity <= threshold
}

// =============================================================================
// Unit Tests
// =============================================================================
