//! # Domain Types
//!
//! Records shared by every layer of Depot.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog            Inventory              Documents                    │
//! │  ─────────          ──────────             ─────────                    │
//! │  Product            Stock                  StockIn  (+ items)           │
//! │  ProductFilter      StockLevel (joined)    StockOut (+ items)           │
//! │  Warehouse          StockMovement          StockTransfer (+ items)      │
//! │                                                                         │
//! │  Sales              After-sales            People                       │
//! │  ─────              ───────────            ──────                       │
//! │  Sale               Machine                User, Role                   │
//! │  SaleItem           MachineFilter          Attendance                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status enums live next to the rules that move them:
//! [`crate::workflow`], [`crate::ledger`], [`crate::machine`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::MovementType;
use crate::machine::{FilterStatus, MachineStatus};
use crate::money::Money;
use crate::workflow::{SaleStatus, StockInStatus, StockOutStatus, TransferStatus};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (825 = 8.25%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// What a product is, which decides what completing a sale does with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Provisioned as a [`Machine`] when sold.
    Machine,
    /// Installed inside machines; has a lifespan.
    Filter,
    /// Everything else (spare parts, accessories).
    Part,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Machine => "machine",
            ProductKind::Filter => "filter",
            ProductKind::Part => "part",
        }
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sellable / stockable product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    /// Business identifier, unique.
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub price_cents: i64,
    /// Alert when a warehouse balance falls to this level. 0 disables.
    pub low_stock_threshold: i64,
    /// Replacement interval for filter products.
    pub filter_lifespan_days: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn is_machine(&self) -> bool {
        self.kind == ProductKind::Machine
    }
}

/// One entry of a machine product's default filter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductFilter {
    pub machine_product_id: String,
    pub filter_product_id: String,
    /// Number of cartridges of this filter per machine.
    pub quantity: i64,
    /// Lifespan of the filter product, joined in for provisioning.
    pub lifespan_days: i64,
}

/// A physical stock location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Warehouse {
    pub id: String,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// People
// =============================================================================

pub const ROLE_SUPER_ADMIN: &str = "super_admin";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_STAFF: &str = "staff";
pub const ROLE_TECHNICIAN: &str = "technician";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Role {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One attendance day of one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Attendance {
    pub id: String,
    pub user_id: String,
    /// Local calendar day the check-in belongs to.
    pub work_date: NaiveDate,
    pub check_in_at: DateTime<Utc>,
    pub check_out_at: Option<DateTime<Utc>>,
    /// Set on check-out.
    pub work_minutes: Option<i64>,
    /// Set on check-out.
    pub overtime_minutes: Option<i64>,
    pub is_late: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attendance joined with the user's name, for exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AttendanceLine {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub attendance: Attendance,
    pub user_name: String,
    pub user_email: String,
}

// =============================================================================
// Inventory
// =============================================================================

/// Balance of one product in one warehouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Stock {
    pub id: String,
    pub product_id: String,
    pub warehouse_id: String,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

/// Stock joined with product and warehouse names, for listings and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockLevel {
    pub product_id: String,
    pub sku: String,
    pub product_name: String,
    pub warehouse_id: String,
    pub warehouse_code: String,
    pub warehouse_name: String,
    pub quantity: i64,
    pub low_stock_threshold: i64,
}

impl StockLevel {
    pub fn is_low(&self) -> bool {
        crate::ledger::is_low_stock(self.quantity, self.low_stock_threshold)
    }
}

/// Ledger entry: one quantity change of one product in one warehouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub warehouse_id: String,
    pub movement_type: MovementType,
    /// Signed delta applied to the balance.
    pub quantity: i64,
    pub balance_after: i64,
    /// Document kind that caused the movement ("stock_in", "sale", ...).
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub note: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Movement joined with product and warehouse codes, for history and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MovementLine {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub movement: StockMovement,
    pub sku: String,
    pub product_name: String,
    pub warehouse_code: String,
}

// =============================================================================
// Stock Documents
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockIn {
    pub id: String,
    pub reference_no: String,
    pub warehouse_id: String,
    pub supplier: Option<String>,
    pub status: StockInStatus,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockInItem {
    pub id: String,
    pub stock_in_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockOut {
    pub id: String,
    pub reference_no: String,
    pub warehouse_id: String,
    pub recipient: Option<String>,
    pub reason: Option<String>,
    pub status: StockOutStatus,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockOutItem {
    pub id: String,
    pub stock_out_id: String,
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockTransfer {
    pub id: String,
    pub reference_no: String,
    pub from_warehouse_id: String,
    pub to_warehouse_id: String,
    pub status: TransferStatus,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockTransferItem {
    pub id: String,
    pub transfer_id: String,
    pub product_id: String,
    pub quantity: i64,
}

// =============================================================================
// Sales
// =============================================================================

/// A sale and its workflow state.
///
/// `net_total_cents = total_amount_cents - discount_cents + tax_cents`,
/// computed once by [`crate::workflow::SaleTotals`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    /// Warehouse the goods leave from on completion.
    pub warehouse_id: String,
    pub status: SaleStatus,
    pub total_amount_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub net_total_cents: i64,
    pub sold_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn net_total(&self) -> Money {
        Money::from_cents(self.net_total_cents)
    }
}

/// A line item of a sale; price is frozen at sale time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Machines
// =============================================================================

/// An installed machine at a customer site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Machine {
    pub id: String,
    pub serial_number: String,
    pub product_id: String,
    pub sale_id: Option<String>,
    pub sale_item_id: Option<String>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub installed_on: NaiveDate,
    pub status: MachineStatus,
    pub created_at: DateTime<Utc>,
}

/// A filter cartridge installed in a machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MachineFilter {
    pub id: String,
    pub machine_id: String,
    pub filter_product_id: String,
    pub installed_on: NaiveDate,
    pub lifespan_days: i64,
    pub due_on: NaiveDate,
    pub replaced_on: Option<NaiveDate>,
    pub status: FilterStatus,
    pub created_at: DateTime<Utc>,
}

/// An active filter coming due, with what a technician needs to visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DueFilter {
    pub filter_id: String,
    pub machine_id: String,
    pub serial_number: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub filter_sku: String,
    pub filter_name: String,
    pub installed_on: NaiveDate,
    pub lifespan_days: i64,
    pub due_on: NaiveDate,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate() {
        let rate = TaxRate::from_bps(825);
        assert_eq!(rate.bps(), 825);
        assert!((rate.percentage() - 8.25).abs() < 0.001);
        assert_eq!(TaxRate::default(), TaxRate::zero());
    }

    #[test]
    fn test_product_kind_strings() {
        assert_eq!(ProductKind::Machine.to_string(), "machine");
        assert_eq!(ProductKind::Filter.as_str(), "filter");
        assert_eq!(ProductKind::Part.as_str(), "part");
    }

    #[test]
    fn test_stock_level_low() {
        let level = StockLevel {
            product_id: "p".into(),
            sku: "FLT-1".into(),
            product_name: "Sediment filter".into(),
            warehouse_id: "w".into(),
            warehouse_code: "MAIN".into(),
            warehouse_name: "Main".into(),
            quantity: 2,
            low_stock_threshold: 5,
        };
        assert!(level.is_low());
    }
}
