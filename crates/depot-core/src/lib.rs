//! # depot-core: Pure Business Logic for Depot
//!
//! Every rule of the inventory, sales, machine and attendance workflows,
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Depot Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │              apps/depot (axum HTTP + clap CLI)                  │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │        depot-db (transactions)  /  notify  /  report            │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │ calls                                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │               ★ depot-core (THIS CRATE) ★                       │    │
//! │  │                                                                 │    │
//! │  │   money      workflow     ledger      machine     attendance    │    │
//! │  │   Money      SaleStatus   apply_delta FilterUsage WorkPolicy    │    │
//! │  │   TaxRate    SaleTotals   merge_lines provision   compute_work  │    │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Sale, Machine, Attendance, ...)
//! - [`money`] - Integer money
//! - [`workflow`] - Status state machines and sale totals
//! - [`ledger`] - Stock balance math
//! - [`machine`] - Serial numbers, filter usage, provisioning plan
//! - [`attendance`] - Work hours, overtime, lateness
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example
//!
//! ```rust
//! use depot_core::money::Money;
//! use depot_core::types::TaxRate;
//! use depot_core::workflow::{PricedLine, SaleTotals};
//!
//! let lines = vec![PricedLine {
//!     product_id: "ro-500".into(),
//!     quantity: 1,
//!     unit_price: Money::from_cents(45_000),
//! }];
//! let totals = SaleTotals::compute(&lines, Money::from_cents(5_000), TaxRate::from_bps(1000)).unwrap();
//! assert_eq!(totals.net_total.cents(), 44_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod attendance;
pub mod error;
pub mod ledger;
pub mod machine;
pub mod money;
pub mod types;
pub mod validation;
pub mod workflow;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::MovementType;
pub use machine::{FilterStatus, MachineStatus};
pub use money::Money;
pub use types::*;
pub use workflow::{SaleStatus, StockInStatus, StockOutStatus, TransferStatus, Workflow};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on one stock document or sale.
pub const MAX_DOCUMENT_LINES: usize = 200;

/// Maximum quantity on one document line.
///
/// Catches typos like 10000 for 100 before they reach the ledger.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

/// Largest unit price, cost or discount in cents ($10,000,000.00).
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

/// Longest period one export may cover.
pub const MAX_EXPORT_DAYS: i64 = 366;
