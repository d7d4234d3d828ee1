//! # depot-report: Spreadsheet Exports for Depot
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  builders  ─ sales / stock / movements / attendance → Report         │
//! │  model     ─ Report, Cell, ExportKind                                │
//! │  xlsx      ─ Report → .xlsx bytes or file                            │
//! │  error     ─ ReportError, ReportResult                               │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let report = depot_report::sales_report(&sales, from, to);
//! let bytes = depot_report::write_xlsx(&report)?;
//! ```

pub mod builders;
pub mod error;
pub mod model;
pub mod xlsx;

pub use builders::{attendance_report, movement_report, sales_report, stock_report};
pub use error::{ReportError, ReportResult};
pub use model::{period_label, Cell, ExportKind, Report};
pub use xlsx::{save_xlsx, write_xlsx};
