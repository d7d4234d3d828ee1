//! # depot-db: Database Layer for Depot
//!
//! SQLite storage for warehouses, stock, sales, machines and attendance,
//! with sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Depot Data Flow                                │
//! │                                                                         │
//! │  HTTP handler / CLI command (apps/depot)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     depot-db (THIS CRATE)                       │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │    │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │    │    │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │    │    │
//! │  │   │               │    │ StockRepo     │    │              │    │    │
//! │  │   │ SqlitePool    │◄───│ SaleRepo      │    │ 001_initial  │    │    │
//! │  │   │ WAL, FK on    │    │ MachineRepo   │    │ _schema.sql  │    │    │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘    │    │
//! │  │                               │                                 │    │
//! │  │                               ▼                                 │    │
//! │  │                 depot-core rules (workflow, ledger, machine)    │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     SQLite Database (depot.db)                  │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations and workflows
//!
//! ## Usage
//!
//! ```rust,ignore
//! use depot_db::{Database, DbConfig};
//! use depot_core::SaleStatus;
//!
//! let db = Database::new(DbConfig::new("depot.db")).await?;
//!
//! let done = db.sales().transition(&sale_id, SaleStatus::Completed, Some(&user_id)).await?;
//! println!("{} machines provisioned", done.machines.len());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::attendance::{AttendanceOutcome, AttendanceRepository};
pub use repository::machine::{BackfillReport, FilterReplacement, FilterState, MachineDetail, MachineRepository};
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::sale::{NewSale, NewSaleItem, SaleDetail, SaleFilter, SaleRepository, SaleTransition};
pub use repository::stock::{MovementFilter, StockRepository};
pub use repository::stock_in::{NewStockIn, NewStockInItem, StockInDetail, StockInRepository};
pub use repository::stock_out::{NewStockOut, NewStockOutItem, StockOutDetail, StockOutRepository};
pub use repository::transfer::{NewTransfer, NewTransferItem, TransferDetail, TransferRepository};
pub use repository::user::{Promotion, UserRepository};
pub use repository::warehouse::WarehouseRepository;
