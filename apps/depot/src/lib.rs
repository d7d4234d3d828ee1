//! # Depot
//!
//! HTTP server and console commands over the depot crates.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              depot                                      │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐ │
//! │  │  services      │  │  cli           │  │  alerts                    │ │
//! │  │                │  │                │  │                            │ │
//! │  │ • attendance   │  │ • serve        │  │ • low stock after          │ │
//! │  │ • sales        │  │ • migrate      │  │   dispatch / sale / etc.   │ │
//! │  │ • stock        │  │ • stock, users │  │ • sale status changes      │ │
//! │  │ • machines     │  │ • machines     │  │ • filters due              │ │
//! │  │ • exports      │  │ • export       │  │                            │ │
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘ │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │  state (Arc)  ─  Database │ AppConfig │ AttendanceClock          │   │
//! │  │                  ScanTokens │ Notifier                           │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! `depot.toml` (see [`config`]) with environment overrides:
//! - `DEPOT_CONFIG` - config file path
//! - `DEPOT_DATABASE_PATH` - SQLite file
//! - `DEPOT_HTTP_HOST`, `DEPOT_HTTP_PORT` - listen address (default 0.0.0.0:8080)
//! - `DEPOT_TELEGRAM_BOT_TOKEN`, `DEPOT_TELEGRAM_CHAT_ID`, `DEPOT_TELEGRAM_ENABLED`
//! - `DEPOT_ATTENDANCE_SECRET` - scan token key
//! - `DEPOT_UTC_OFFSET` - shop offset, e.g. `+03:00`
//! - `DEPOT_TAX_RATE_BPS` - sales tax in basis points

pub mod alerts;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod services;
pub mod state;
pub mod token;

// Re-exports
pub use cli::Cli;
pub use config::{AppConfig, ConfigError};
pub use error::{ApiError, ApiResult};
pub use state::{AppState, SharedState};
