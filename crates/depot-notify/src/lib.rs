//! # depot-notify: Telegram Notifications for Depot
//!
//! Low-stock alerts, sale status changes, provisioned machines and filter
//! reminders, delivered to a Telegram chat.
//!
//! ## Module Organization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  message   ─ HTML text from depot-core records (escaped)                │
//! │  client    ─ TelegramClient: POST sendMessage, bounded backoff retry    │
//! │  notifier  ─ Notifier: client or log-only, spawn_send for handlers      │
//! │  config    ─ TelegramConfig ([telegram] in depot.toml)                  │
//! │  error     ─ NotifyError, NotifyResult                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use depot_notify::{message, Notifier, TelegramConfig};
//!
//! let notifier = Notifier::from_config(&config.telegram)?;
//! notifier.spawn_send(message::low_stock(&levels));
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod notifier;

pub use client::TelegramClient;
pub use config::TelegramConfig;
pub use error::{NotifyError, NotifyResult};
pub use notifier::Notifier;
