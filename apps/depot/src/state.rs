//! Shared application state.

use std::sync::Arc;

use depot_core::attendance::AttendanceClock;
use depot_db::Database;
use depot_notify::Notifier;

use crate::config::{AppConfig, ConfigError};
use crate::token::ScanTokens;

pub type SharedState = Arc<AppState>;

#[derive(Debug)]
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub clock: AttendanceClock,
    pub tokens: ScanTokens,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig, notifier: Notifier) -> Result<SharedState, ConfigError> {
        let clock = config.attendance.clock()?;
        let tokens = ScanTokens::new(&config.attendance.secret, clock.offset);
        Ok(Arc::new(AppState {
            db,
            config,
            clock,
            tokens,
            notifier,
        }))
    }
}
