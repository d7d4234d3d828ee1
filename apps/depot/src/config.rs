//! # Application Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     DEPOT_DATABASE_PATH=/var/lib/depot/depot.db                         │
//! │     DEPOT_TELEGRAM_BOT_TOKEN=123456:ABC                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     --config / DEPOT_CONFIG, else                                       │
//! │     ~/.config/depot/depot.toml (Linux)                                  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "depot.db"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [telegram]
//! enabled = true
//! bot_token = "123456:ABC-DEF"
//! chat_id = "-1001234567890"
//!
//! [attendance]
//! secret = "a long random string"
//! utc_offset = "+03:00"
//! shift_start = "09:00"
//! standard_minutes = 480
//!
//! [sales]
//! tax_rate_bps = 1600
//! ```

use std::path::PathBuf;

use chrono::{FixedOffset, NaiveTime};
use depot_core::attendance::{AttendanceClock, WorkPolicy};
use depot_core::TaxRate;
use depot_db::DbConfig;
use depot_notify::TelegramConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Used when no secret is configured; `load` warns about it.
pub const DEV_ATTENDANCE_SECRET: &str = "depot-dev-secret-change-in-production";

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("depot.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseSettings {
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.path).max_connections(self.max_connections)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Scan token secret, shop offset and the working-day policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceSettings {
    #[serde(default = "default_secret")]
    pub secret: String,

    /// `+03:00`, `-05:30`, `Z`
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    /// `HH:MM`, local time.
    #[serde(default = "default_shift_start")]
    pub shift_start: String,

    #[serde(default = "default_standard_minutes")]
    pub standard_minutes: i64,

    #[serde(default = "default_break_minutes")]
    pub break_minutes: i64,

    #[serde(default = "default_break_threshold_minutes")]
    pub break_threshold_minutes: i64,

    #[serde(default = "default_late_grace_minutes")]
    pub late_grace_minutes: i64,
}

fn default_secret() -> String {
    DEV_ATTENDANCE_SECRET.to_string()
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

fn default_shift_start() -> String {
    "09:00".to_string()
}

fn default_standard_minutes() -> i64 {
    WorkPolicy::default().standard_minutes
}

fn default_break_minutes() -> i64 {
    WorkPolicy::default().break_minutes
}

fn default_break_threshold_minutes() -> i64 {
    WorkPolicy::default().break_threshold_minutes
}

fn default_late_grace_minutes() -> i64 {
    WorkPolicy::default().late_grace_minutes
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        AttendanceSettings {
            secret: default_secret(),
            utc_offset: default_utc_offset(),
            shift_start: default_shift_start(),
            standard_minutes: default_standard_minutes(),
            break_minutes: default_break_minutes(),
            break_threshold_minutes: default_break_threshold_minutes(),
            late_grace_minutes: default_late_grace_minutes(),
        }
    }
}

impl AttendanceSettings {
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        parse_utc_offset(&self.utc_offset)
    }

    pub fn policy(&self) -> Result<WorkPolicy, ConfigError> {
        let shift_start = NaiveTime::parse_from_str(self.shift_start.trim(), "%H:%M").map_err(|_| {
            ConfigError::InvalidValue {
                key: "attendance.shift_start".to_string(),
                reason: format!("expected HH:MM, got '{}'", self.shift_start),
            }
        })?;
        Ok(WorkPolicy {
            shift_start,
            standard_minutes: self.standard_minutes,
            break_minutes: self.break_minutes,
            break_threshold_minutes: self.break_threshold_minutes,
            late_grace_minutes: self.late_grace_minutes,
        })
    }

    pub fn clock(&self) -> Result<AttendanceClock, ConfigError> {
        Ok(AttendanceClock::new(self.offset()?, self.policy()?))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesSettings {
    /// Basis points applied to `total - discount`; 1600 is 16%.
    #[serde(default)]
    pub tax_rate_bps: u32,
}

impl SalesSettings {
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

// =============================================================================
// App Config
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub attendance: AttendanceSettings,

    #[serde(default)]
    pub sales: SalesSettings,
}

impl AppConfig {
    /// Defaults, then the TOML file, then `DEPOT_*` variables, then validation.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        if config.attendance.secret == DEV_ATTENDANCE_SECRET {
            warn!("attendance.secret is the development default; set DEPOT_ATTENDANCE_SECRET");
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("database.path".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                key: "database.max_connections".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.attendance.secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("attendance.secret".to_string()));
        }
        if self.attendance.standard_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "attendance.standard_minutes".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.attendance.break_minutes < 0
            || self.attendance.break_threshold_minutes < 0
            || self.attendance.late_grace_minutes < 0
        {
            return Err(ConfigError::InvalidValue {
                key: "attendance".to_string(),
                reason: "minute settings cannot be negative".to_string(),
            });
        }
        self.attendance.clock()?;

        if self.sales.tax_rate_bps > 10_000 {
            return Err(ConfigError::InvalidValue {
                key: "sales.tax_rate_bps".to_string(),
                reason: "must be at most 10000".to_string(),
            });
        }

        self.telegram
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                key: "telegram".to_string(),
                reason: e.to_string(),
            })
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `DEPOT_*` values from `lookup`; unparseable numbers are logged and skipped.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("DEPOT_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(host) = lookup("DEPOT_HTTP_HOST") {
            self.server.host = host;
        }

        if let Some(port) = lookup("DEPOT_HTTP_PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!(port = %port, "Ignoring invalid DEPOT_HTTP_PORT"),
            }
        }

        if let Some(token) = lookup("DEPOT_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
            self.telegram.enabled = true;
        }

        if let Some(chat_id) = lookup("DEPOT_TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = chat_id;
        }

        if let Some(enabled) = lookup("DEPOT_TELEGRAM_ENABLED") {
            match enabled.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.telegram.enabled = true,
                "0" | "false" | "no" => self.telegram.enabled = false,
                _ => warn!(value = %enabled, "Ignoring invalid DEPOT_TELEGRAM_ENABLED"),
            }
        }

        if let Some(secret) = lookup("DEPOT_ATTENDANCE_SECRET") {
            self.attendance.secret = secret;
        }

        if let Some(offset) = lookup("DEPOT_UTC_OFFSET") {
            self.attendance.utc_offset = offset;
        }

        if let Some(bps) = lookup("DEPOT_TAX_RATE_BPS") {
            match bps.parse::<u32>() {
                Ok(v) => self.sales.tax_rate_bps = v,
                Err(_) => warn!(value = %bps, "Ignoring invalid DEPOT_TAX_RATE_BPS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("DEPOT_CONFIG") {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("com", "depot", "depot").map(|dirs| dirs.config_dir().join("depot.toml"))
    }
}

/// `+03:00`, `-0530`, `Z` or `UTC`.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: "attendance.utc_offset".to_string(),
        reason: format!("expected +HH:MM, got '{value}'"),
    };

    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.sales.tax_rate().bps(), 0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [attendance]
            utc_offset = "+03:00"

            [sales]
            tax_rate_bps = 1600
            "#,
        )
        .unwrap();

        assert_eq!(config.attendance.shift_start, "09:00");
        assert_eq!(config.attendance.offset().unwrap().local_minus_utc(), 3 * 3600);
        assert_eq!(config.sales.tax_rate_bps, 1600);
        assert_eq!(config.database.path, PathBuf::from("depot.db"));
        assert!(!config.telegram.enabled);
    }

    #[test]
    fn test_overrides_win() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DEPOT_DATABASE_PATH", "/tmp/other.db"),
            ("DEPOT_HTTP_PORT", "9000"),
            ("DEPOT_TELEGRAM_BOT_TOKEN", "123:abc"),
            ("DEPOT_TELEGRAM_CHAT_ID", "-100"),
            ("DEPOT_TAX_RATE_BPS", "not-a-number"),
        ]);

        let mut config = AppConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.server.port, 9000);
        assert!(config.telegram.enabled);
        assert_eq!(config.telegram.chat_id, "-100");
        assert_eq!(config.sales.tax_rate_bps, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enabled_telegram_needs_chat() {
        let mut config = AppConfig::default();
        config.telegram.enabled = true;
        config.telegram.bot_token = "123:abc".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+03:00").unwrap().local_minus_utc(), 10_800);
        assert_eq!(parse_utc_offset("-0530").unwrap().local_minus_utc(), -19_800);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("3").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
    }

    #[test]
    fn test_bad_shift_start_rejected() {
        let mut config = AppConfig::default();
        config.attendance.shift_start = "9am".into();
        assert!(config.validate().is_err());
    }
}
