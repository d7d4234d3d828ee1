//! # Telegram Configuration
//!
//! The `[telegram]` section of `depot.toml`.
//!
//! ```toml
//! [telegram]
//! enabled = true
//! bot_token = "123456:ABC-DEF"
//! chat_id = "-1001234567890"
//! timeout_secs = 10
//! max_retries = 3
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{NotifyError, NotifyResult};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub bot_token: String,

    /// Numeric chat id or `@channel` name.
    #[serde(default)]
    pub chat_id: String,

    /// Overridable for tests and self-hosted Bot API servers.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt; 0 sends once.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

impl Default for TelegramConfig {
    fn default() -> Self {
        TelegramConfig {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl TelegramConfig {
    /// Checks an enabled config has what a send needs.
    pub fn validate(&self) -> NotifyResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.bot_token.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("bot_token is required".to_string()));
        }
        if self.chat_id.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("chat_id is required".to_string()));
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(NotifyError::InvalidConfig(format!(
                "api_base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }
        if self.timeout_secs == 0 {
            return Err(NotifyError::InvalidConfig("timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// `{api_base}/bot{token}/sendMessage`
    pub fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.bot_token.trim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_is_valid() {
        assert!(TelegramConfig::default().validate().is_ok());
    }

    #[test]
    fn test_enabled_requires_token_and_chat() {
        let mut config = TelegramConfig {
            enabled: true,
            ..TelegramConfig::default()
        };
        assert!(config.validate().is_err());

        config.bot_token = "123:abc".into();
        assert!(config.validate().is_err());

        config.chat_id = "-100".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: TelegramConfig = from_json(r#"{"enabled": true, "bot_token": "t", "chat_id": "1"}"#);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.max_retries, 3);
        assert_eq!(
            config.send_message_url(),
            "https://api.telegram.org/bott/sendMessage"
        );
    }

    fn from_json(json: &str) -> TelegramConfig {
        serde_json::from_str(json).unwrap()
    }
}
