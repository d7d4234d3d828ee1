//! # Notifier
//!
//! What the application holds: a Telegram client when enabled, or nothing,
//! in which case messages are logged instead of sent.

use tracing::{info, warn};

use crate::client::TelegramClient;
use crate::config::TelegramConfig;
use crate::error::NotifyResult;

#[derive(Debug, Clone)]
pub struct Notifier {
    client: Option<TelegramClient>,
}

impl Notifier {
    /// Builds a notifier; a disabled config yields one that only logs.
    pub fn from_config(config: &TelegramConfig) -> NotifyResult<Self> {
        if !config.enabled {
            info!("Telegram notifications disabled");
            return Ok(Notifier::disabled());
        }
        config.validate()?;
        Ok(Notifier {
            client: Some(TelegramClient::new(config.clone())?),
        })
    }

    pub fn disabled() -> Self {
        Notifier { client: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Sends `text`, or logs it when disabled.
    pub async fn send(&self, text: &str) -> NotifyResult<()> {
        match &self.client {
            Some(client) => client.send_message(text).await,
            None => {
                info!(message = %text, "Telegram disabled, notification not sent");
                Ok(())
            }
        }
    }

    /// Sends in the background; failures are logged, never returned.
    pub fn spawn_send(&self, text: String) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.send(&text).await {
                warn!(error = %err, "Background notification failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;

    #[tokio::test]
    async fn test_disabled_notifier_logs_only() {
        let notifier = Notifier::from_config(&TelegramConfig::default()).unwrap();
        assert!(!notifier.is_enabled());
        assert!(notifier.send("hello").await.is_ok());
    }

    #[test]
    fn test_enabled_without_token_rejected() {
        let config = TelegramConfig {
            enabled: true,
            ..TelegramConfig::default()
        };
        assert!(matches!(Notifier::from_config(&config), Err(NotifyError::InvalidConfig(_))));
    }
}
