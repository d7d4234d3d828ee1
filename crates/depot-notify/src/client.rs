//! # Telegram Bot API Client
//!
//! ## Send Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  send_message(text)                                                     │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  POST /bot<token>/sendMessage ──► 200 {ok: true} ──────────► Ok         │
//! │     │                                                                   │
//! │     ├── network error / timeout / 429 / 5xx                             │
//! │     │        └── attempts left? sleep(backoff) and POST again           │
//! │     │                           else ──────────────────────► Err        │
//! │     └── other 4xx ─────────────────────────────────────────► Err        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::TelegramConfig;
use crate::error::{NotifyError, NotifyResult};

/// Body of a `sendMessage` call.
#[derive(Debug, Clone, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// The part of a Bot API reply we read.
#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> NotifyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        Ok(TelegramClient { http, config })
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    /// Sends an HTML-formatted message, retrying transient failures.
    pub async fn send_message(&self, text: &str) -> NotifyResult<()> {
        let mut backoff = self.create_backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match self.attempt(text).await {
                Ok(()) => {
                    debug!(attempt, chars = text.chars().count(), "Telegram message sent");
                    return Ok(());
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempt > self.config.max_retries {
                warn!(attempt, error = %err, "Telegram send failed");
                return Err(err);
            }

            match backoff.next_backoff() {
                Some(delay) => {
                    debug!(attempt, ?delay, error = %err, "Retrying Telegram send");
                    tokio::time::sleep(delay).await;
                }
                None => return Err(err),
            }
        }
    }

    async fn attempt(&self, text: &str) -> NotifyResult<()> {
        let body = SendMessage {
            chat_id: &self.config.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .http
            .post(self.config.send_message_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let reply = response.json::<ApiReply>().await.ok();

        match reply {
            Some(ApiReply { ok: true, .. }) if status.is_success() => Ok(()),
            reply => Err(NotifyError::Api {
                status: status.as_u16(),
                description: reply
                    .and_then(|r| r.description)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string()),
            }),
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> NotifyError {
        if err.is_timeout() {
            NotifyError::Timeout(self.config.timeout_secs)
        } else {
            // without_url keeps the bot token out of logs
            NotifyError::Http(err.without_url().to_string())
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(self.config.initial_backoff_ms),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
