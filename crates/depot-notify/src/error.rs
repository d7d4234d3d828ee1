//! # Notification Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Notification Error Categories                        │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │  Configuration  │  │   Transport     │  │     Bot API             │  │
//! │  │                 │  │                 │  │                         │  │
//! │  │  Disabled       │  │  Http           │  │  Api { status, .. }     │  │
//! │  │  InvalidConfig  │  │  Timeout        │  │    429 / 5xx: retried   │  │
//! │  │                 │  │    (retried)    │  │    other 4xx: final     │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for notification operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// Telegram is switched off in configuration.
    #[error("Telegram notifications are disabled")]
    Disabled,

    /// Enabled but missing a token or chat id.
    #[error("Invalid Telegram configuration: {0}")]
    InvalidConfig(String),

    /// Network failure before a response arrived.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The Bot API answered with an error.
    #[error("Telegram API error {status}: {description}")]
    Api { status: u16, description: String },

    /// No response within the configured timeout.
    #[error("Telegram request timed out after {0} seconds")]
    Timeout(u64),
}

impl NotifyError {
    /// Whether sending again may succeed.
    ///
    /// Rate limits (429) and server errors are transient; any other 4xx
    /// means the request itself is wrong.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Http(_) | NotifyError::Timeout(_) => true,
            NotifyError::Api { status, .. } => *status == 429 || *status >= 500,
            NotifyError::Disabled | NotifyError::InvalidConfig(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> NotifyError {
        NotifyError::Api {
            status,
            description: "x".into(),
        }
    }

    #[test]
    fn test_retryable_errors() {
        assert!(NotifyError::Http("connection reset".into()).is_retryable());
        assert!(NotifyError::Timeout(10).is_retryable());
        assert!(api(429).is_retryable());
        assert!(api(502).is_retryable());

        assert!(!api(400).is_retryable());
        assert!(!api(403).is_retryable());
        assert!(!NotifyError::Disabled.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = NotifyError::Api {
            status: 400,
            description: "Bad Request: chat not found".into(),
        };
        assert_eq!(err.to_string(), "Telegram API error 400: Bad Request: chat not found");
    }
}
