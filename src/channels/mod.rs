//! Notification channels for digest delivery.
//!
//! One `Notifier` contract with a variant per transport; the variant is
//! picked from configuration so the orchestrator never branches on it.

pub mod slack;
pub mod sms;
pub mod telegram;

pub use slack::SlackNotifier;
pub use sms::{SmsNotifier, SmtpConfig};
pub use telegram::TelegramNotifier;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::{ConfigError, DeliveryError};

/// Delivers one text message to a channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifier name for logs ("slack", "telegram", "sms").
    fn name(&self) -> &str;

    /// Send `message` to `channel` (Slack channel, Telegram chat id, or
    /// SMS gateway address).
    async fn send(&self, channel: &str, message: &str) -> Result<(), DeliveryError>;
}

/// Which transport delivers the digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    Slack,
    Telegram,
    Sms,
}

impl std::str::FromStr for NotifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "slack" => Ok(Self::Slack),
            "telegram" => Ok(Self::Telegram),
            "sms" => Ok(Self::Sms),
            other => Err(format!("expected slack, telegram or sms, got '{other}'")),
        }
    }
}

/// Resolved credentials for the selected notifier.
#[derive(Debug, Clone)]
pub enum NotifierConfig {
    Slack { bot_token: SecretString },
    Telegram { bot_token: SecretString },
    Sms(SmtpConfig),
}

impl NotifierConfig {
    /// Read the credentials `kind` needs from the environment.
    pub fn from_env(kind: NotifierKind) -> Result<Self, ConfigError> {
        let require = |key: &str| {
            std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
        };

        Ok(match kind {
            NotifierKind::Slack => Self::Slack {
                bot_token: SecretString::from(require("SLACK_BOT_OAUTH")?),
            },
            NotifierKind::Telegram => Self::Telegram {
                bot_token: SecretString::from(require("TELEGRAM_BOT_API")?),
            },
            NotifierKind::Sms => Self::Sms(SmtpConfig::from_env()?),
        })
    }

    pub fn kind(&self) -> NotifierKind {
        match self {
            Self::Slack { .. } => NotifierKind::Slack,
            Self::Telegram { .. } => NotifierKind::Telegram,
            Self::Sms(_) => NotifierKind::Sms,
        }
    }
}

/// Build the notifier for a resolved configuration.
pub fn create_notifier(config: &NotifierConfig) -> Arc<dyn Notifier> {
    match config {
        NotifierConfig::Slack { bot_token } => Arc::new(SlackNotifier::new(bot_token.clone())),
        NotifierConfig::Telegram { bot_token } => {
            Arc::new(TelegramNotifier::new(bot_token.clone()))
        }
        NotifierConfig::Sms(smtp) => Arc::new(SmsNotifier::new(smtp.clone())),
    }
}

/// Split a message into chunks that fit `max_len` characters.
/// Tries to split on newlines, then spaces, then hard-cuts.
pub(crate) fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.chars().count() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        // Byte offset of the first char past the limit
        let limit = remaining
            .char_indices()
            .nth(max_len)
            .map_or(remaining.len(), |(i, _)| i);
        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
