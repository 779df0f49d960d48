//! Telegram notifier — Bot API `sendMessage`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::Notifier;
use crate::error::DeliveryError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Sends digest messages to a Telegram chat through a bot.
pub struct TelegramNotifier {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    /// Send a single message chunk (≤4096 chars), Markdown-first with fallback.
    async fn send_chunk(&self, chat_id: &str, text: &str) -> Result<(), DeliveryError> {
        let markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(|e| send_failed(e.without_url().to_string()))?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        // Summaries often contain stray `_` or `*` that break Markdown parsing
        let plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| send_failed(e.without_url().to_string()))?;

        if !plain_resp.status().is_success() {
            let plain_status = plain_resp.status();
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                notifier: "telegram".into(),
                reason: format!(
                    "sendMessage failed (markdown: {markdown_status}, plain: {plain_status} {plain_err})"
                ),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    /// Splits long messages that exceed Telegram's 4096 char limit.
    async fn send(&self, channel: &str, message: &str) -> Result<(), DeliveryError> {
        if channel.trim().is_empty() {
            return Err(DeliveryError::InvalidChannel {
                notifier: "telegram".into(),
                channel: channel.to_string(),
                reason: "empty chat id".into(),
            });
        }

        for chunk in super::split_message(message, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_chunk(channel, &chunk).await?;
        }
        tracing::debug!(chat_id = channel, "Telegram message sent");
        Ok(())
    }
}

fn send_failed(reason: String) -> DeliveryError {
    DeliveryError::SendFailed {
        notifier: "telegram".into(),
        reason,
    }
}
