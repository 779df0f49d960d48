//! Slack notifier — Web API `chat.postMessage` with a bot token.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channels::Notifier;
use crate::error::DeliveryError;

const SLACK_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Slack's documented per-message text limit.
const SLACK_MAX_MESSAGE_LENGTH: usize = 40_000;

/// Slack answers HTTP 200 with `{"ok": false, "error": ...}` on failures.
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts digest messages to a Slack channel.
pub struct SlackNotifier {
    bot_token: SecretString,
    client: reqwest::Client,
    endpoint: String,
}

impl SlackNotifier {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
            endpoint: SLACK_POST_MESSAGE_URL.to_string(),
        }
    }

    /// Point at a different API endpoint (Slack-compatible relays, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, channel: &str, message: &str) -> Result<(), DeliveryError> {
        for chunk in super::split_message(message, SLACK_MAX_MESSAGE_LENGTH) {
            let body = serde_json::json!({
                "channel": channel,
                "text": chunk,
            });

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(self.bot_token.expose_secret())
                .json(&body)
                .send()
                .await
                .map_err(|e| DeliveryError::SendFailed {
                    notifier: "slack".into(),
                    reason: e.to_string(),
                })?;

            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(DeliveryError::SendFailed {
                    notifier: "slack".into(),
                    reason: format!("HTTP {status}: {text}"),
                });
            }
            check_slack_response(&text)?;
        }

        tracing::debug!(channel, "Slack message posted");
        Ok(())
    }
}

/// Interpret a `chat.postMessage` response body.
fn check_slack_response(body: &str) -> Result<(), DeliveryError> {
    let parsed: SlackResponse =
        serde_json::from_str(body).map_err(|e| DeliveryError::Rejected {
            notifier: "slack".into(),
            reason: format!("unreadable response: {e}"),
        })?;

    if parsed.ok {
        Ok(())
    } else {
        Err(DeliveryError::Rejected {
            notifier: "slack".into(),
            reason: parsed.error.unwrap_or_else(|| "unknown_error".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slack_notifier_name() {
        let n = SlackNotifier::new(SecretString::from("xoxb-test"));
        assert_eq!(n.name(), "slack");
        assert_eq!(n.endpoint, SLACK_POST_MESSAGE_URL);
    }

    #[test]
    fn slack_ok_response() {
        assert!(check_slack_response(r#"{"ok": true, "channel": "C1", "ts": "1.2"}"#).is_ok());
    }

    #[test]
    fn slack_error_response() {
        let err = check_slack_response(r#"{"ok": false, "error": "channel_not_found"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("channel_not_found"));
    }

    #[test]
    fn slack_error_without_reason() {
        let err = check_slack_response(r#"{"ok": false}"#).unwrap_err();
        assert!(err.to_string().contains("unknown_error"));
    }

    #[test]
    fn slack_garbage_response() {
        let err = check_slack_response("<html>502</html>").unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected { .. }));
    }

    #[tokio::test]
    async fn slack_unreachable_endpoint_is_send_failure() {
        let n = SlackNotifier::new(SecretString::from("xoxb-test"))
            .with_endpoint("http://127.0.0.1:9/api/chat.postMessage");
        let err = n.send("#test", "hello").await.unwrap_err();
        assert!(matches!(err, DeliveryError::SendFailed { .. }));
    }
}
