//! SMS notifier: email-to-SMS gateway over SMTP via lettre.
//!
//! The channel is the carrier gateway address for the phone, for example
//! `5551234567@vtext.com`. Each segment goes out as its own email.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::channels::Notifier;
use crate::error::{ConfigError, DeliveryError};

/// Characters per SMS segment.
const SMS_SEGMENT_LENGTH: usize = 160;

/// SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl SmtpConfig {
    /// Build config from `EMAIL_SMTP_HOST`, `EMAIL_SMTP_PORT`,
    /// `EMAIL_USERNAME`, `EMAIL_PASSWORD` and `EMAIL_FROM`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let require = |key: &str| {
            std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
        };

        let host = require("EMAIL_SMTP_HOST")?;
        let port = match std::env::var("EMAIL_SMTP_PORT") {
            Ok(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "EMAIL_SMTP_PORT".into(),
                message: format!("{e}"),
            })?,
            Err(_) => 587,
        };
        let username = require("EMAIL_USERNAME")?;
        let password = SecretString::from(require("EMAIL_PASSWORD")?);
        let from_address = std::env::var("EMAIL_FROM").unwrap_or_else(|_| username.clone());

        Ok(Self {
            host,
            port,
            username,
            password,
            from_address,
        })
    }
}

/// Sends digest messages as SMS through an email gateway.
pub struct SmsNotifier {
    config: SmtpConfig,
}

impl SmsNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    fn name(&self) -> &str {
        "sms"
    }

    async fn send(&self, channel: &str, message: &str) -> Result<(), DeliveryError> {
        let config = self.config.clone();
        let to = channel.to_string();
        let segments = split_segments(message, SMS_SEGMENT_LENGTH);

        tokio::task::spawn_blocking(move || send_segments(&config, &to, &segments))
            .await
            .map_err(|e| DeliveryError::SendFailed {
                notifier: "sms".into(),
                reason: format!("SMTP task panicked: {e}"),
            })?
    }
}

/// Send each segment as a subject-less email (blocking).
fn send_segments(config: &SmtpConfig, to: &str, segments: &[String]) -> Result<(), DeliveryError> {
    let to_mailbox: Mailbox = to.parse().map_err(|e| DeliveryError::InvalidChannel {
        notifier: "sms".into(),
        channel: to.to_string(),
        reason: format!("{e}"),
    })?;
    let from_mailbox: Mailbox = config
        .from_address
        .parse()
        .map_err(|e| send_failed(format!("Invalid from address: {e}")))?;

    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );
    let transport = SmtpTransport::starttls_relay(&config.host)
        .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
        .port(config.port)
        .credentials(creds)
        .build();

    for segment in segments {
        let email = Message::builder()
            .from(from_mailbox.clone())
            .to(to_mailbox.clone())
            .body(segment.clone())
            .map_err(|e| send_failed(format!("Failed to build email: {e}")))?;

        transport
            .send(&email)
            .map_err(|e| send_failed(format!("SMTP send failed: {e}")))?;
    }

    tracing::info!(to, segments = segments.len(), "SMS sent via gateway");
    Ok(())
}

fn send_failed(reason: String) -> DeliveryError {
    DeliveryError::SendFailed {
        notifier: "sms".into(),
        reason,
    }
}

/// Split a message into SMS-sized segments on word boundaries.
fn split_segments(message: &str, max_len: usize) -> Vec<String> {
    super::split_message(message.trim(), max_len)
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.test.com".into(),
            port: 587,
            username: "user@test.com".into(),
            password: SecretString::from("pass"),
            from_address: "user@test.com".into(),
        }
    }

    #[test]
    fn sms_notifier_name() {
        assert_eq!(SmsNotifier::new(config()).name(), "sms");
    }

    #[test]
    fn short_message_single_segment() {
        assert_eq!(split_segments("  Hello  ", SMS_SEGMENT_LENGTH), vec!["Hello"]);
    }

    #[test]
    fn long_message_segments_fit() {
        let message = "The quick brown fox jumps over the lazy dog. ".repeat(10);
        let segments = split_segments(&message, SMS_SEGMENT_LENGTH);
        assert!(segments.len() > 1);
        for segment in &segments {
            assert!(segment.chars().count() <= SMS_SEGMENT_LENGTH);
        }
    }

    #[test]
    fn invalid_gateway_address_rejected() {
        let err = send_segments(&config(), "not an address", &["hi".to_string()]).unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidChannel { .. }));
    }
}
