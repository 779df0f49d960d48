//! Configuration types.
//!
//! Everything is read from the environment once at process start and
//! handed to the collaborators and the orchestrator by value.

use std::path::PathBuf;
use std::str::FromStr;

use crate::channels::{NotifierConfig, NotifierKind};
use crate::error::ConfigError;
use crate::llm::LlmConfig;
use crate::pipeline::budget::DEFAULT_TOKEN_BUDGET;
use crate::pipeline::types::FatalPolicy;
use crate::sources::ImapConfig;

/// Default newsletter sender.
pub const DEFAULT_SOURCE_SENDER: &str = "dan@tldrnewsletter.com";

/// Default delivery channel.
pub const DEFAULT_CHANNEL: &str = "#test";

pub const DEFAULT_LEAD_IN: &str =
    "Hey! It's T.I.D.A.L giving you your daily updates in tech! (Loading Content...)";

pub const DEFAULT_NOTHING_FOUND: &str = "Whoops! I've got nothing for you right now. \
Either I was unable to extract any content today or this was a hiccup! Sorry";

pub const DEFAULT_FAILURE_NOTICE: &str =
    "Uh oh! Today's digest failed before I could summarize anything. I'll try again next time.";

/// Settings the orchestrator consumes for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sender address whose newsletters are scanned for links.
    pub source_id: String,
    /// Channel identifier passed to the notifier.
    pub channel: String,
    /// Maximum estimated tokens handed to the summarizer.
    pub token_budget: f64,
    /// Parallel article fetches; 1 keeps fetching strictly sequential.
    pub fetch_concurrency: usize,
    pub lead_in: String,
    pub nothing_found: String,
    pub failure_notice: String,
    /// Whether a fatal stage failure sends `failure_notice`.
    pub on_fatal: FatalPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_id: DEFAULT_SOURCE_SENDER.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            token_budget: DEFAULT_TOKEN_BUDGET,
            fetch_concurrency: 1,
            lead_in: DEFAULT_LEAD_IN.to_string(),
            nothing_found: DEFAULT_NOTHING_FOUND.to_string(),
            failure_notice: DEFAULT_FAILURE_NOTICE.to_string(),
            on_fatal: FatalPolicy::Silent,
        }
    }
}

impl PipelineConfig {
    /// Overlay `DIGEST_*` environment variables on the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let fetch_concurrency: usize =
            parse_env("DIGEST_FETCH_CONCURRENCY")?.unwrap_or(defaults.fetch_concurrency);
        if fetch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DIGEST_FETCH_CONCURRENCY".into(),
                message: "must be at least 1".into(),
            });
        }

        let token_budget: f64 =
            parse_env("DIGEST_TOKEN_BUDGET")?.unwrap_or(defaults.token_budget);
        if !token_budget.is_finite() || token_budget <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "DIGEST_TOKEN_BUDGET".into(),
                message: format!("must be a positive finite number, got {token_budget}"),
            });
        }

        Ok(Self {
            source_id: env_or("DIGEST_SOURCE_SENDER", defaults.source_id),
            channel: env_or("DIGEST_CHANNEL", defaults.channel),
            token_budget,
            fetch_concurrency,
            lead_in: env_or("DIGEST_LEAD_IN", defaults.lead_in),
            nothing_found: env_or("DIGEST_NOTHING_FOUND", defaults.nothing_found),
            failure_notice: env_or("DIGEST_FAILURE_NOTICE", defaults.failure_notice),
            on_fatal: parse_env("DIGEST_ON_FATAL")?.unwrap_or(defaults.on_fatal),
        })
    }
}

/// Process-wide configuration snapshot.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub pipeline: PipelineConfig,
    pub imap: ImapConfig,
    pub llm: LlmConfig,
    pub notifier: NotifierConfig,
    /// Cron expression; `None` runs once and exits.
    pub schedule: Option<String>,
    /// Directory for a daily-rolling log file.
    pub log_dir: Option<PathBuf>,
}

impl DigestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let kind: NotifierKind =
            parse_env("DIGEST_NOTIFIER")?.unwrap_or(NotifierKind::Slack);

        Ok(Self {
            pipeline: PipelineConfig::from_env()?,
            imap: ImapConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            notifier: NotifierConfig::from_env(kind)?,
            schedule: non_empty_env("DIGEST_SCHEDULE"),
            log_dir: non_empty_env("DIGEST_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    non_empty_env(key).unwrap_or(default)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an optional environment variable, reporting bad values.
fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}
