//! Error types for the digest pipeline.

use std::time::Duration;

use crate::pipeline::types::RunStage;

/// Top-level error type for the binary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run failed: {0}")]
    Run(#[from] RunError),

    #[error("Schedule error: {0}")]
    Schedule(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build {component}: {reason}")]
    Build { component: String, reason: String },
}

/// The mail source could not produce a link listing.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Mail source {host} unavailable: {reason}")]
    Unavailable { host: String, reason: String },

    #[error("Mail source login failed for {username}")]
    LoginFailed { username: String },

    #[error("Mail source protocol error: {0}")]
    Protocol(String),
}

/// A single article could not be fetched or extracted.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("No readable content at {url}")]
    NoContent { url: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} returned an empty response")]
    EmptyResponse { provider: String },
}

/// The summarization provider failed for the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum SummarizationError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} failed for all {count} articles")]
    AllFailed { provider: String, count: usize },
}

/// A single message could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Failed to send on {notifier}: {reason}")]
    SendFailed { notifier: String, reason: String },

    #[error("{notifier} rejected the message: {reason}")]
    Rejected { notifier: String, reason: String },

    #[error("Invalid {notifier} channel {channel}: {reason}")]
    InvalidChannel {
        notifier: String,
        channel: String,
        reason: String,
    },
}

/// Why a run aborted.
#[derive(Debug, thiserror::Error)]
pub enum RunFailure {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Summarization(#[from] SummarizationError),
}

/// A fatal error together with the stage that raised it.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage aborted the run: {failure}")]
pub struct RunError {
    pub stage: RunStage,
    #[source]
    pub failure: RunFailure,
}

impl RunError {
    pub fn new(stage: RunStage, failure: impl Into<RunFailure>) -> Self {
        Self {
            stage,
            failure: failure.into(),
        }
    }
}

/// Result type alias for the digest binary.
pub type Result<T> = std::result::Result<T, Error>;
