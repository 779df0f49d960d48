//! Shared types for the digest pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Run stages ──────────────────────────────────────────────────────

/// The stages of one run, in execution order. No stage runs twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    FetchLinks,
    FetchContent,
    Trim,
    Summarize,
    Notify,
    Done,
}

impl RunStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FetchLinks => "fetch_links",
            Self::FetchContent => "fetch_content",
            Self::Trim => "trim",
            Self::Summarize => "summarize",
            Self::Notify => "notify",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Fatal policy ────────────────────────────────────────────────────

/// What the user sees when a whole stage fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalPolicy {
    /// Abort without sending anything.
    #[default]
    Silent,
    /// Send one failure notice, then abort.
    Notify,
}

impl std::str::FromStr for FatalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "notify" => Ok(Self::Notify),
            other => Err(format!("expected 'silent' or 'notify', got '{other}'")),
        }
    }
}

// ── Per-item failures ───────────────────────────────────────────────

/// An article link that was skipped because fetching it failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchFailure {
    pub url: String,
    pub reason: String,
}

/// A message that could not be delivered.
///
/// `index` is the position in the send order: 0 is the lead-in (or the
/// nothing-found notice), 1.. are the summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub index: usize,
    pub reason: String,
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Which notify branch a run took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DigestOutcome {
    NothingFound,
    Delivered { summaries: usize },
}

/// Record of one completed run. Logged, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub links_found: usize,
    pub articles_fetched: usize,
    pub fetch_failures: Vec<FetchFailure>,
    pub articles_kept: usize,
    pub articles_dropped: usize,
    pub tokens_kept: f64,
    pub summaries: usize,
    pub messages_sent: usize,
    pub delivery_failures: Vec<DeliveryFailure>,
    pub outcome: Option<DigestOutcome>,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            links_found: 0,
            articles_fetched: 0,
            fetch_failures: Vec::new(),
            articles_kept: 0,
            articles_dropped: 0,
            tokens_kept: 0.0,
            summaries: 0,
            messages_sent: 0,
            delivery_failures: Vec::new(),
            outcome: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_labels() {
        assert_eq!(RunStage::FetchLinks.to_string(), "fetch_links");
        assert_eq!(RunStage::Summarize.to_string(), "summarize");
    }

    #[test]
    fn fatal_policy_parse() {
        assert_eq!("silent".parse::<FatalPolicy>(), Ok(FatalPolicy::Silent));
        assert_eq!(" Notify ".parse::<FatalPolicy>(), Ok(FatalPolicy::Notify));
        assert!("loud".parse::<FatalPolicy>().is_err());
        assert_eq!(FatalPolicy::default(), FatalPolicy::Silent);
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_string(&DigestOutcome::Delivered { summaries: 3 }).unwrap();
        assert!(json.contains("\"outcome\":\"delivered\""));
        assert!(json.contains("\"summaries\":3"));
    }

    #[test]
    fn new_report_is_empty() {
        let report = RunReport::new(Uuid::new_v4());
        assert!(report.finished_at.is_none());
        assert!(report.outcome.is_none());
        assert!(report.fetch_failures.is_empty());
    }
}
