//! Digest orchestrator. Drives one run through every stage.
//!
//! Stage order is fixed: links → content → trim → summarize → notify.
//! Per-item failures (one article, one message) are recorded and skipped;
//! a failed link listing or summarization aborts the run.

use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, stream};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::articles::ArticleFetcher;
use crate::channels::Notifier;
use crate::config::PipelineConfig;
use crate::error::{RunError, RunFailure};
use crate::llm::Summarizer;
use crate::pipeline::budget::{estimate_tokens, trim_to_budget};
use crate::pipeline::types::{
    DeliveryFailure, DigestOutcome, FatalPolicy, FetchFailure, RunReport, RunStage,
};
use crate::sources::LinkSource;

/// The collaborators one orchestrator talks to.
pub struct PipelineDeps {
    pub links: Arc<dyn LinkSource>,
    pub fetcher: Arc<dyn ArticleFetcher>,
    pub summarizer: Arc<dyn Summarizer>,
    pub notifier: Arc<dyn Notifier>,
}

/// Runs the digest pipeline. Holds no state between runs.
pub struct Orchestrator {
    config: PipelineConfig,
    deps: PipelineDeps,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, deps: PipelineDeps) -> Self {
        Self { config, deps }
    }

    /// Execute one run.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("digest_run", %run_id);
        self.run_stages(run_id).instrument(span).await
    }

    async fn run_stages(&self, run_id: Uuid) -> Result<RunReport, RunError> {
        let mut report = RunReport::new(run_id);
        info!(
            source = %self.config.source_id,
            notifier = self.deps.notifier.name(),
            budget = self.config.token_budget,
            "Starting digest run"
        );

        // FETCH_LINKS
        enter(RunStage::FetchLinks);
        let links = match self.deps.links.links(&self.config.source_id).await {
            Ok(links) => links,
            Err(e) => return Err(self.abort(RunStage::FetchLinks, e.into()).await),
        };
        report.links_found = links.len();

        // FETCH_CONTENT
        enter(RunStage::FetchContent);
        let (articles, failures) = self.fetch_articles(links).await;
        report.articles_fetched = articles.len();
        report.fetch_failures = failures;
        if !report.fetch_failures.is_empty() {
            warn!(
                skipped = report.fetch_failures.len(),
                fetched = report.articles_fetched,
                "Some articles could not be fetched"
            );
        }

        // TRIM
        enter(RunStage::Trim);
        let fetched = articles.len();
        let batch = trim_to_budget(articles, self.config.token_budget);
        report.articles_kept = batch.len();
        report.articles_dropped = fetched - batch.len();
        report.tokens_kept = batch.iter().map(|a| estimate_tokens(a)).sum();
        if report.articles_dropped > 0 {
            info!(
                kept = report.articles_kept,
                dropped = report.articles_dropped,
                "Trimmed articles to fit token budget"
            );
        }

        // SUMMARIZE
        enter(RunStage::Summarize);
        let summaries = match self.deps.summarizer.summarize(&batch).await {
            Ok(summaries) => summaries,
            Err(e) => return Err(self.abort(RunStage::Summarize, e.into()).await),
        };
        report.summaries = summaries.len();

        // NOTIFY
        enter(RunStage::Notify);
        let outcome = self.deliver(&summaries, &mut report).await;
        report.outcome = Some(outcome);

        enter(RunStage::Done);
        report.finished_at = Some(Utc::now());
        info!(
            links = report.links_found,
            fetched = report.articles_fetched,
            summaries = report.summaries,
            sent = report.messages_sent,
            failed_sends = report.delivery_failures.len(),
            "Digest run complete"
        );
        Ok(report)
    }

    /// Fetch every link, keeping successes in link order.
    ///
    /// `buffered` polls up to `fetch_concurrency` fetches at once but yields
    /// results in input order.
    async fn fetch_articles(&self, links: Vec<String>) -> (Vec<String>, Vec<FetchFailure>) {
        let concurrency = self.config.fetch_concurrency.max(1);
        let fetcher = &self.deps.fetcher;

        let results: Vec<(String, Result<String, _>)> = stream::iter(links)
            .map(|url| async move {
                let result = fetcher.fetch(&url).await;
                (url, result)
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut articles = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (url, result) in results {
            match result {
                Ok(text) => articles.push(text),
                Err(e) => {
                    warn!(url = %url, error = %e, "Skipping article");
                    failures.push(FetchFailure {
                        url,
                        reason: e.to_string(),
                    });
                }
            }
        }
        (articles, failures)
    }

    /// Send the lead-in and summaries, or the nothing-found notice.
    ///
    /// Every message is attempted; failures are recorded, not raised.
    async fn deliver(&self, summaries: &[String], report: &mut RunReport) -> DigestOutcome {
        let (outcome, messages): (DigestOutcome, Vec<&str>) = if summaries.is_empty() {
            (
                DigestOutcome::NothingFound,
                vec![self.config.nothing_found.as_str()],
            )
        } else {
            let mut messages = Vec::with_capacity(summaries.len() + 1);
            messages.push(self.config.lead_in.as_str());
            messages.extend(summaries.iter().map(String::as_str));
            (
                DigestOutcome::Delivered {
                    summaries: summaries.len(),
                },
                messages,
            )
        };

        for (index, message) in messages.into_iter().enumerate() {
            match self.deps.notifier.send(&self.config.channel, message).await {
                Ok(()) => report.messages_sent += 1,
                Err(e) => {
                    warn!(index, error = %e, "Failed to deliver message");
                    report.delivery_failures.push(DeliveryFailure {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        outcome
    }

    /// Log a fatal failure and apply the fatal policy.
    async fn abort(&self, stage: RunStage, failure: RunFailure) -> RunError {
        error!(stage = %stage, error = %failure, "Digest run aborted");

        if self.config.on_fatal == FatalPolicy::Notify
            && let Err(e) = self
                .deps
                .notifier
                .send(&self.config.channel, &self.config.failure_notice)
                .await
        {
            warn!(error = %e, "Failed to deliver failure notice");
        }

        RunError::new(stage, failure)
    }
}

fn enter(stage: RunStage) {
    debug!(stage = %stage, "Entering stage");
}
