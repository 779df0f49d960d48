//! Digest pipeline.
//!
//! One run moves through fixed stages:
//! 1. `LinkSource::links()` collects article URLs from the newsletter inbox
//! 2. `ArticleFetcher::fetch()` turns each URL into readable text
//! 3. `trim_to_budget()` drops tail articles until the batch fits
//! 4. `Summarizer::summarize()` condenses the kept articles
//! 5. `Notifier::send()` delivers the lead-in and one message per summary

pub mod budget;
pub mod orchestrator;
pub mod types;

pub use budget::{DEFAULT_TOKEN_BUDGET, estimate_tokens, trim_to_budget};
pub use orchestrator::{Orchestrator, PipelineDeps};
pub use types::{DigestOutcome, FatalPolicy, RunReport, RunStage};
