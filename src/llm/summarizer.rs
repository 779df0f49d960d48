//! Article summarization.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{LlmError, SummarizationError};
use crate::llm::provider::LlmProvider;

/// System preamble for every summary call.
pub const SUMMARY_PREAMBLE: &str = "You summarize technology news articles for a daily chat digest. \
Reply with a short headline line followed by two to four sentences covering the key facts. \
Plain text only, no preamble, no markdown headings.";

/// Turns a batch of article texts into summaries.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summaries in input order. May be shorter than `articles` when some
    /// articles could not be summarized.
    async fn summarize(&self, articles: &[String]) -> Result<Vec<String>, SummarizationError>;
}

/// Summarizer that makes one LLM call per article.
///
/// A failed or blank article summary is skipped; `LlmError::EmptyResponse`
/// counts as blank. When every article of a non-empty batch fails the
/// provider is assumed down and the batch fails.
pub struct LlmSummarizer {
    llm: Arc<dyn LlmProvider>,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, articles: &[String]) -> Result<Vec<String>, SummarizationError> {
        let mut summaries = Vec::with_capacity(articles.len());
        let mut last_error = None;

        for (index, article) in articles.iter().enumerate() {
            match self.llm.complete(&build_summary_prompt(article)).await {
                Ok(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        warn!(index, "Blank summary, skipping article");
                        continue;
                    }
                    summaries.push(text.to_string());
                }
                Err(LlmError::EmptyResponse { .. }) => {
                    warn!(index, "Blank summary, skipping article");
                }
                Err(e) => {
                    warn!(index, error = %e, "Failed to summarize article");
                    last_error = Some(e);
                }
            }
        }

        if summaries.is_empty()
            && let Some(e) = last_error
        {
            if articles.len() == 1 {
                return Err(SummarizationError::RequestFailed {
                    provider: self.llm.provider_name().to_string(),
                    reason: e.to_string(),
                });
            }
            return Err(SummarizationError::AllFailed {
                provider: self.llm.provider_name().to_string(),
                count: articles.len(),
            });
        }

        debug!(
            articles = articles.len(),
            summaries = summaries.len(),
            model = self.llm.model_name(),
            "Summarization complete"
        );
        Ok(summaries)
    }
}

/// User prompt for one article.
pub fn build_summary_prompt(article: &str) -> String {
    format!("Summarize this article:\n\n{}", article.trim())
}
