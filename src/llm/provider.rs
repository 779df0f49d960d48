//! LLM provider abstraction.

use async_trait::async_trait;

use crate::error::LlmError;

/// A single-turn text completion backend.
///
/// The system preamble and sampling settings are fixed when the provider
/// is built; callers only supply the user prompt.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and errors ("anthropic", "openai").
    fn provider_name(&self) -> &str;

    /// Model identifier.
    fn model_name(&self) -> &str;

    /// Complete one prompt and return the response text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}
