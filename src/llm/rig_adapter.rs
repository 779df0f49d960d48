//! Bridges a rig-core agent to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::agent::Agent;
use rig::completion::{CompletionModel, Prompt};

use crate::error::LlmError;
use crate::llm::provider::LlmProvider;

/// `LlmProvider` backed by a rig agent with a fixed preamble.
pub struct RigAdapter<M: CompletionModel> {
    agent: Agent<M>,
    provider: String,
    model: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(agent: Agent<M>, provider: &str, model: &str) -> Self {
        Self {
            agent,
            provider: provider.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .agent
            .prompt(prompt)
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.provider.clone(),
                reason: e.to_string(),
            })?;

        if response.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: self.provider.clone(),
            });
        }

        tracing::debug!(
            provider = %self.provider,
            model = %self.model,
            response_len = response.len(),
            "LLM response received"
        );
        Ok(response)
    }
}
