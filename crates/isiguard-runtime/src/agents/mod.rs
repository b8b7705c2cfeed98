//! Collaborator agents for semantic extraction and reasoning.
//!
//! Each agent makes one attempt per call: prompt, complete, validate.
//! Retries, timeouts and circuit breaking are the orchestrator's job.

mod extractor;
mod reasoner;
mod traits;

pub use extractor::LlmExtractionAgent;
pub use reasoner::LlmReasoningAgent;
pub use traits::{AgentError, ExtractionAgent, ReasoningAgent};

use crate::pipeline::Collaborator;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider};
use crate::resilience::BudgetTracker;

/// One completion charged to `collaborator`'s budget.
///
/// The estimate covers the prompt plus the full completion allowance, so a
/// call is refused before it can overrun the budget.
async fn metered_completion(
    provider: &dyn LlmProvider,
    collaborator: Collaborator,
    messages: Vec<ChatMessage>,
    config: &CompletionConfig,
    budget: &BudgetTracker,
) -> Result<String, AgentError> {
    let prompt_tokens: u32 = messages
        .iter()
        .map(|m| provider.estimate_tokens(&m.content))
        .fold(0, u32::saturating_add);
    let estimated = prompt_tokens.saturating_add(config.max_tokens);

    if !budget.can_afford(collaborator, estimated) {
        tracing::warn!(
            collaborator = %collaborator,
            estimated,
            remaining = budget.remaining(collaborator),
            "Token budget exhausted"
        );
        return Err(AgentError::BudgetExceeded);
    }

    let response = provider.complete(messages, config).await?;
    budget.record_usage(collaborator, &response.usage, &response.model);
    tracing::debug!(
        collaborator = %collaborator,
        provider = provider.name(),
        tokens = response.usage.total(),
        "Completion received"
    );
    Ok(response.content)
}
