//! LLM-backed extraction agent.

use std::sync::Arc;

use async_trait::async_trait;
use isiguard_core::schema::{parse_extraction, ExtractedSegment};
use isiguard_core::IsiCandidate;

use super::{metered_completion, AgentError, ExtractionAgent};
use crate::evidence::GroundingValidator;
use crate::pipeline::Collaborator;
use crate::prompts;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider};
use crate::resilience::BudgetTracker;

/// Transcribes a candidate region through an [`LlmProvider`].
///
/// A reply is accepted only if it parses as JSON, passes the extraction
/// schema and every segment is grounded in the region text.
pub struct LlmExtractionAgent {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    system_prompt: String,
}

impl LlmExtractionAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, completion: CompletionConfig) -> Self {
        Self {
            provider,
            completion,
            system_prompt: prompts::extraction_system_prompt(),
        }
    }
}

#[async_trait]
impl ExtractionAgent for LlmExtractionAgent {
    async fn extract(
        &self,
        candidate: &IsiCandidate,
        budget: &BudgetTracker,
    ) -> Result<Vec<ExtractedSegment>, AgentError> {
        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(prompts::extraction_request(candidate)),
        ];

        let content = metered_completion(
            self.provider.as_ref(),
            Collaborator::Extraction,
            messages,
            &self.completion,
            budget,
        )
        .await?;

        let output = parse_extraction(&content).map_err(AgentError::SchemaValidation)?;
        GroundingValidator::new(&candidate.raw_text).validate_all(&output.segments)?;

        Ok(output.segments)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BudgetConfig;
    use crate::testing::ScriptedProvider;

    fn candidate() -> IsiCandidate {
        IsiCandidate::new(
            1,
            3,
            "IMPORTANT SAFETY INFORMATION Do not take if pregnant. Consult your doctor. Ask about savings!",
            0.8,
        )
    }

    fn agent(provider: ScriptedProvider) -> LlmExtractionAgent {
        LlmExtractionAgent::new(Arc::new(provider), CompletionConfig::default())
    }

    #[tokio::test]
    async fn test_valid_grounded_reply() {
        let agent = agent(ScriptedProvider::always(
            r#"{"segments": [{"text": "Do not take if pregnant.", "confidence": 0.97},
                             {"text": "Consult your doctor.", "confidence": 0.95}]}"#,
        ));
        let budget = BudgetTracker::default();

        let segments = agent.extract(&candidate(), &budget).await.unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text, "Consult your doctor.");
        assert_eq!(budget.usage().llm_calls, 1);
    }

    #[tokio::test]
    async fn test_prose_reply_is_schema_failure() {
        let agent = agent(ScriptedProvider::always("Sure! The safety text is: Do not take if pregnant."));
        let err = agent.extract(&candidate(), &BudgetTracker::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::SchemaValidation(_)));
    }

    #[tokio::test]
    async fn test_hallucinated_segment_is_rejected() {
        let agent = agent(ScriptedProvider::always(
            r#"{"segments": [{"text": "Do not take if pregnant.", "confidence": 0.9},
                             {"text": "Liver damage may occur with alcohol use.", "confidence": 0.9}]}"#,
        ));
        let err = agent.extract(&candidate(), &BudgetTracker::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::Grounding(_)));
    }

    #[tokio::test]
    async fn test_budget_refuses_call() {
        let provider = ScriptedProvider::always(r#"{"segments": []}"#);
        let calls = provider.calls();
        let agent = agent(provider);
        let budget = BudgetTracker::new(&BudgetConfig {
            global_max_tokens: 100,
            extraction_max_tokens: 100,
            reasoning_max_tokens: 100,
        });

        let err = agent.extract(&candidate(), &budget).await.unwrap_err();
        assert!(matches!(err, AgentError::BudgetExceeded));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
