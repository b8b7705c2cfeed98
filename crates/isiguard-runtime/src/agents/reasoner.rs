//! LLM-backed reasoning agent.

use std::sync::Arc;

use async_trait::async_trait;
use isiguard_core::schema::parse_reasoning;
use isiguard_core::{consistency_violations, Classification, ComparisonSummary, ReasoningSource};

use super::{metered_completion, AgentError, ReasoningAgent};
use crate::pipeline::Collaborator;
use crate::prompts;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider};
use crate::resilience::BudgetTracker;

/// Classifies a comparison summary through an [`LlmProvider`].
///
/// The reply must pass the reasoning schema and agree with the measured
/// comparison: it may not drop `critical_omission` while segments are
/// missing, nor call the document compliant with missing or extra text.
pub struct LlmReasoningAgent {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    system_prompt: String,
}

impl LlmReasoningAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, completion: CompletionConfig) -> Self {
        Self {
            provider,
            completion,
            system_prompt: prompts::reasoning_system_prompt(),
        }
    }
}

#[async_trait]
impl ReasoningAgent for LlmReasoningAgent {
    async fn reason(
        &self,
        summary: &ComparisonSummary,
        budget: &BudgetTracker,
    ) -> Result<Classification, AgentError> {
        let request = prompts::reasoning_request(summary)
            .map_err(|e| AgentError::SchemaValidation(vec![format!("summary not serializable: {}", e)]))?;
        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(request),
        ];

        let content = metered_completion(
            self.provider.as_ref(),
            Collaborator::Reasoning,
            messages,
            &self.completion,
            budget,
        )
        .await?;

        let output = parse_reasoning(&content).map_err(AgentError::SchemaValidation)?;

        let mut severity_classes = output.severity_classes;
        severity_classes.sort();
        let classification = Classification {
            severity_classes,
            rationale: output.rationale,
            source: ReasoningSource::Collaborator,
        };

        let violations = consistency_violations(summary, &classification);
        if !violations.is_empty() {
            return Err(AgentError::Inconsistent(violations));
        }
        Ok(classification)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use isiguard_core::{evaluate, GroundTruth, LayoutElement, ScoringConfig, SeverityClass};

    fn summary(document: &str) -> ComparisonSummary {
        let config = ScoringConfig::default();
        let evaluation = evaluate(
            &GroundTruth::from_text("Do not take if pregnant. Consult your doctor."),
            &[LayoutElement::paragraph(1, 0, document)],
            &config,
        )
        .unwrap();
        ComparisonSummary::new(&evaluation.global, &evaluation.precision, false, &config)
    }

    fn agent(reply: &str) -> LlmReasoningAgent {
        LlmReasoningAgent::new(Arc::new(ScriptedProvider::always(reply)), CompletionConfig::default())
    }

    #[tokio::test]
    async fn test_consistent_reply_is_accepted() {
        let agent = agent(
            r#"{"severity_classes": ["critical_omission"],
                "rationale": "The pregnancy contraindication is absent; patients may not be warned."}"#,
        );
        let classification = agent
            .reason(&summary("Consult your doctor."), &BudgetTracker::default())
            .await
            .unwrap();
        assert_eq!(classification.severity_classes, vec![SeverityClass::CriticalOmission]);
        assert_eq!(classification.source, ReasoningSource::Collaborator);
        assert!(classification.rationale.contains("pregnancy"));
    }

    #[tokio::test]
    async fn test_compliant_despite_omission_is_rejected() {
        let agent = agent(r#"{"severity_classes": ["compliant"], "rationale": "Looks fine."}"#);
        let err = agent
            .reason(&summary("Consult your doctor."), &BudgetTracker::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Inconsistent(_)));
    }

    #[tokio::test]
    async fn test_unknown_class_is_schema_failure() {
        let agent = agent(r#"{"severity_classes": ["acceptable"], "rationale": "ok"}"#);
        let err = agent
            .reason(
                &summary("Do not take if pregnant. Consult your doctor."),
                &BudgetTracker::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::SchemaValidation(_)));
    }
}
