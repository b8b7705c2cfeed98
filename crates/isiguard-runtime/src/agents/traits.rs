//! Agent traits and errors.

use async_trait::async_trait;
use isiguard_core::schema::ExtractedSegment;
use isiguard_core::{Classification, ComparisonSummary, IsiCandidate};
use std::time::Duration;
use thiserror::Error;

use crate::evidence::GroundingError;
use crate::pipeline::Collaborator;
use crate::providers::ProviderError;
use crate::resilience::BudgetTracker;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Output failed schema validation: {}", .0.join("; "))]
    SchemaValidation(Vec<String>),

    #[error("Output not grounded in region: {0}")]
    Grounding(#[from] GroundingError),

    #[error("Output contradicts the comparison: {}", .0.join("; "))]
    Inconsistent(Vec<String>),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Budget exceeded")]
    BudgetExceeded,

    #[error("Circuit open for {0}")]
    CircuitOpen(Collaborator),
}

impl AgentError {
    /// Whether another attempt may succeed.
    ///
    /// Malformed or ungrounded output is retried: sampling may do better.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Provider(e) => e.is_transient(),
            AgentError::SchemaValidation(_)
            | AgentError::Grounding(_)
            | AgentError::Inconsistent(_)
            | AgentError::Timeout(_) => true,
            AgentError::BudgetExceeded | AgentError::CircuitOpen(_) => false,
        }
    }

    /// Whether the collaborator cannot work at all for this run.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            AgentError::Provider(ProviderError::AuthError | ProviderError::NotConfigured(_))
        )
    }
}

/// Transcribes the safety text of one candidate region.
#[async_trait]
pub trait ExtractionAgent: Send + Sync {
    /// Segments found in the region, validated against it. An empty list
    /// means the region holds no safety text.
    async fn extract(
        &self,
        candidate: &IsiCandidate,
        budget: &BudgetTracker,
    ) -> Result<Vec<ExtractedSegment>, AgentError>;

    fn name(&self) -> &str;
}

/// Interprets a comparison summary into severity classes and a rationale.
#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    /// A classification that passed schema and consistency checks.
    async fn reason(
        &self,
        summary: &ComparisonSummary,
        budget: &BudgetTracker,
    ) -> Result<Classification, AgentError>;

    fn name(&self) -> &str;
}
