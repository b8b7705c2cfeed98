//! # isiguard-runtime
//!
//! Async verification pipeline around `isiguard-core`.
//!
//! This crate adds the parts of a verification run that talk to the
//! outside world: layout analysis of the raw document, LLM extraction of
//! candidate regions and LLM reasoning over the comparison.
//!
//! ## Important
//!
//! Scoring stays in `isiguard-core` and is fully deterministic. LLMs assist;
//! they do not decide:
//! - Extraction output must be grounded in the region it came from
//! - Reasoning output must agree with the measured comparison
//! - Anything else is rejected and the deterministic result is used
//!
//! ## Example
//!
//! ```rust,ignore
//! use isiguard_core::GroundTruth;
//! use isiguard_runtime::{DocumentSource, VerificationOrchestrator, VerifierConfig};
//!
//! let orchestrator = VerificationOrchestrator::from_config(VerifierConfig::from_yaml_file("isiguard.yaml")?)?;
//! let outcome = orchestrator
//!     .verify(&GroundTruth::from_text(&approved_isi), &DocumentSource::text(document))
//!     .await;
//!
//! if let Some(verdict) = &outcome.verdict {
//!     println!("{:.1} {:?}", verdict.composite_score, verdict.severity_classes);
//! }
//! ```

pub mod agents;
pub mod config;
pub mod evidence;
pub mod layout;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod resilience;

#[cfg(test)]
pub(crate) mod testing;

pub use agents::{AgentError, ExtractionAgent, LlmExtractionAgent, LlmReasoningAgent, ReasoningAgent};
pub use config::{
    BudgetConfig, LayoutKind, LayoutSelection, ProviderSelection, RetryConfig, RuntimeConfig, Timeouts,
    VerifierConfig,
};
pub use evidence::{GroundingError, GroundingValidator};
pub use layout::{create_layout_provider, DocumentSource, LayoutError, LayoutProvider, TextLayoutProvider};
pub use orchestrator::{
    Degradation, PipelineError, PipelineOutcome, StageFailure, VerificationOrchestrator,
    VerificationOrchestratorBuilder,
};
pub use pipeline::{Collaborator, FailedStage, PipelineStage, PipelineTrace};
pub use providers::{CompletionConfig, LlmProvider, ProviderError, ProviderRegistry};
pub use resilience::{BudgetTracker, CircuitBreaker, CircuitBreakerConfig, LlmUsage};
