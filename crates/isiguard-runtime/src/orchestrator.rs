//! Verification orchestrator.
//!
//! Drives one document through the pipeline state machine:
//! - Layout analysis (collaborator, with timeout and bounded retry)
//! - Detection (deterministic)
//! - Fan-out via `tokio::join!`: extraction → consolidation → precision
//!   comparison on one branch, global comparison on the other
//! - Fan-in: summary, reasoning (collaborator, deterministic fallback)
//!   and synthesis
//!
//! Every run gets its own budget tracker and circuit breaker, so runs on
//! different documents share nothing and can proceed in parallel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use isiguard_core::schema::ExtractedSegment;
use isiguard_core::{
    CandidateOrigin, Classification, Classifier, Comparator, ComparisonResult, ComparisonSummary,
    ComplianceVerdict, ConsolidatedIsi, Consolidator, Detector, GroundTruth, IsiCandidate,
    LayoutElement, ScoringError, Synthesizer,
};

use crate::agents::{
    AgentError, ExtractionAgent, LlmExtractionAgent, LlmReasoningAgent, ReasoningAgent,
};
use crate::config::VerifierConfig;
use crate::layout::{create_layout_provider, DocumentSource, LayoutError, LayoutProvider, TextLayoutProvider};
use crate::pipeline::{Collaborator, FailedStage, InvalidTransition, PipelineStage, PipelineTrace};
use crate::providers::{CompletionConfig, LlmProvider, ProviderRegistry};
use crate::resilience::{BudgetTracker, CircuitBreaker, LlmUsage, RetryPolicy};

/// Errors that stop a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Collaborator unreachable, or its output unusable
    #[error("{stage} failed: {message}")]
    ExtractionFailure { stage: Collaborator, message: String },

    #[error("{stage} output failed schema validation: {}", .violations.join("; "))]
    SchemaValidationFailure { stage: Collaborator, violations: Vec<String> },

    /// Internal defect: a score left its range
    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error("Pipeline not configured: {0}")]
    NotConfigured(String),

    /// The global comparison task panicked or was cancelled
    #[error("Global comparison did not complete: {0}")]
    GlobalComparison(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl PipelineError {
    /// Wrap an agent error with the stage it came from.
    pub fn from_agent(stage: Collaborator, error: AgentError) -> Self {
        match error {
            AgentError::SchemaValidation(violations) => {
                PipelineError::SchemaValidationFailure { stage, violations }
            }
            other => PipelineError::ExtractionFailure {
                stage,
                message: other.to_string(),
            },
        }
    }

    fn from_layout(error: LayoutError) -> Self {
        PipelineError::ExtractionFailure {
            stage: Collaborator::Layout,
            message: error.to_string(),
        }
    }

    /// The stage a run that hit this error is marked failed at. Internal
    /// defects count as scoring failures.
    pub fn stage(&self) -> FailedStage {
        match self {
            PipelineError::ExtractionFailure { stage, .. }
            | PipelineError::SchemaValidationFailure { stage, .. } => (*stage).into(),
            PipelineError::Scoring(_)
            | PipelineError::NotConfigured(_)
            | PipelineError::GlobalComparison(_)
            | PipelineError::InvalidTransition(_) => FailedStage::Scoring,
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: FailedStage,
    pub message: String,
}

/// A collaborator result replaced by a deterministic one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Degradation {
    pub stage: Collaborator,

    /// Index of the affected candidate (extraction only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<usize>,

    pub reason: String,
}

/// Everything one run produced, including partial results of a failed run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// Present only when the run reached `Done`
    pub verdict: Option<ComplianceVerdict>,
    pub global: Option<ComparisonResult>,
    pub precision: Option<ComparisonResult>,
    pub consolidated: Option<ConsolidatedIsi>,
    pub failure: Option<StageFailure>,
    pub trace: PipelineTrace,
    pub usage: LlmUsage,
    pub degradations: Vec<Degradation>,
}

impl PipelineOutcome {
    fn new() -> Self {
        Self {
            verdict: None,
            global: None,
            precision: None,
            consolidated: None,
            failure: None,
            trace: PipelineTrace::new(),
            usage: LlmUsage::default(),
            degradations: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.trace.stage(), PipelineStage::Failed(_))
    }
}

/// Per-run resilience state.
struct RunState {
    budget: BudgetTracker,
    circuit: CircuitBreaker,
}

enum Input<'a> {
    Document(&'a DocumentSource),
    Elements(Vec<LayoutElement>),
}

/// Output of the extraction branch.
struct ExtractionBranch {
    consolidated: ConsolidatedIsi,
    precision: ComparisonResult,
    degradations: Vec<Degradation>,
}

/// Runs documents through layout, detection, the two comparison branches,
/// reasoning and synthesis.
///
/// # Architecture
/// - Collaborators (layout, extraction, reasoning) are the only async calls;
///   each gets a timeout, bounded retry and a circuit
/// - Without agents the deterministic stages run alone: detector text
///   stands in for extraction and the classifier for reasoning
/// - An extraction failure for one candidate falls back to its detector
///   text; only an unusable collaborator (auth, configuration) fails the
///   branch
pub struct VerificationOrchestrator {
    layout: Arc<dyn LayoutProvider>,
    extraction: Option<Arc<dyn ExtractionAgent>>,
    reasoning: Option<Arc<dyn ReasoningAgent>>,
    config: VerifierConfig,
    retry: RetryPolicy,
}

impl VerificationOrchestrator {
    pub fn builder() -> VerificationOrchestratorBuilder {
        VerificationOrchestratorBuilder::new()
    }

    /// Build the layout provider and LLM agents a configuration selects.
    pub fn from_config(config: VerifierConfig) -> Result<Self, PipelineError> {
        let layout = create_layout_provider(&config.runtime.layout)
            .map_err(|e| PipelineError::NotConfigured(e.to_string()))?;
        let mut builder = VerificationOrchestratorBuilder::new()
            .config(config.clone())
            .layout(layout);

        if let Some(selection) = &config.runtime.provider {
            let registry = ProviderRegistry::with_defaults();
            let provider = registry
                .create(&selection.provider_type, &selection.factory_config())
                .map_err(|e| PipelineError::NotConfigured(e.to_string()))?;

            let model = selection
                .model
                .clone()
                .or_else(|| {
                    registry
                        .default_config(&selection.provider_type)
                        .and_then(|c| c["model"].as_str().map(String::from))
                })
                .unwrap_or_else(|| CompletionConfig::default().model);
            let completion = CompletionConfig {
                model,
                max_tokens: selection.max_tokens,
                ..Default::default()
            };

            tracing::info!(
                provider = provider.name(),
                model = %completion.model,
                "LLM collaborators enabled"
            );
            builder = builder.provider(provider, completion);
        }

        builder.build()
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify a raw document.
    pub async fn verify(&self, ground_truth: &GroundTruth, document: &DocumentSource) -> PipelineOutcome {
        self.execute(ground_truth, Input::Document(document)).await
    }

    /// Verify a document whose layout is already known.
    pub async fn verify_elements(
        &self,
        ground_truth: &GroundTruth,
        elements: Vec<LayoutElement>,
    ) -> PipelineOutcome {
        self.execute(ground_truth, Input::Elements(elements)).await
    }

    async fn execute(&self, ground_truth: &GroundTruth, input: Input<'_>) -> PipelineOutcome {
        let run = RunState {
            budget: BudgetTracker::new(&self.config.runtime.budgets),
            circuit: CircuitBreaker::new(self.config.runtime.circuit_breaker.clone()),
        };
        let mut outcome = PipelineOutcome::new();

        if let Err(error) = self.drive(ground_truth, input, &run, &mut outcome).await {
            let stage = error.stage();
            tracing::error!(stage = %stage, error = %error, "Pipeline failed");
            outcome.trace.fail(stage);
            outcome.failure = Some(StageFailure {
                stage,
                message: error.to_string(),
            });
        }

        outcome.usage = run.budget.usage();
        outcome
    }

    async fn drive(
        &self,
        ground_truth: &GroundTruth,
        input: Input<'_>,
        run: &RunState,
        outcome: &mut PipelineOutcome,
    ) -> Result<(), PipelineError> {
        let scoring = &self.config.scoring;

        let elements = match input {
            Input::Elements(elements) => elements,
            Input::Document(document) => self.analyze_layout(document, run).await?,
        };
        outcome.trace.advance(PipelineStage::LayoutReady)?;

        let detection = Detector::new(scoring).detect(&elements, ground_truth);
        let no_candidates_found = detection.is_empty();
        if no_candidates_found {
            tracing::warn!(elements = elements.len(), "No ISI candidates found; only the global path has evidence");
        } else {
            tracing::info!(candidates = detection.candidates().len(), "Candidates detected");
        }
        outcome.trace.advance(PipelineStage::CandidatesDetected)?;

        outcome.trace.advance(PipelineStage::Branches)?;
        // CPU-bound; kept off the async workers
        let global_scan = {
            let comparator = Comparator::new(scoring);
            let ground_truth = ground_truth.clone();
            tokio::task::spawn_blocking(move || comparator.global(&ground_truth, &elements))
        };
        let (extraction, global) = tokio::join!(
            self.extraction_branch(ground_truth, detection.candidates(), run),
            global_scan,
        );
        let global = global.map_err(|e| PipelineError::GlobalComparison(e.to_string()))?;
        outcome.global = Some(global.clone());
        let branch = extraction?;
        outcome.trace.advance(PipelineStage::Joined)?;

        let summary = ComparisonSummary::new(&global, &branch.precision, no_candidates_found, scoring);
        outcome.precision = Some(branch.precision);
        outcome.consolidated = Some(branch.consolidated);
        outcome.degradations.extend(branch.degradations);

        let classification = self.reason(&summary, run, &mut outcome.degradations).await;
        outcome.trace.advance(PipelineStage::Reasoned)?;

        let verdict = Synthesizer::new().synthesize(summary, classification)?;
        tracing::info!(
            composite = verdict.composite_score,
            classes = ?verdict.severity_classes,
            source = ?verdict.reasoning_source,
            "Verdict synthesized"
        );
        outcome.verdict = Some(verdict);
        outcome.trace.advance(PipelineStage::Done)?;
        Ok(())
    }

    async fn analyze_layout(
        &self,
        document: &DocumentSource,
        run: &RunState,
    ) -> Result<Vec<LayoutElement>, PipelineError> {
        let timeout = self.config.runtime.timeout(Collaborator::Layout);
        let layout = self.layout.as_ref();
        let circuit = &run.circuit;

        let result = self
            .retry
            .run(
                "layout",
                move || async move {
                    if circuit.is_open(Collaborator::Layout) {
                        return Err(LayoutError::CircuitOpen);
                    }
                    let result = tokio::time::timeout(timeout, layout.analyze(document))
                        .await
                        .unwrap_or(Err(LayoutError::Timeout(timeout)));
                    match &result {
                        Ok(_) => circuit.record_success(Collaborator::Layout),
                        Err(_) => circuit.record_failure(Collaborator::Layout),
                    }
                    result
                },
                LayoutError::is_transient,
            )
            .await;

        let elements = result.map_err(PipelineError::from_layout)?;
        tracing::info!(provider = layout.name(), elements = elements.len(), "Layout analyzed");
        Ok(elements)
    }

    /// Extraction → consolidation → precision comparison.
    async fn extraction_branch(
        &self,
        ground_truth: &GroundTruth,
        candidates: &[IsiCandidate],
        run: &RunState,
    ) -> Result<ExtractionBranch, PipelineError> {
        let scoring = &self.config.scoring;
        let mut degradations = Vec::new();

        let extracted = match &self.extraction {
            None => candidates.to_vec(),
            Some(agent) => {
                let results: Vec<Result<Vec<ExtractedSegment>, AgentError>> = stream::iter(candidates)
                    .map(|candidate| {
                        self.call_agent(Collaborator::Extraction, run, move || {
                            agent.extract(candidate, &run.budget)
                        })
                    })
                    .buffered(self.config.runtime.extraction_concurrency)
                    .collect()
                    .await;

                let mut extracted = Vec::with_capacity(candidates.len());
                for (index, (candidate, result)) in candidates.iter().zip(results).enumerate() {
                    match result {
                        Ok(segments) => {
                            if segments.is_empty() {
                                tracing::debug!(candidate = index, "Extractor found no safety text in region");
                            }
                            extracted.extend(segments.into_iter().map(|segment| {
                                IsiCandidate::new(candidate.page, candidate.order_rank, segment.text, segment.confidence)
                                    .with_origin(CandidateOrigin::Extractor)
                            }));
                        }
                        Err(error) if error.is_unrecoverable() => {
                            return Err(PipelineError::from_agent(Collaborator::Extraction, error));
                        }
                        Err(error) => {
                            tracing::warn!(
                                candidate = index,
                                error = %error,
                                "Extraction failed, falling back to detector text"
                            );
                            degradations.push(Degradation {
                                stage: Collaborator::Extraction,
                                candidate: Some(index),
                                reason: error.to_string(),
                            });
                            extracted.push(candidate.clone().with_origin(CandidateOrigin::RawFallback));
                        }
                    }
                }
                extracted
            }
        };

        let consolidated = Consolidator::new(scoring).consolidate(extracted);
        tracing::debug!(
            segments = consolidated.segments.len(),
            duplicates_removed = consolidated.duplicates_removed,
            "Candidates consolidated"
        );
        let precision = Comparator::new(scoring).precision(ground_truth, &consolidated);

        Ok(ExtractionBranch {
            consolidated,
            precision,
            degradations,
        })
    }

    /// The reasoning agent's classification, or the deterministic one.
    async fn reason(
        &self,
        summary: &ComparisonSummary,
        run: &RunState,
        degradations: &mut Vec<Degradation>,
    ) -> Classification {
        let classifier = Classifier::new(&self.config.scoring);
        let Some(agent) = &self.reasoning else {
            return classifier.classify(summary);
        };

        match self
            .call_agent(Collaborator::Reasoning, run, move || agent.reason(summary, &run.budget))
            .await
        {
            Ok(classification) => classification,
            Err(error) => {
                tracing::warn!(error = %error, "Reasoning failed, falling back to deterministic classification");
                degradations.push(Degradation {
                    stage: Collaborator::Reasoning,
                    candidate: None,
                    reason: error.to_string(),
                });
                classifier.classify(summary)
            }
        }
    }

    /// One agent call under circuit, timeout and retry.
    async fn call_agent<T, F, Fut>(
        &self,
        collaborator: Collaborator,
        run: &RunState,
        mut call: F,
    ) -> Result<T, AgentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let timeout = self.config.runtime.timeout(collaborator);
        let circuit = &run.circuit;

        self.retry
            .run(
                collaborator.as_str(),
                move || {
                    let attempt = call();
                    async move {
                        if circuit.is_open(collaborator) {
                            return Err(AgentError::CircuitOpen(collaborator));
                        }
                        let result = bounded(timeout, attempt).await;
                        match &result {
                            Ok(_) => circuit.record_success(collaborator),
                            // Refusing to spend tokens says nothing about the collaborator
                            Err(AgentError::BudgetExceeded) => {}
                            Err(_) => circuit.record_failure(collaborator),
                        }
                        result
                    }
                },
                AgentError::is_retryable,
            )
            .await
    }
}

async fn bounded<T>(
    timeout: Duration,
    attempt: impl Future<Output = Result<T, AgentError>>,
) -> Result<T, AgentError> {
    tokio::time::timeout(timeout, attempt)
        .await
        .unwrap_or(Err(AgentError::Timeout(timeout)))
}

/// Builder for [`VerificationOrchestrator`].
pub struct VerificationOrchestratorBuilder {
    layout: Option<Arc<dyn LayoutProvider>>,
    extraction: Option<Arc<dyn ExtractionAgent>>,
    reasoning: Option<Arc<dyn ReasoningAgent>>,
    config: VerifierConfig,
}

impl VerificationOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            layout: None,
            extraction: None,
            reasoning: None,
            config: VerifierConfig::default(),
        }
    }

    /// Defaults to [`TextLayoutProvider`].
    pub fn layout(mut self, layout: Arc<dyn LayoutProvider>) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn extraction_agent(mut self, agent: Arc<dyn ExtractionAgent>) -> Self {
        self.extraction = Some(agent);
        self
    }

    pub fn reasoning_agent(mut self, agent: Arc<dyn ReasoningAgent>) -> Self {
        self.reasoning = Some(agent);
        self
    }

    /// LLM-backed extraction and reasoning agents sharing one provider.
    /// Request timeouts come from the configuration set so far.
    pub fn provider(self, provider: Arc<dyn LlmProvider>, completion: CompletionConfig) -> Self {
        let timeouts = &self.config.runtime.timeouts;
        let extraction = CompletionConfig {
            timeout: timeouts.extraction,
            ..completion.clone()
        };
        let reasoning = CompletionConfig {
            timeout: timeouts.reasoning,
            ..completion
        };
        self.extraction_agent(Arc::new(LlmExtractionAgent::new(Arc::clone(&provider), extraction)))
            .reasoning_agent(Arc::new(LlmReasoningAgent::new(provider, reasoning)))
    }

    pub fn config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<VerificationOrchestrator, PipelineError> {
        self.config
            .validate()
            .map_err(|e| PipelineError::NotConfigured(e.to_string()))?;

        Ok(VerificationOrchestrator {
            layout: self.layout.unwrap_or_else(|| Arc::new(TextLayoutProvider::new())),
            extraction: self.extraction,
            reasoning: self.reasoning,
            retry: RetryPolicy::new(&self.config.runtime.retry),
            config: self.config,
        })
    }
}

impl Default for VerificationOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
