//! # isiguard-core
//!
//! Deterministic verification of Important Safety Information (ISI) in
//! promotional documents.
//!
//! Given the approved ISI text and the layout of a target document, this
//! crate answers:
//! - Is every approved safety statement present?
//! - Is it worded faithfully?
//! - Is anything in the safety text that should not be?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same scores and classes
//! 2. **No LLM calls**: Detection, consolidation, comparison and scoring are rule-based
//! 3. **Total**: Empty or degenerate input yields well-defined low scores, never a panic
//! 4. **Explicit absence**: Finding no ISI is reported as `no_candidates_found`, not as a zero-score accident
//!
//! ## Example
//!
//! ```rust,ignore
//! use isiguard_core::{evaluate, GroundTruth, LayoutElement, ScoringConfig};
//!
//! let ground_truth = GroundTruth::from_text("Do not take if pregnant. Consult your doctor.");
//! let elements = vec![LayoutElement::paragraph(1, 0, "Consult your doctor.")];
//! let evaluation = evaluate(&ground_truth, &elements, &ScoringConfig::default())?;
//!
//! println!("{:.1} {:?}", evaluation.verdict.composite_score, evaluation.verdict.missing_content);
//! ```

pub mod classifier;
pub mod comparator;
pub mod config;
pub mod consolidator;
pub mod detector;
pub mod schema;
pub mod scoring;
pub mod synthesizer;
pub mod text;
pub mod types;

// Re-export main types at crate root
pub use classifier::{consistency_violations, Classifier, ComparisonSummary};
pub use comparator::{word_edits, Comparator};
pub use config::{CombinePolicy, ConfigError, ScoringConfig, Thresholds, DEFAULT_COMBINE_POLICY};
pub use consolidator::Consolidator;
pub use detector::{DetectionOutcome, Detector};
pub use schema::{ExtractedSegment, ExtractionOutput, OutputSchema, ReasoningOutput, SchemaError};
pub use scoring::{Metric, MetricScores, ScoringError};
pub use synthesizer::Synthesizer;
pub use types::{
    BoundingRegion, CandidateOrigin, Classification, ComparisonPath, ComparisonResult,
    ComplianceVerdict, ConsolidatedIsi, Edit, ElementRole, GroundTruth, IsiCandidate, IsiSegment,
    LayoutElement, PathScores, ReasoningSource, SegmentMatch, SeverityClass,
};

use thiserror::Error;

/// Errors that can occur during evaluation
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal scoring defect: {0}")]
    Scoring(#[from] ScoringError),
}

/// Everything a deterministic run produced.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub verdict: ComplianceVerdict,
    pub detection: DetectionOutcome,
    pub consolidated: ConsolidatedIsi,
    pub global: ComparisonResult,
    pub precision: ComparisonResult,
}

/// Verify a document's safety text without any collaborators.
///
/// Detector candidates are used verbatim as the extracted text, and the
/// deterministic classifier assigns severity.
pub fn evaluate(
    ground_truth: &GroundTruth,
    elements: &[LayoutElement],
    config: &ScoringConfig,
) -> Result<Evaluation, EvaluationError> {
    config.validate()?;

    let detection = Detector::new(config).detect(elements, ground_truth);
    let consolidated = Consolidator::new(config).consolidate(detection.candidates().to_vec());

    let comparator = Comparator::new(config);
    let global = comparator.global(ground_truth, elements);
    let precision = comparator.precision(ground_truth, &consolidated);

    let summary = ComparisonSummary::new(&global, &precision, detection.is_empty(), config);
    let classification = Classifier::new(config).classify(&summary);
    let verdict = Synthesizer::new().synthesize(summary, classification)?;

    Ok(Evaluation {
        verdict,
        detection,
        consolidated,
        global,
        precision,
    })
}
