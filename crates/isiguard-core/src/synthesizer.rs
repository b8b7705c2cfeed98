//! Synthesizer: joins a comparison summary and a classification into the
//! final verdict.
//!
//! Scores are checked on the way out. An out-of-range score means a defect
//! upstream; it is reported as a [`ScoringError`] instead of being clamped
//! into a plausible-looking verdict.

use chrono::Utc;

use crate::classifier::ComparisonSummary;
use crate::scoring::{check_score, ScoringError};
use crate::types::{Classification, ComplianceVerdict, PathScores};

/// Builds [`ComplianceVerdict`]s.
pub struct Synthesizer;

impl Synthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(
        &self,
        summary: ComparisonSummary,
        classification: Classification,
    ) -> Result<ComplianceVerdict, ScoringError> {
        let per_path_scores = PathScores {
            global: check_score("global path", summary.per_path_scores.global)?,
            precision: check_score("precision path", summary.per_path_scores.precision)?,
        };
        let composite_score = check_score("composite", summary.composite_score)?;

        Ok(ComplianceVerdict {
            composite_score,
            per_path_scores,
            missing_content: summary.missing_content,
            extra_content: summary.extra_content,
            edits: summary.edits,
            severity_classes: classification.severity_classes,
            rationale: classification.rationale,
            no_candidates_found: summary.no_candidates_found,
            reasoning_source: classification.source,
            combine_policy: summary.combine_policy,
            evaluated_at: Utc::now(),
        })
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::config::{CombinePolicy, Thresholds};
    use crate::scoring::MetricScores;
    use crate::types::{ReasoningSource, SeverityClass};

    fn summary(global: f64, precision: f64) -> ComparisonSummary {
        ComparisonSummary {
            composite_score: CombinePolicy::Average.combine(global, precision),
            per_path_scores: PathScores { global, precision },
            global_metrics: MetricScores::default(),
            precision_metrics: MetricScores::default(),
            missing_content: Vec::new(),
            extra_content: Vec::new(),
            edits: Vec::new(),
            no_candidates_found: false,
            combine_policy: CombinePolicy::Average,
            thresholds: Thresholds::default(),
        }
    }

    #[test]
    fn test_synthesize_carries_classification() {
        let s = summary(100.0, 90.0);
        let classification = Classifier::default().classify(&s);
        let verdict = Synthesizer::new().synthesize(s, classification).unwrap();
        assert_eq!(verdict.composite_score, 95.0);
        assert_eq!(verdict.severity_classes, vec![SeverityClass::Compliant]);
        assert_eq!(verdict.reasoning_source, ReasoningSource::Deterministic);
        assert!(verdict.is_compliant());
    }

    #[test]
    fn test_out_of_range_score_is_a_defect() {
        let mut s = summary(100.0, 100.0);
        s.per_path_scores.precision = f64::NAN;
        let classification = Classifier::default().classify(&s);
        let result = Synthesizer::new().synthesize(s, classification);
        assert!(matches!(result, Err(ScoringError::OutOfRange { .. })));
    }
}
