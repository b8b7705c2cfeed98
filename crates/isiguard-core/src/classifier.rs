//! Deterministic severity classification.
//!
//! The rules, applied in order:
//! 1. Any ground-truth segment missing from the document is a
//!    `critical_omission`.
//! 2. Otherwise a composite below the pass threshold is a
//!    `formatting_difference`.
//! 3. Otherwise the document is `compliant`.
//!
//! Extra content adds `extraneous_content` and rules out `compliant`.
//!
//! A reasoning collaborator may replace these classes, but only with a
//! classification that passes [`consistency_violations`]. This module is
//! the fallback and the yardstick.

use serde::{Deserialize, Serialize};

use crate::config::{CombinePolicy, ScoringConfig, Thresholds};
use crate::scoring::MetricScores;
use crate::text::comparison_form;
use crate::types::{Classification, ComparisonResult, Edit, PathScores, ReasoningSource, SeverityClass};

/// What the classifier (or a reasoning collaborator) sees of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub composite_score: f64,
    pub per_path_scores: PathScores,
    pub global_metrics: MetricScores,
    pub precision_metrics: MetricScores,

    /// Ground-truth segments with no adequate match anywhere in the document
    pub missing_content: Vec<String>,

    /// Extras from both paths, deduplicated
    pub extra_content: Vec<String>,

    /// Word-level edits of matched segments, precision path first
    #[serde(default)]
    pub edits: Vec<Edit>,

    pub no_candidates_found: bool,
    pub combine_policy: CombinePolicy,
    pub thresholds: Thresholds,
}

impl ComparisonSummary {
    /// Join the two path results.
    ///
    /// The global path decides presence: it searched the whole document,
    /// so a segment it found is not missing even if the precision path
    /// lost it.
    pub fn new(
        global: &ComparisonResult,
        precision: &ComparisonResult,
        no_candidates_found: bool,
        config: &ScoringConfig,
    ) -> Self {
        let mut extra_content: Vec<String> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        for text in precision.extra.iter().chain(&global.extra) {
            let form = comparison_form(text);
            if !seen.contains(&form) {
                seen.push(form);
                extra_content.push(text.clone());
            }
        }

        // Precision-path edits first; the global match fills in segments it lost.
        let edits = global
            .segments
            .iter()
            .enumerate()
            .flat_map(|(i, found)| match precision.segments.get(i) {
                Some(extracted) if extracted.is_present() => &extracted.edits,
                _ => &found.edits,
            })
            .cloned()
            .collect();

        Self {
            composite_score: config.combine.combine(global.score, precision.score),
            per_path_scores: PathScores {
                global: global.score,
                precision: precision.score,
            },
            global_metrics: global.metrics,
            precision_metrics: precision.metrics,
            missing_content: global.missing.clone(),
            extra_content,
            edits,
            no_candidates_found,
            combine_policy: config.combine,
            thresholds: config.thresholds,
        }
    }
}

/// Applies the deterministic rules.
pub struct Classifier {
    thresholds: Thresholds,
}

impl Classifier {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            thresholds: config.thresholds,
        }
    }

    pub fn classify(&self, summary: &ComparisonSummary) -> Classification {
        let mut classes = Vec::new();

        if !summary.missing_content.is_empty() {
            classes.push(SeverityClass::CriticalOmission);
        } else if summary.composite_score < self.thresholds.pass {
            classes.push(SeverityClass::FormattingDifference);
        }
        if !summary.extra_content.is_empty() {
            classes.push(SeverityClass::ExtraneousContent);
        }
        if classes.is_empty() {
            classes.push(SeverityClass::Compliant);
        }

        Classification {
            rationale: self.rationale(summary, &classes),
            severity_classes: classes,
            source: ReasoningSource::Deterministic,
        }
    }

    fn rationale(&self, summary: &ComparisonSummary, classes: &[SeverityClass]) -> String {
        let mut parts = vec![format!(
            "Composite score {:.1} (global {:.1}, precision {:.1}; {} combination).",
            summary.composite_score,
            summary.per_path_scores.global,
            summary.per_path_scores.precision,
            summary.combine_policy
        )];

        if summary.no_candidates_found {
            parts.push(
                "No ISI candidates were found in the document, so the precision path had nothing to align."
                    .to_string(),
            );
        }

        if !summary.missing_content.is_empty() {
            parts.push(format!(
                "Missing approved segments ({}): {}.",
                summary.missing_content.len(),
                quoted(&summary.missing_content)
            ));
        }

        if summary.composite_score < self.thresholds.critical {
            parts.push(format!(
                "The score is below the critical line ({:.1}).",
                self.thresholds.critical
            ));
        }

        if classes.contains(&SeverityClass::FormattingDifference) {
            if summary.composite_score < self.thresholds.critical {
                parts.push("All approved segments are present but substantially reworded.".to_string());
            } else {
                parts.push(format!(
                    "All approved segments are present; wording differs below the pass line ({:.1}).",
                    self.thresholds.pass
                ));
            }
        }

        if !summary.extra_content.is_empty() {
            parts.push(format!(
                "Text not in the approved ISI ({}): {}.",
                summary.extra_content.len(),
                quoted(&summary.extra_content)
            ));
        }

        if classes == [SeverityClass::Compliant] {
            parts.push("The safety text matches the approved text.".to_string());
        }

        parts.join(" ")
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

/// Ways a proposed classification contradicts the measured evidence.
///
/// Empty when the classification is acceptable.
pub fn consistency_violations(summary: &ComparisonSummary, classification: &Classification) -> Vec<String> {
    let classes = &classification.severity_classes;
    let mut violations = Vec::new();

    if classes.is_empty() {
        violations.push("no severity classes given".to_string());
    }
    if !summary.missing_content.is_empty() && !classes.contains(&SeverityClass::CriticalOmission) {
        violations.push(format!(
            "{} segments are missing but critical_omission was not assigned",
            summary.missing_content.len()
        ));
    }
    if summary.missing_content.is_empty() && classes.contains(&SeverityClass::CriticalOmission) {
        violations.push("critical_omission assigned but no segment is missing".to_string());
    }
    if !summary.extra_content.is_empty() && !classes.contains(&SeverityClass::ExtraneousContent) {
        violations.push("extra content present but extraneous_content was not assigned".to_string());
    }
    if classes.contains(&SeverityClass::Compliant) && classes.len() > 1 {
        violations.push("compliant cannot be combined with other classes".to_string());
    }
    if classes.contains(&SeverityClass::Compliant)
        && (!summary.missing_content.is_empty() || !summary.extra_content.is_empty())
    {
        violations.push("compliant claimed despite missing or extra content".to_string());
    }
    if classification.rationale.trim().is_empty() {
        violations.push("rationale is empty".to_string());
    }

    violations
}

fn quoted(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("\"{}\"", s))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComparisonPath;

    fn result(path: ComparisonPath, score: f64, missing: &[&str], extra: &[&str]) -> ComparisonResult {
        ComparisonResult {
            path,
            score,
            metrics: MetricScores::default(),
            segments: Vec::new(),
            matched: Vec::new(),
            missing: missing.iter().map(|s| s.to_string()).collect(),
            extra: extra.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn summary(global: ComparisonResult, precision: ComparisonResult) -> ComparisonSummary {
        ComparisonSummary::new(&global, &precision, false, &ScoringConfig::default())
    }

    #[test]
    fn test_verbatim_is_compliant() {
        let s = summary(
            result(ComparisonPath::Global, 100.0, &[], &[]),
            result(ComparisonPath::Precision, 100.0, &[], &[]),
        );
        let c = Classifier::default().classify(&s);
        assert_eq!(c.severity_classes, vec![SeverityClass::Compliant]);
        assert_eq!(c.source, ReasoningSource::Deterministic);
        assert!(consistency_violations(&s, &c).is_empty());
    }

    #[test]
    fn test_missing_segment_is_critical() {
        let s = summary(
            result(ComparisonPath::Global, 50.0, &["Do not take if pregnant."], &[]),
            result(ComparisonPath::Precision, 50.0, &["Do not take if pregnant."], &[]),
        );
        let c = Classifier::default().classify(&s);
        assert_eq!(c.severity_classes, vec![SeverityClass::CriticalOmission]);
        assert!(c.rationale.contains("Do not take if pregnant."));
        assert!(c.rationale.contains("below the critical line"));
    }

    #[test]
    fn test_global_path_decides_presence() {
        let s = summary(
            result(ComparisonPath::Global, 100.0, &[], &[]),
            result(ComparisonPath::Precision, 50.0, &["Do not take if pregnant."], &[]),
        );
        assert!(s.missing_content.is_empty());
        let c = Classifier::default().classify(&s);
        assert_eq!(c.severity_classes, vec![SeverityClass::FormattingDifference]);
    }

    #[test]
    fn test_reworded_is_formatting_difference() {
        let s = summary(
            result(ComparisonPath::Global, 56.5, &[], &[]),
            result(ComparisonPath::Precision, 56.5, &[], &[]),
        );
        let c = Classifier::default().classify(&s);
        assert_eq!(c.severity_classes, vec![SeverityClass::FormattingDifference]);
        assert!(c.rationale.contains("substantially reworded"));
    }

    #[test]
    fn test_extras_rule_out_compliant() {
        let s = summary(
            result(ComparisonPath::Global, 100.0, &[], &["Ask about our savings card!"]),
            result(ComparisonPath::Precision, 100.0, &[], &["ask about our savings card"]),
        );
        assert_eq!(s.extra_content, vec!["ask about our savings card"]);
        let c = Classifier::default().classify(&s);
        assert_eq!(c.severity_classes, vec![SeverityClass::ExtraneousContent]);
    }

    #[test]
    fn test_no_candidates_rationale() {
        let global = result(ComparisonPath::Global, 0.0, &["Consult your doctor."], &[]);
        let precision = result(ComparisonPath::Precision, 0.0, &["Consult your doctor."], &[]);
        let s = ComparisonSummary::new(&global, &precision, true, &ScoringConfig::default());
        let c = Classifier::default().classify(&s);
        assert!(c.rationale.contains("No ISI candidates"));
        assert!(c.severity_classes.contains(&SeverityClass::CriticalOmission));
    }

    #[test]
    fn test_consistency_rejects_hiding_omissions() {
        let s = summary(
            result(ComparisonPath::Global, 50.0, &["Do not take if pregnant."], &[]),
            result(ComparisonPath::Precision, 50.0, &[], &[]),
        );
        let claimed = Classification {
            severity_classes: vec![SeverityClass::Compliant],
            rationale: "Looks fine.".to_string(),
            source: ReasoningSource::Collaborator,
        };
        let violations = consistency_violations(&s, &claimed);
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn test_consistency_accepts_refined_rationale() {
        let s = summary(
            result(ComparisonPath::Global, 80.0, &[], &[]),
            result(ComparisonPath::Precision, 80.0, &[], &[]),
        );
        let claimed = Classification {
            severity_classes: vec![SeverityClass::FormattingDifference],
            rationale: "Contraction used in the pregnancy warning.".to_string(),
            source: ReasoningSource::Collaborator,
        };
        assert!(consistency_violations(&s, &claimed).is_empty());
    }
}
