//! Scoring engine: deterministic multi-metric text similarity.
//!
//! A ground-truth segment and a target text are compared on five named
//! metrics. The composite is their weighted sum. Weights are whole
//! percentages that sum to exactly 100, checked at compile time.
//!
//! No AI calls happen here. Same inputs, same scores.

pub mod metrics;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::text::comparison_form;

/// The five similarity metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TokenSet,
    Sequence,
    TokenSort,
    Partial,
    CharEdit,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::TokenSet,
        Metric::Sequence,
        Metric::TokenSort,
        Metric::Partial,
        Metric::CharEdit,
    ];

    /// Weight as a whole percentage of the composite.
    pub const fn weight_percent(self) -> u32 {
        match self {
            Metric::TokenSet => 30,
            Metric::Sequence => 25,
            Metric::TokenSort => 20,
            Metric::Partial => 15,
            Metric::CharEdit => 10,
        }
    }

    /// Weight as a fraction of 1.0.
    pub fn weight(self) -> f64 {
        f64::from(self.weight_percent()) / 100.0
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::TokenSet => "token_set",
            Metric::Sequence => "sequence",
            Metric::TokenSort => "token_sort",
            Metric::Partial => "partial",
            Metric::CharEdit => "char_edit",
        }
    }
}

const fn total_weight_percent() -> u32 {
    let mut total = 0;
    let mut i = 0;
    while i < Metric::ALL.len() {
        total += Metric::ALL[i].weight_percent();
        i += 1;
    }
    total
}

const _: () = assert!(total_weight_percent() == 100, "metric weights must sum to 100%");

/// Errors that indicate an internal defect in scoring.
///
/// Inputs are always well-formed strings, so these never surface for
/// user input. They exist so a broken invariant is reported instead of
/// producing a nonsensical verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("{context} score {value} is outside [0, 100]")]
    OutOfRange { context: String, value: f64 },
}

/// Scores for one comparison, one field per metric, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricScores {
    pub token_set: f64,
    pub sequence: f64,
    pub token_sort: f64,
    pub partial: f64,
    pub char_edit: f64,
}

impl MetricScores {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::TokenSet => self.token_set,
            Metric::Sequence => self.sequence,
            Metric::TokenSort => self.token_sort,
            Metric::Partial => self.partial,
            Metric::CharEdit => self.char_edit,
        }
    }

    /// Weighted composite in `[0, 100]`.
    pub fn composite(&self) -> f64 {
        let sum: f64 = Metric::ALL
            .iter()
            .map(|m| f64::from(m.weight_percent()) * self.get(*m))
            .sum();
        clamp_score(sum / 100.0)
    }

    /// Named view, in weight order.
    pub fn named(&self) -> Vec<(&'static str, f64)> {
        Metric::ALL.iter().map(|m| (m.name(), self.get(*m))).collect()
    }

    /// Per-metric mean over a set of comparisons.
    pub fn mean<'a>(scores: impl IntoIterator<Item = &'a MetricScores>) -> MetricScores {
        let mut total = MetricScores::default();
        let mut count = 0usize;
        for s in scores {
            total.token_set += s.token_set;
            total.sequence += s.sequence;
            total.token_sort += s.token_sort;
            total.partial += s.partial;
            total.char_edit += s.char_edit;
            count += 1;
        }
        if count == 0 {
            return total;
        }
        let n = count as f64;
        MetricScores {
            token_set: total.token_set / n,
            sequence: total.sequence / n,
            token_sort: total.token_sort / n,
            partial: total.partial / n,
            char_edit: total.char_edit / n,
        }
    }
}

/// Score a ground-truth segment against a target text.
///
/// Both sides are reduced to their comparison form first. If either side
/// has no word tokens, every metric is 0.
pub fn score_pair(ground_truth: &str, target: &str) -> MetricScores {
    let a = comparison_form(ground_truth);
    let b = comparison_form(target);
    score_forms(&a, &b)
}

/// Score two texts already in comparison form.
pub fn score_forms(a: &str, b: &str) -> MetricScores {
    if a.is_empty() || b.is_empty() {
        return MetricScores::default();
    }
    MetricScores {
        token_set: clamp_score(metrics::token_set(a, b)),
        sequence: clamp_score(metrics::sequence(a, b)),
        token_sort: clamp_score(metrics::token_sort(a, b)),
        partial: clamp_score(metrics::partial(a, b)),
        char_edit: clamp_score(metrics::char_edit(a, b)),
    }
}

/// Mean of per-segment composites. An empty list aggregates to 0.
pub fn aggregate(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    clamp_score(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Check that a score is finite and within `[0, 100]`.
pub fn check_score(context: &str, value: f64) -> Result<f64, ScoringError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(ScoringError::OutOfRange {
            context: context.to_string(),
            value,
        })
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_weights_sum_to_one() {
        assert_eq!(total_weight_percent(), 100);
        let sum: f64 = Metric::ALL.iter().map(|m| m.weight()).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_identical_text_scores_100() {
        let scores = score_pair(
            "Do not take if pregnant.",
            "do not take if pregnant",
        );
        for (name, value) in scores.named() {
            assert_eq!(value, 100.0, "{} should be 100", name);
        }
        assert_eq!(scores.composite(), 100.0);
    }

    #[test]
    fn test_empty_side_scores_zero() {
        assert_eq!(score_pair("", "Consult your doctor.").composite(), 0.0);
        assert_eq!(score_pair("Consult your doctor.", "").composite(), 0.0);
        assert_eq!(score_pair("...", "!!!").composite(), 0.0);
    }

    #[test]
    fn test_reordered_text() {
        let scores = score_pair(
            "Store in a cool place. Keep away from children.",
            "Keep away from children. Store in a cool place.",
        );
        assert!(scores.token_set >= 99.0);
        assert!(scores.token_sort >= 99.0);
        assert!(scores.sequence < 60.0);
        assert!(scores.composite() < 90.0);
        assert!(scores.composite() > 50.0);
    }

    #[test]
    fn test_paraphrase_is_moderate() {
        let composite = score_pair("Consult your doctor.", "Talk to your doctor.").composite();
        assert!(composite > 50.0 && composite < 90.0);
    }

    #[test]
    fn test_aggregate() {
        assert_eq!(aggregate(&[]), 0.0);
        assert_eq!(aggregate(&[100.0, 0.0]), 50.0);
    }

    #[test]
    fn test_mean_metric_scores() {
        let full = score_pair("a b", "a b");
        let none = MetricScores::default();
        let mean = MetricScores::mean([&full, &none]);
        assert_eq!(mean.token_set, 50.0);
        assert_eq!(mean.composite(), 50.0);
        assert_eq!(MetricScores::mean(std::iter::empty()), MetricScores::default());
    }

    #[test]
    fn test_check_score() {
        assert!(check_score("global", 42.0).is_ok());
        assert!(check_score("global", 100.5).is_err());
        assert!(check_score("global", f64::NAN).is_err());
    }

    proptest! {
        #[test]
        fn prop_composite_in_range(a in "[a-z ]{0,40}", b in "[a-z ]{0,40}") {
            let scores = score_pair(&a, &b);
            for (_, value) in scores.named() {
                prop_assert!((0.0..=100.0).contains(&value));
            }
            let composite = scores.composite();
            prop_assert!((0.0..=100.0).contains(&composite));
        }

        #[test]
        fn prop_self_similarity_is_full(a in "[a-z]{1,8}( [a-z]{1,8}){0,6}") {
            prop_assert_eq!(score_pair(&a, &a).composite(), 100.0);
        }
    }
}
