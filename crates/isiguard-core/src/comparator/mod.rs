//! Dual-path comparator.
//!
//! - **Global path** ([`global`]): every ground-truth segment is searched
//!   for in the whole document, independent of what the detector and the
//!   extractor localized. It catches safety text the earlier stages missed.
//! - **Precision path** ([`precision`]): the consolidated safety text is
//!   aligned segment by segment against ground truth.
//!
//! Both produce a [`ComparisonResult`] with per-segment metric scores, an
//! aggregate (mean of per-segment composites, missing segments count 0),
//! and matched/missing/extra lists. Segments matched below 100 carry a
//! word-level edit list. The paths share no state and may run
//! concurrently.

pub(crate) mod alignment;
mod edits;
mod global;
mod precision;

use crate::config::ScoringConfig;
use crate::scoring::{aggregate, MetricScores};
use crate::types::{ComparisonPath, ComparisonResult, ConsolidatedIsi, GroundTruth, LayoutElement, SegmentMatch};

pub use edits::word_edits;

/// Runs both comparison paths with one configuration.
pub struct Comparator {
    presence: f64,
    max_span_sentences: usize,
}

impl Comparator {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            presence: config.thresholds.presence,
            max_span_sentences: config.max_span_sentences,
        }
    }

    /// Presence scan over the whole document.
    pub fn global(&self, ground_truth: &GroundTruth, elements: &[LayoutElement]) -> ComparisonResult {
        global::compare(ground_truth, elements, self.presence, self.max_span_sentences)
    }

    /// Alignment of the consolidated safety text.
    pub fn precision(&self, ground_truth: &GroundTruth, consolidated: &ConsolidatedIsi) -> ComparisonResult {
        precision::compare(ground_truth, consolidated, self.presence)
    }
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

/// A segment with no adequate match.
fn unmatched(ground_truth: &str) -> SegmentMatch {
    SegmentMatch {
        ground_truth: ground_truth.to_string(),
        matched_text: None,
        scores: MetricScores::default(),
        composite: 0.0,
        edits: Vec::new(),
    }
}

fn matched(ground_truth: &str, text: String, scores: MetricScores, composite: f64) -> SegmentMatch {
    let edits = if composite < 100.0 {
        word_edits(ground_truth, &text)
    } else {
        Vec::new()
    };
    SegmentMatch {
        ground_truth: ground_truth.to_string(),
        matched_text: Some(text),
        scores,
        composite,
        edits,
    }
}

fn build_result(path: ComparisonPath, segments: Vec<SegmentMatch>, extra: Vec<String>) -> ComparisonResult {
    let composites: Vec<f64> = segments.iter().map(|s| s.composite).collect();
    let metrics = MetricScores::mean(segments.iter().map(|s| &s.scores));
    let matched = segments
        .iter()
        .filter_map(|s| s.matched_text.clone())
        .collect();
    let missing = segments
        .iter()
        .filter(|s| !s.is_present())
        .map(|s| s.ground_truth.clone())
        .collect();

    let result = ComparisonResult {
        path,
        score: aggregate(&composites),
        metrics,
        segments,
        matched,
        missing,
        extra,
    };
    tracing::debug!(
        path = %path,
        score = result.score,
        missing = result.missing.len(),
        extra = result.extra.len(),
        "Comparison path complete"
    );
    result
}
