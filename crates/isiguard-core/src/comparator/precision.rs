//! Precision path: consolidated safety text aligned against ground truth.
//!
//! When the consolidated text has as many sentences as the ground truth,
//! sentences are paired by index. Otherwise each segment takes its best
//! unclaimed sentence.

use super::alignment::{assign, is_present};
use super::{build_result, matched, unmatched};
use crate::scoring::score_pair;
use crate::types::{ComparisonPath, ComparisonResult, ConsolidatedIsi, GroundTruth};

pub(super) fn compare(ground_truth: &GroundTruth, consolidated: &ConsolidatedIsi, presence: f64) -> ComparisonResult {
    let sentences = consolidated.sentences();

    if sentences.len() == ground_truth.len() {
        return index_aligned(ground_truth, &sentences, presence);
    }

    let assignment = assign(ground_truth.segments(), &sentences, 1, presence);
    let segments = ground_truth
        .segments()
        .iter()
        .zip(&assignment.matches)
        .map(|(segment, found)| match found {
            Some(m) => matched(segment, m.text.clone(), m.scores, m.composite),
            None => unmatched(segment),
        })
        .collect();
    let extra = sentences
        .iter()
        .zip(&assignment.claimed)
        .filter(|(_, &claimed)| !claimed)
        .map(|(s, _)| s.clone())
        .collect();

    build_result(ComparisonPath::Precision, segments, extra)
}

fn index_aligned(ground_truth: &GroundTruth, sentences: &[String], presence: f64) -> ComparisonResult {
    let mut segments = Vec::with_capacity(sentences.len());
    let mut extra = Vec::new();

    for (segment, sentence) in ground_truth.segments().iter().zip(sentences) {
        let scores = score_pair(segment, sentence);
        let composite = scores.composite();
        if is_present(segment, sentence, composite, presence) {
            segments.push(matched(segment, sentence.clone(), scores, composite));
        } else {
            segments.push(unmatched(segment));
            extra.push(sentence.clone());
        }
    }

    build_result(ComparisonPath::Precision, segments, extra)
}
