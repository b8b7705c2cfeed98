//! Global path: presence scan over the entire document.

use super::alignment::assign;
use super::{build_result, matched, unmatched};
use crate::text::split_segments;
use crate::types::{reading_order, ComparisonPath, ComparisonResult, GroundTruth, LayoutElement};

/// Document sentences in reading order, across all elements.
pub(super) fn document_sentences(elements: &[LayoutElement]) -> Vec<String> {
    reading_order(elements)
        .into_iter()
        .flat_map(|e| split_segments(&e.text))
        .collect()
}

pub(super) fn compare(
    ground_truth: &GroundTruth,
    elements: &[LayoutElement],
    presence: f64,
    max_span: usize,
) -> ComparisonResult {
    let sentences = document_sentences(elements);
    let assignment = assign(ground_truth.segments(), &sentences, max_span, presence);

    let segments = ground_truth
        .segments()
        .iter()
        .zip(&assignment.matches)
        .map(|(segment, found)| match found {
            Some(m) => matched(segment, m.text.clone(), m.scores, m.composite),
            None => unmatched(segment),
        })
        .collect();

    // Insertions: unclaimed sentences between the first and last claimed ones.
    let first = assignment.claimed.iter().position(|&c| c);
    let last = assignment.claimed.iter().rposition(|&c| c);
    let extra = match (first, last) {
        (Some(first), Some(last)) => (first..=last)
            .filter(|&i| !assignment.claimed[i])
            .map(|i| sentences[i].clone())
            .collect(),
        _ => Vec::new(),
    };

    build_result(ComparisonPath::Global, segments, extra)
}
