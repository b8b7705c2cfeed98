//! One-to-one greedy assignment of ground-truth segments to target spans.
//!
//! A span is a run of consecutive target units (sentences). A span is only
//! scored against a segment when each of its units shares vocabulary with
//! the segment. Pairs that clear the presence bar are then taken
//! best-first, skipping any whose segment is already matched or whose span
//! overlaps a claimed unit. Ties go to the lower segment index, then the
//! earlier span, then the shorter span, so the result is deterministic.
//!
//! Texts are tokenized once, and repeated span text (the same safety block
//! on every page) is scored once per segment.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::scoring::{score_forms, MetricScores};
use crate::text::{shares_content, PreparedText};

/// A ground-truth segment's assigned span.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SpanMatch {
    pub start: usize,
    pub len: usize,
    pub text: String,
    pub scores: MetricScores,
    pub composite: f64,
}

/// Outcome of an assignment: one optional match per segment, and which units were claimed.
#[derive(Debug, Clone)]
pub(crate) struct Assignment {
    pub matches: Vec<Option<SpanMatch>>,
    pub claimed: Vec<bool>,
}

/// Whether a scored pair counts as the segment being present.
pub(crate) fn is_present(segment: &str, target: &str, composite: f64, presence: f64) -> bool {
    composite >= presence && shares_content(segment, target)
}

struct ScoredPair {
    segment: usize,
    start: usize,
    len: usize,
    scores: MetricScores,
    composite: f64,
}

fn best_first(a: &ScoredPair, b: &ScoredPair) -> Ordering {
    b.composite
        .total_cmp(&a.composite)
        .then(a.segment.cmp(&b.segment))
        .then(a.start.cmp(&b.start))
        .then(a.len.cmp(&b.len))
}

/// Assign each segment at most one span of up to `max_span` units.
pub(crate) fn assign(segments: &[String], units: &[String], max_span: usize, presence: f64) -> Assignment {
    let max_span = max_span.max(1);
    let prepared_segments: Vec<PreparedText> = segments.iter().map(|s| PreparedText::new(s)).collect();
    let prepared_units: Vec<PreparedText> = units.iter().map(|u| PreparedText::new(u)).collect();

    // anchored[s][u]: unit u carries some of segment s's vocabulary
    let anchored: Vec<Vec<bool>> = prepared_segments
        .iter()
        .map(|segment| prepared_units.iter().map(|unit| segment.shares_content(unit)).collect())
        .collect();

    let mut cache: Vec<HashMap<String, MetricScores>> = vec![HashMap::new(); segments.len()];
    let mut pairs = Vec::new();

    for start in 0..units.len() {
        let mut span_form = String::new();
        for len in 1..=max_span.min(units.len() - start) {
            let unit = start + len - 1;
            if !span_form.is_empty() && !prepared_units[unit].form.is_empty() {
                span_form.push(' ');
            }
            span_form.push_str(&prepared_units[unit].form);

            for (segment_index, segment) in prepared_segments.iter().enumerate() {
                if !anchored[segment_index][start..=unit].iter().all(|&a| a) {
                    continue;
                }
                let scores = match cache[segment_index].get(span_form.as_str()) {
                    Some(scores) => *scores,
                    None => {
                        let scores = score_forms(&segment.form, &span_form);
                        cache[segment_index].insert(span_form.clone(), scores);
                        scores
                    }
                };
                let composite = scores.composite();
                if composite >= presence {
                    pairs.push(ScoredPair {
                        segment: segment_index,
                        start,
                        len,
                        scores,
                        composite,
                    });
                }
            }
        }
    }
    pairs.sort_by(best_first);

    let mut matches: Vec<Option<SpanMatch>> = vec![None; segments.len()];
    let mut claimed = vec![false; units.len()];

    for pair in pairs {
        if matches[pair.segment].is_some() {
            continue;
        }
        let range = pair.start..pair.start + pair.len;
        if claimed[range.clone()].iter().any(|&c| c) {
            continue;
        }
        for c in &mut claimed[range.clone()] {
            *c = true;
        }
        matches[pair.segment] = Some(SpanMatch {
            start: pair.start,
            len: pair.len,
            text: units[range].join(" "),
            scores: pair.scores,
            composite: pair.composite,
        });
    }

    Assignment { matches, claimed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_matches_assigned_one_to_one() {
        let segments = strings(&["Do not take if pregnant.", "Consult your doctor."]);
        let units = strings(&["Consult your doctor.", "Do not take if pregnant."]);
        let result = assign(&segments, &units, 3, 40.0);

        let first = result.matches[0].as_ref().unwrap();
        let second = result.matches[1].as_ref().unwrap();
        assert_eq!((first.start, first.len), (1, 1));
        assert_eq!((second.start, second.len), (0, 1));
        assert_eq!(first.composite, 100.0);
        assert!(result.claimed.iter().all(|&c| c));
    }

    #[test]
    fn test_claimed_unit_not_reused() {
        let segments = strings(&["Consult your doctor.", "Consult your doctor."]);
        let units = strings(&["Consult your doctor."]);
        let result = assign(&segments, &units, 1, 40.0);
        assert!(result.matches[0].is_some());
        assert!(result.matches[1].is_none());
    }

    #[test]
    fn test_unrelated_text_not_present() {
        let segments = strings(&["Do not take if pregnant."]);
        let units = strings(&["Important Safety Information", "Buy our amazing product today!"]);
        let result = assign(&segments, &units, 3, 40.0);
        assert!(result.matches[0].is_none());
        assert!(result.claimed.iter().all(|&c| !c));
    }

    #[test]
    fn test_unrelated_unit_does_not_extend_span() {
        let segments = strings(&["Do not take if pregnant."]);
        let units = strings(&["Do not take if pregnant.", "Visit our website for coupons."]);
        let result = assign(&segments, &units, 3, 40.0);
        let matched = result.matches[0].as_ref().unwrap();
        assert_eq!((matched.start, matched.len), (0, 1));
        assert_eq!(result.claimed, vec![true, false]);
    }

    #[test]
    fn test_repeated_blocks_match_first_copy() {
        let segments = strings(&["Consult your doctor.", "Do not take if pregnant."]);
        let page = ["Do not take if pregnant.", "Consult your doctor."];
        let units: Vec<String> = page.iter().cycle().take(8).map(|s| s.to_string()).collect();
        let result = assign(&segments, &units, 3, 40.0);

        let first = result.matches[0].as_ref().unwrap();
        let second = result.matches[1].as_ref().unwrap();
        assert_eq!((first.start, first.len, first.composite), (1, 1, 100.0));
        assert_eq!((second.start, second.len, second.composite), (0, 1, 100.0));
        assert_eq!(result.claimed.iter().filter(|&&c| c).count(), 2);
    }

    #[test]
    fn test_segment_split_across_units() {
        let segments = strings(&["Stop taking and call your doctor right away if you notice yellowing of the skin."]);
        let units = strings(&["Stop taking and call your doctor", "right away if you notice yellowing of the skin."]);
        let result = assign(&segments, &units, 3, 40.0);
        let matched = result.matches[0].as_ref().unwrap();
        assert_eq!((matched.start, matched.len), (0, 2));
        assert_eq!(matched.composite, 100.0);
    }
}
