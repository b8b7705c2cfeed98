//! Consolidation and deduplication of ISI candidates.
//!
//! Safety text is often repeated across pages (footer on every page, a
//! second pass of detection, an extractor transcription overlapping the raw
//! layout text). Consolidation turns all candidates into one ordered text:
//!
//! 1. Sort candidates by `(page, order_rank)`, stable.
//! 2. Walk the list. A candidate merges into a retained segment when their
//!    normalized similarity reaches the merge threshold, or when one text
//!    contains the other. The merged segment keeps the longer variant
//!    (ties: higher confidence) at the earlier position.
//! 3. Repeat until a pass merges nothing.
//!
//! The result is idempotent: consolidating its own segments is a no-op.

use crate::config::ScoringConfig;
use crate::scoring::metrics::ratio;
use crate::text::comparison_form;
use crate::types::{ConsolidatedIsi, IsiCandidate, IsiSegment};

/// Merges candidates into a [`ConsolidatedIsi`].
pub struct Consolidator {
    merge_threshold: f64,
}

impl Consolidator {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            merge_threshold: config.thresholds.dedup,
        }
    }

    /// Normalized similarity in `[0, 1]` used for merge decisions.
    pub fn similarity(a: &str, b: &str) -> f64 {
        ratio(&comparison_form(a), &comparison_form(b)) / 100.0
    }

    /// Whether two texts are duplicates of each other.
    pub fn is_duplicate(&self, a: &str, b: &str) -> bool {
        let form_a = comparison_form(a);
        let form_b = comparison_form(b);
        if form_a.is_empty() || form_b.is_empty() {
            return form_a == form_b;
        }
        if contains_words(&form_a, &form_b) || contains_words(&form_b, &form_a) {
            return true;
        }
        ratio(&form_a, &form_b) / 100.0 >= self.merge_threshold
    }

    /// Consolidate candidates into ordered, deduplicated segments.
    ///
    /// An empty input yields an empty result; callers report that as
    /// `NoCandidatesFound`.
    pub fn consolidate(&self, candidates: Vec<IsiCandidate>) -> ConsolidatedIsi {
        let mut sorted = candidates;
        sorted.sort_by_key(|c| (c.page, c.order_rank));

        let mut segments: Vec<IsiSegment> = sorted
            .into_iter()
            .filter(|c| !comparison_form(&c.raw_text).is_empty())
            .map(|c| IsiSegment {
                text: c.raw_text,
                page: c.page,
                order_rank: c.order_rank,
                confidence: c.confidence,
                origin: c.origin,
            })
            .collect();

        let mut duplicates_removed = 0;
        loop {
            let (merged, removed) = self.merge_pass(segments);
            segments = merged;
            duplicates_removed += removed;
            if removed == 0 {
                break;
            }
        }

        tracing::debug!(
            segments = segments.len(),
            duplicates_removed,
            "Candidates consolidated"
        );

        ConsolidatedIsi {
            segments,
            duplicates_removed,
        }
    }

    /// One walk over the segments. Returns the retained segments and how many merged away.
    fn merge_pass(&self, segments: Vec<IsiSegment>) -> (Vec<IsiSegment>, usize) {
        let mut retained: Vec<IsiSegment> = Vec::with_capacity(segments.len());
        let mut removed = 0;

        for segment in segments {
            // The last retained segment is the common case: repeats are adjacent.
            let target = retained
                .iter()
                .rposition(|kept| self.is_duplicate(&kept.text, &segment.text));

            match target {
                Some(index) => {
                    let kept = &mut retained[index];
                    if prefer(&segment, kept) {
                        kept.text = segment.text;
                        kept.confidence = segment.confidence;
                        kept.origin = segment.origin;
                    }
                    removed += 1;
                }
                None => retained.push(segment),
            }
        }

        (retained, removed)
    }
}

impl Default for Consolidator {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

/// Whether `needle` occurs in `haystack` on word boundaries.
fn contains_words(haystack: &str, needle: &str) -> bool {
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

/// Whether `candidate` should replace `kept` as the text of a merged segment.
/// Position (page, order_rank) always stays with the earlier segment.
fn prefer(candidate: &IsiSegment, kept: &IsiSegment) -> bool {
    let candidate_len = comparison_form(&candidate.text).len();
    let kept_len = comparison_form(&kept.text).len();
    candidate_len > kept_len || (candidate_len == kept_len && candidate.confidence > kept.confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn consolidator() -> Consolidator {
        Consolidator::default()
    }

    #[test]
    fn test_empty_input() {
        let result = consolidator().consolidate(vec![]);
        assert!(result.is_empty());
        assert_eq!(result.duplicates_removed, 0);
    }

    #[test]
    fn test_full_duplicates_collapse() {
        let candidates = vec![
            IsiCandidate::new(1, 5, "Do not take if pregnant.", 0.9),
            IsiCandidate::new(2, 5, "Do not take if pregnant.", 0.8),
            IsiCandidate::new(3, 5, "do not take if PREGNANT", 0.7),
        ];
        let result = consolidator().consolidate(candidates);
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.duplicates_removed, 2);
        assert_eq!(result.segments[0].page, 1);
    }

    #[test]
    fn test_substring_counts_as_merge() {
        let candidates = vec![
            IsiCandidate::new(1, 0, "Consult your doctor.", 0.9),
            IsiCandidate::new(2, 0, "Do not take if pregnant. Consult your doctor.", 0.6),
        ];
        let result = consolidator().consolidate(candidates);
        assert_eq!(result.segments.len(), 1);
        // Longer variant wins, earlier position kept
        assert_eq!(result.segments[0].text, "Do not take if pregnant. Consult your doctor.");
        assert_eq!(result.segments[0].page, 1);
    }

    #[test]
    fn test_distinct_segments_kept_in_reading_order() {
        let candidates = vec![
            IsiCandidate::new(2, 0, "Consult your doctor.", 0.9),
            IsiCandidate::new(1, 3, "Do not take if pregnant.", 0.9),
        ];
        let result = consolidator().consolidate(candidates);
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[0].text, "Do not take if pregnant.");
        assert_eq!(result.segments[1].text, "Consult your doctor.");
    }

    #[test]
    fn test_near_duplicate_keeps_higher_confidence_on_tie() {
        let candidates = vec![
            IsiCandidate::new(1, 0, "Serious liver problems can occur", 0.5),
            IsiCandidate::new(1, 1, "Serious liver problems can occvr", 0.9),
        ];
        let result = consolidator().consolidate(candidates);
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].text, "Serious liver problems can occvr");
        assert_eq!(result.segments[0].order_rank, 0);
    }

    #[test]
    fn test_non_adjacent_duplicate_merges() {
        let candidates = vec![
            IsiCandidate::new(1, 0, "Do not take if pregnant.", 0.9),
            IsiCandidate::new(1, 1, "Consult your doctor.", 0.9),
            IsiCandidate::new(2, 0, "Do not take if pregnant.", 0.9),
        ];
        let result = consolidator().consolidate(candidates);
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.duplicates_removed, 1);
    }

    #[test]
    fn test_consolidation_is_idempotent() {
        let candidates = vec![
            IsiCandidate::new(1, 0, "Warnings: liver damage may occur.", 0.7),
            IsiCandidate::new(1, 1, "Consult your doctor.", 0.9),
            IsiCandidate::new(2, 0, "Warnings: liver damage may occur. Consult your doctor.", 0.8),
        ];
        let once = consolidator().consolidate(candidates);
        let twice = consolidator().consolidate(once.to_candidates());
        assert_eq!(once.segments, twice.segments);
        assert_eq!(twice.duplicates_removed, 0);
    }

    #[test]
    fn test_similarity_is_case_and_space_insensitive() {
        assert_eq!(Consolidator::similarity("Consult  your DOCTOR", "consult your doctor."), 1.0);
    }

    fn arb_candidate() -> impl Strategy<Value = IsiCandidate> {
        let phrases = prop::sample::select(vec![
            "Do not take if pregnant.",
            "Consult your doctor.",
            "Liver problems may occur.",
            "Stop taking and call your doctor.",
            "Do not take if pregnant. Consult your doctor.",
            "Serious allergic reactions can happen",
        ]);
        (1u32..4, 0u32..6, phrases, 0.0f64..1.0)
            .prop_map(|(page, rank, text, conf)| IsiCandidate::new(page, rank, text, conf))
    }

    proptest! {
        #[test]
        fn prop_consolidation_idempotent(candidates in prop::collection::vec(arb_candidate(), 0..12)) {
            let c = consolidator();
            let once = c.consolidate(candidates);
            let twice = c.consolidate(once.to_candidates());
            prop_assert_eq!(&once.segments, &twice.segments);
        }

        #[test]
        fn prop_no_retained_near_duplicates(candidates in prop::collection::vec(arb_candidate(), 0..12)) {
            let c = consolidator();
            let result = c.consolidate(candidates);
            for (i, a) in result.segments.iter().enumerate() {
                for b in result.segments.iter().skip(i + 1) {
                    prop_assert!(!c.is_duplicate(&a.text, &b.text));
                }
            }
        }

        #[test]
        fn prop_reading_order_non_decreasing(candidates in prop::collection::vec(arb_candidate(), 0..12)) {
            let result = consolidator().consolidate(candidates);
            for pair in result.segments.windows(2) {
                prop_assert!((pair[0].page, pair[0].order_rank) <= (pair[1].page, pair[1].order_rank));
            }
        }
    }
}
