//! ISI location detector.
//!
//! Walks layout elements in reading order and flags those that look like
//! safety text. Two signals are used:
//!
//! - **Lexical**: the element's best composite score against any
//!   ground-truth segment.
//! - **Structural**: the element sits inside a safety region (after a
//!   heading such as "Important Safety Information", until the next
//!   unrelated heading) or in page footers/footnotes, and is dense in
//!   regulatory vocabulary.
//!
//! Headings that open a region are anchors, not content. Each element
//! yields at most one candidate, so candidates never overlap. Finding
//! nothing is a valid outcome: [`DetectionOutcome::NoCandidatesFound`].

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::{ScoringConfig, Thresholds};
use crate::scoring::score_forms;
use crate::text::{split_segments, tokenize, PreparedText};
use crate::types::{reading_order, ElementRole, GroundTruth, IsiCandidate, LayoutElement};

lazy_static! {
    /// Headings that open a safety section.
    pub static ref ISI_HEADING: Regex = Regex::new(
        r"(?i)\b(important\s+safety\s+information|important\s+risk\s+information|safety\s+information|boxed\s+warning|warnings?(\s+and\s+precautions)?|precautions|contraindications?|adverse\s+(reactions|events)|side\s+effects|indications?(\s+and\s+usage)?|most\s+important\s+information|drug\s+interactions|use\s+in\s+specific\s+populations)\b"
    ).unwrap();
}

/// Vocabulary typical of regulatory safety language.
const REGULATORY_TERMS: &[&str] = &[
    "adverse", "allergic", "anaphylaxis", "bleeding", "boxed", "breastfeeding", "call",
    "contraindicated", "death", "discontinue", "doctor", "dosage", "dose", "effects", "fatal",
    "fda", "healthcare", "heart", "hepatotoxicity", "hypersensitivity", "infection", "infections",
    "kidney", "liver", "medication", "medications", "medicine", "monitor", "nursing", "overdose",
    "physician", "precautions", "pregnancy", "pregnant", "prescribing", "provider", "reaction",
    "reactions", "report", "risk", "risks", "seizures", "serious", "severe", "side", "stop",
    "stroke", "suicidal", "symptoms", "taking", "warning", "warnings",
];

/// Confidence assigned to elements flagged only by being in a safety region.
const REGION_CONFIDENCE: f64 = 0.6;

/// Confidence assigned to elements flagged only by being in a footer or footnote.
const MARGIN_CONFIDENCE: f64 = 0.5;

/// Longest unlabeled text, in words, still treated as a heading.
const MAX_HEADING_WORDS: usize = 8;

/// What the detector found.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Candidates(Vec<IsiCandidate>),
    NoCandidatesFound,
}

impl DetectionOutcome {
    pub fn candidates(&self) -> &[IsiCandidate] {
        match self {
            DetectionOutcome::Candidates(c) => c,
            DetectionOutcome::NoCandidatesFound => &[],
        }
    }

    pub fn into_candidates(self) -> Vec<IsiCandidate> {
        match self {
            DetectionOutcome::Candidates(c) => c,
            DetectionOutcome::NoCandidatesFound => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DetectionOutcome::NoCandidatesFound)
    }
}

/// Share of an element's tokens that are regulatory vocabulary.
pub fn regulatory_density(text: &str) -> f64 {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return 0.0;
    }
    let hits = tokens
        .iter()
        .filter(|t| REGULATORY_TERMS.contains(&t.as_str()))
        .count();
    hits as f64 / tokens.len() as f64
}

/// Whether an element is a heading that opens a safety section.
///
/// Unlabeled paragraphs count as headings only when short and unpunctuated.
pub fn is_isi_heading(element: &LayoutElement) -> bool {
    let looks_like_heading = match element.role {
        ElementRole::Title | ElementRole::SectionHeading => true,
        ElementRole::Paragraph => {
            let text = element.text.trim_end();
            text.split_whitespace().count() <= MAX_HEADING_WORDS
                && !text.ends_with(['.', '!', '?', ';'])
        }
        _ => false,
    };
    looks_like_heading && ISI_HEADING.is_match(&element.text)
}

/// Best composite score of any sentence of `text` against any ground-truth
/// segment it shares vocabulary with.
pub fn lexical_similarity(text: &str, ground_truth: &GroundTruth) -> f64 {
    best_similarity(text, &prepare(ground_truth))
}

fn prepare(ground_truth: &GroundTruth) -> Vec<PreparedText> {
    ground_truth.segments().iter().map(|s| PreparedText::new(s)).collect()
}

fn best_similarity(text: &str, segments: &[PreparedText]) -> f64 {
    let mut best: f64 = 0.0;
    for sentence in split_segments(text) {
        let sentence = PreparedText::new(&sentence);
        for segment in segments.iter().filter(|s| s.shares_content(&sentence)) {
            best = best.max(score_forms(&segment.form, &sentence.form).composite());
        }
    }
    best
}

/// The ISI location detector.
pub struct Detector {
    thresholds: Thresholds,
}

impl Detector {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            thresholds: config.thresholds,
        }
    }

    /// Flag candidate safety-text elements.
    ///
    /// The ground truth is a hint of expected phrasing; it is never used to
    /// fabricate text.
    pub fn detect(&self, elements: &[LayoutElement], ground_truth: &GroundTruth) -> DetectionOutcome {
        let segments = prepare(ground_truth);
        // Safety blocks repeat across pages; score each distinct text once
        let mut lexical_by_text: HashMap<&str, f64> = HashMap::new();
        let mut candidates = Vec::new();
        let mut in_region = false;

        for element in reading_order(elements) {
            let lexical = *lexical_by_text
                .entry(element.text.as_str())
                .or_insert_with(|| best_similarity(&element.text, &segments));
            let lexical_hit = lexical >= self.thresholds.detection;

            if is_isi_heading(element) {
                in_region = true;
                tracing::debug!(page = element.page, rank = element.order_rank, "Safety region opened");
                if lexical_hit {
                    candidates.push(self.candidate(element, lexical / 100.0));
                }
                continue;
            }

            if element.role.is_heading() {
                if in_region {
                    tracing::debug!(page = element.page, rank = element.order_rank, "Safety region closed");
                }
                in_region = false;
            }

            let structural = if in_region || element.role.is_margin() {
                let density = regulatory_density(&element.text);
                if density >= self.thresholds.region_density {
                    Some(if in_region { REGION_CONFIDENCE } else { MARGIN_CONFIDENCE })
                } else {
                    None
                }
            } else {
                None
            };

            if lexical_hit || structural.is_some() {
                let confidence = (lexical / 100.0).max(structural.unwrap_or(0.0));
                candidates.push(self.candidate(element, confidence));
            }
        }

        if candidates.is_empty() {
            tracing::info!(elements = elements.len(), "No ISI candidates found");
            DetectionOutcome::NoCandidatesFound
        } else {
            tracing::debug!(candidates = candidates.len(), "ISI candidates detected");
            DetectionOutcome::Candidates(candidates)
        }
    }

    fn candidate(&self, element: &LayoutElement, confidence: f64) -> IsiCandidate {
        IsiCandidate::new(element.page, element.order_rank, element.text.clone(), confidence)
    }
}
