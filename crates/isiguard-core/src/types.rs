//! Core types for isiguard verification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CombinePolicy;
use crate::scoring::MetricScores;
use crate::text::{comparison_form, normalize, split_segments};

// ============================================================================
// Layout
// ============================================================================

/// Structural role of a layout element, as reported by the layout provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ElementRole {
    Title,
    SectionHeading,
    PageHeader,
    PageFooter,
    PageNumber,
    Footnote,
    TableCell,
    #[default]
    #[serde(other)]
    Paragraph,
}

impl ElementRole {
    pub fn is_heading(&self) -> bool {
        matches!(self, ElementRole::Title | ElementRole::SectionHeading)
    }

    /// Page furniture where safety text is often relegated.
    pub fn is_margin(&self) -> bool {
        matches!(self, ElementRole::PageFooter | ElementRole::Footnote)
    }
}

/// Where an element sits on its page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    /// 1-based page number
    pub page: u32,

    /// Flattened polygon: x1, y1, x2, y2, ...
    #[serde(default)]
    pub polygon: Vec<f64>,
}

/// A unit of text from the target document. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutElement {
    /// 1-based page number
    pub page: u32,

    /// Position in reading order, unique within the document
    pub order_rank: u32,

    /// Raw text as extracted
    pub text: String,

    #[serde(default)]
    pub role: ElementRole,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_region: Option<BoundingRegion>,
}

impl LayoutElement {
    /// A plain paragraph element.
    pub fn paragraph(page: u32, order_rank: u32, text: impl Into<String>) -> Self {
        Self::with_role(page, order_rank, text, ElementRole::Paragraph)
    }

    pub fn with_role(page: u32, order_rank: u32, text: impl Into<String>, role: ElementRole) -> Self {
        Self {
            page,
            order_rank,
            text: text.into(),
            role,
            bounding_region: None,
        }
    }
}

/// Layout elements sorted into reading order.
pub fn reading_order(elements: &[LayoutElement]) -> Vec<&LayoutElement> {
    let mut ordered: Vec<&LayoutElement> = elements.iter().collect();
    ordered.sort_by_key(|e| (e.page, e.order_rank));
    ordered
}

// ============================================================================
// Ground truth
// ============================================================================

/// The approved safety text, as normalized sentence-level segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GroundTruth {
    segments: Vec<String>,
}

impl GroundTruth {
    /// Segment and normalize raw ground-truth text.
    pub fn from_text(text: &str) -> Self {
        Self {
            segments: split_segments(text),
        }
    }

    /// Use pre-split segments. Each is normalized; segments without words are dropped.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(|s| normalize(s.as_ref()))
                .filter(|s| !comparison_form(s).is_empty())
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn full_text(&self) -> String {
        self.segments.join(" ")
    }
}

// ============================================================================
// Candidates and consolidation
// ============================================================================

/// Which stage produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    /// Located by the detector, text taken verbatim from layout
    Detector,
    /// Transcribed by the extraction collaborator and grounded against the region
    Extractor,
    /// Extraction failed; detector text used as-is
    RawFallback,
}

/// A span believed to be part of the safety text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsiCandidate {
    pub page: u32,
    pub order_rank: u32,
    pub raw_text: String,

    /// Detector or extractor confidence, 0.0 - 1.0
    pub confidence: f64,

    pub origin: CandidateOrigin,
}

impl IsiCandidate {
    pub fn new(page: u32, order_rank: u32, raw_text: impl Into<String>, confidence: f64) -> Self {
        Self {
            page,
            order_rank,
            raw_text: raw_text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            origin: CandidateOrigin::Detector,
        }
    }

    pub fn with_origin(mut self, origin: CandidateOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// One retained segment of the consolidated safety text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsiSegment {
    pub text: String,

    /// Provenance: where the retained variant came from
    pub page: u32,
    pub order_rank: u32,
    pub confidence: f64,
    pub origin: CandidateOrigin,
}

/// Ordered, deduplicated safety text assembled from candidates.
///
/// Segments are in non-decreasing reading order and no two of them are
/// near-duplicates. Consolidating the segments again changes nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConsolidatedIsi {
    pub segments: Vec<IsiSegment>,

    /// How many candidates were merged away
    pub duplicates_removed: usize,
}

impl ConsolidatedIsi {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Full text, one segment per paragraph.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Sentence-level units for alignment against ground truth.
    pub fn sentences(&self) -> Vec<String> {
        self.segments
            .iter()
            .flat_map(|s| split_segments(&s.text))
            .collect()
    }

    /// The segments as candidates, for feeding back through consolidation.
    pub fn to_candidates(&self) -> Vec<IsiCandidate> {
        self.segments
            .iter()
            .map(|s| IsiCandidate {
                page: s.page,
                order_rank: s.order_rank,
                raw_text: s.text.clone(),
                confidence: s.confidence,
                origin: s.origin,
            })
            .collect()
    }
}

// ============================================================================
// Comparison
// ============================================================================

/// The two independent comparison strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonPath {
    /// Presence scan over the whole document
    Global,
    /// Alignment of the consolidated safety text
    Precision,
}

impl std::fmt::Display for ComparisonPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComparisonPath::Global => write!(f, "global"),
            ComparisonPath::Precision => write!(f, "precision"),
        }
    }
}

/// A word-level difference between a ground-truth segment and its match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edit {
    /// Approved words absent from the document
    Missing { text: String },
    /// Document words the approved text does not have
    Added { text: String },
    Changed { from: String, to: String },
}

impl std::fmt::Display for Edit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edit::Missing { text } => write!(f, "missing: '{}'", text),
            Edit::Added { text } => write!(f, "added: '{}'", text),
            Edit::Changed { from, to } => write!(f, "changed: '{}' -> '{}'", from, to),
        }
    }
}

/// How one ground-truth segment fared on a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMatch {
    pub ground_truth: String,

    /// Best adequate match, if any
    pub matched_text: Option<String>,

    /// Metric scores against the match; all zero when unmatched
    pub scores: MetricScores,

    /// Weighted composite; 0 when unmatched
    pub composite: f64,

    /// Word-level differences to the match; empty when unmatched or exact
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edits: Vec<Edit>,
}

impl SegmentMatch {
    pub fn is_present(&self) -> bool {
        self.matched_text.is_some()
    }
}

/// Result of one comparison path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub path: ComparisonPath,

    /// Mean of per-segment composites
    pub score: f64,

    /// Per-metric means over ground-truth segments
    pub metrics: MetricScores,

    pub segments: Vec<SegmentMatch>,

    /// Target text matched to some ground-truth segment
    pub matched: Vec<String>,

    /// Ground-truth segments without an adequate match
    pub missing: Vec<String>,

    /// Target text in the safety region with no ground-truth counterpart
    pub extra: Vec<String>,
}

// ============================================================================
// Verdict
// ============================================================================

/// Severity classes assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityClass {
    /// A safety concept is missing
    CriticalOmission,
    /// Content present but worded or formatted differently
    FormattingDifference,
    /// Material in the safety text that the approved text lacks
    ExtraneousContent,
    /// Faithful reproduction
    Compliant,
}

impl std::fmt::Display for SeverityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeverityClass::CriticalOmission => write!(f, "critical_omission"),
            SeverityClass::FormattingDifference => write!(f, "formatting_difference"),
            SeverityClass::ExtraneousContent => write!(f, "extraneous_content"),
            SeverityClass::Compliant => write!(f, "compliant"),
        }
    }
}

/// Who produced the severity classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningSource {
    Deterministic,
    Collaborator,
}

/// Aggregate score of each comparison path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathScores {
    pub global: f64,
    pub precision: f64,
}

/// Severity classes plus explanation, from either the deterministic rules
/// or a validated reasoning collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub severity_classes: Vec<SeverityClass>,
    pub rationale: String,
    pub source: ReasoningSource,
}

/// Final compliance verdict. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    /// 0 - 100
    pub composite_score: f64,
    pub per_path_scores: PathScores,
    pub missing_content: Vec<String>,
    pub extra_content: Vec<String>,

    /// Word-level differences in the safety text that was found
    #[serde(default)]
    pub edits: Vec<Edit>,

    pub severity_classes: Vec<SeverityClass>,
    pub rationale: String,

    /// The detector found no safety region
    pub no_candidates_found: bool,

    pub reasoning_source: ReasoningSource,
    pub combine_policy: CombinePolicy,
    pub evaluated_at: DateTime<Utc>,
}

impl ComplianceVerdict {
    pub fn is_compliant(&self) -> bool {
        self.severity_classes == [SeverityClass::Compliant]
    }
}
