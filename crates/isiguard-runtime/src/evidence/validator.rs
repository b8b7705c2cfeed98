//! Referential integrity of extracted segments against their source region.

use isiguard_core::schema::ExtractedSegment;
use isiguard_core::scoring::metrics;
use isiguard_core::text::comparison_form;
use thiserror::Error;

/// Minimum substring similarity between a segment and its region.
pub const MIN_GROUNDING_SIMILARITY: f64 = 80.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GroundingError {
    #[error("segment {index} has no words")]
    EmptySegment { index: usize },

    #[error("segment {index} is longer than its region ({segment_words} words vs {region_words})")]
    LongerThanRegion {
        index: usize,
        segment_words: usize,
        region_words: usize,
    },

    #[error("segment {index} not found in region (similarity {similarity:.1}): '{segment}'")]
    NotInRegion {
        index: usize,
        segment: String,
        similarity: f64,
    },
}

/// Checks that extracted segments occur in the region text.
///
/// A segment passes when its comparison form is no longer than the
/// region's and aligns against some stretch of it with partial similarity
/// of at least [`MIN_GROUNDING_SIMILARITY`]. OCR-level noise passes;
/// added sentences and rewrites do not.
pub struct GroundingValidator {
    region: String,
    region_words: usize,
    min_similarity: f64,
}

impl GroundingValidator {
    pub fn new(region_text: &str) -> Self {
        let region = comparison_form(region_text);
        let region_words = region.split_whitespace().count();
        Self {
            region,
            region_words,
            min_similarity: MIN_GROUNDING_SIMILARITY,
        }
    }

    pub fn with_min_similarity(mut self, min_similarity: f64) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub fn validate(&self, index: usize, segment: &ExtractedSegment) -> Result<(), GroundingError> {
        let form = comparison_form(&segment.text);
        if form.is_empty() {
            return Err(GroundingError::EmptySegment { index });
        }

        let segment_words = form.split_whitespace().count();
        if segment_words > self.region_words {
            return Err(GroundingError::LongerThanRegion {
                index,
                segment_words,
                region_words: self.region_words,
            });
        }

        let similarity = metrics::partial(&form, &self.region);
        if similarity < self.min_similarity {
            return Err(GroundingError::NotInRegion {
                index,
                segment: segment.text.clone(),
                similarity,
            });
        }
        Ok(())
    }

    /// Validate every segment; stops at the first failure.
    pub fn validate_all(&self, segments: &[ExtractedSegment]) -> Result<(), GroundingError> {
        segments
            .iter()
            .enumerate()
            .try_for_each(|(index, segment)| self.validate(index, segment))
    }
}
