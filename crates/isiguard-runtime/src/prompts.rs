//! Prompts for the extraction and reasoning collaborators.
//!
//! System prompts are constant so providers can cache them. Everything
//! document-specific goes in the user turn.

use isiguard_core::{ComparisonSummary, IsiCandidate, OutputSchema};

/// Extraction: transcribe, never author.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You transcribe Important Safety Information (ISI) from pharmaceutical promotional material.

You receive one region of a document that a detector believes contains safety text.
Return the safety statements in that region, in reading order, exactly as written.

## Rules
1. Copy wording verbatim. Do not correct, paraphrase, summarize or complete sentences.
2. Include warnings, contraindications, precautions, side effects and instructions to consult a healthcare provider.
3. Leave out promotional content: benefits, offers, savings programs, slogans, calls to action.
4. One segment per sentence or bullet. Keep the region's order.
5. If the region contains no safety text, return an empty "segments" list.
6. confidence is how sure you are that the segment is safety text, from 0.0 to 1.0.

Every segment you return is checked against the region text. Anything not found there is discarded.

## Output
Respond with a single JSON object and nothing else, matching this JSON Schema:
"#;

/// Reasoning: interpret the measured comparison, do not re-measure it.
pub const REASONING_SYSTEM_PROMPT: &str = r#"
You review the result of comparing a document's Important Safety Information (ISI) against the approved text.

The comparison has already been measured. You receive scores (0-100), the approved segments that are missing,
text found in the safety section that the approved text does not contain, and word-level edits
(missing, added or changed words) between approved segments and the text they matched.

## Classes
- critical_omission: an approved safety statement is missing. Required whenever missing_content is not empty.
- formatting_difference: everything is present but wording, order or formatting differs.
- extraneous_content: text outside the approved ISI appears within it. Required whenever extra_content is not empty.
- compliant: faithful reproduction. Only on its own, and never with missing or extra content.

## Rules
1. Base every statement on the numbers and lists given. Do not invent content.
2. Explain in the rationale which safety concepts are affected and why the difference matters to a reviewer.
   Use the edits to name the words that differ.
3. A paraphrase that keeps the meaning is a formatting_difference, not an omission.

## Output
Respond with a single JSON object and nothing else, matching this JSON Schema:
"#;

pub fn extraction_system_prompt() -> String {
    format!("{}{}", EXTRACTION_SYSTEM_PROMPT.trim_start(), OutputSchema::Extraction.source())
}

pub fn reasoning_system_prompt() -> String {
    format!("{}{}", REASONING_SYSTEM_PROMPT.trim_start(), OutputSchema::Reasoning.source())
}

pub fn extraction_request(candidate: &IsiCandidate) -> String {
    format!(
        "Region from page {} (reading position {}):\n<region>\n{}\n</region>",
        candidate.page, candidate.order_rank, candidate.raw_text
    )
}

pub fn reasoning_request(summary: &ComparisonSummary) -> Result<String, serde_json::Error> {
    Ok(format!(
        "Comparison summary:\n{}",
        serde_json::to_string_pretty(summary)?
    ))
}
