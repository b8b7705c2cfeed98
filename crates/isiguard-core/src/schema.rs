//! Structured-output schemas for the extraction and reasoning collaborators.
//!
//! Collaborator output is accepted only as a typed record that has passed
//! its JSON Schema. Anything else is rejected whole, never parsed
//! best-effort.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SeverityClass;

/// Embedded schemas (loaded at compile time).
pub const EXTRACTION_SCHEMA_JSON: &str = include_str!("../schemas/extraction.schema.json");
pub const REASONING_SCHEMA_JSON: &str = include_str!("../schemas/reasoning.schema.json");

static EXTRACTION_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
static REASONING_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

/// Which collaborator output a schema describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSchema {
    Extraction,
    Reasoning,
}

impl OutputSchema {
    pub fn source(self) -> &'static str {
        match self {
            OutputSchema::Extraction => EXTRACTION_SCHEMA_JSON,
            OutputSchema::Reasoning => REASONING_SCHEMA_JSON,
        }
    }

    fn validator(self) -> Result<&'static jsonschema::Validator, SchemaError> {
        let cell = match self {
            OutputSchema::Extraction => &EXTRACTION_SCHEMA,
            OutputSchema::Reasoning => &REASONING_SCHEMA,
        };
        let result = cell.get_or_init(|| {
            let schema_value: serde_json::Value = match serde_json::from_str(self.source()) {
                Ok(v) => v,
                Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
            };

            match jsonschema::options().build(&schema_value) {
                Ok(v) => Ok(v),
                Err(e) => Err(format!("Failed to compile schema: {}", e)),
            }
        });

        match result {
            Ok(v) => Ok(v),
            Err(e) => Err(SchemaError::LoadError(e.clone())),
        }
    }

    /// Validate a JSON value. Returns every violation found.
    pub fn validate(self, value: &serde_json::Value) -> Result<(), Vec<String>> {
        let validator = self.validator().map_err(|e| vec![e.to_string()])?;

        let errors: Vec<String> = validator
            .iter_errors(value)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn is_valid(self, value: &serde_json::Value) -> bool {
        self.validator()
            .map(|v| v.is_valid(value))
            .unwrap_or(false)
    }
}

/// One transcribed segment of safety text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSegment {
    pub text: String,
    pub confidence: f64,
}

/// Extraction collaborator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub segments: Vec<ExtractedSegment>,
}

/// Reasoning collaborator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningOutput {
    pub severity_classes: Vec<SeverityClass>,
    pub rationale: String,
}

/// Parse collaborator text into a typed record: JSON, then schema, then type.
fn parse_typed<T: serde::de::DeserializeOwned>(schema: OutputSchema, text: &str) -> Result<T, Vec<String>> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| vec![format!("not valid JSON: {}", e)])?;
    schema.validate(&value)?;
    serde_json::from_value(value).map_err(|e| vec![format!("does not match record type: {}", e)])
}

pub fn parse_extraction(text: &str) -> Result<ExtractionOutput, Vec<String>> {
    parse_typed(OutputSchema::Extraction, text)
}

pub fn parse_reasoning(text: &str) -> Result<ReasoningOutput, Vec<String>> {
    parse_typed(OutputSchema::Reasoning, text)
}
