//! Scoring configuration: thresholds and the path combination policy.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// How the global and precision path aggregates become one composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CombinePolicy {
    /// Arithmetic mean of the two paths
    Average,
    /// The weaker path decides
    Minimum,
    /// `global_weight * global + (1 - global_weight) * precision`
    Weighted { global_weight: f64 },
}

/// The combination policy used unless configured otherwise.
pub const DEFAULT_COMBINE_POLICY: CombinePolicy = CombinePolicy::Average;

impl Default for CombinePolicy {
    fn default() -> Self {
        DEFAULT_COMBINE_POLICY
    }
}

impl CombinePolicy {
    pub fn combine(&self, global: f64, precision: f64) -> f64 {
        let combined = match self {
            CombinePolicy::Average => (global + precision) / 2.0,
            CombinePolicy::Minimum => global.min(precision),
            CombinePolicy::Weighted { global_weight } => {
                global_weight * global + (1.0 - global_weight) * precision
            }
        };
        combined.clamp(0.0, 100.0)
    }
}

impl std::fmt::Display for CombinePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CombinePolicy::Average => write!(f, "average"),
            CombinePolicy::Minimum => write!(f, "minimum"),
            CombinePolicy::Weighted { global_weight } => {
                write!(f, "weighted (global {:.2})", global_weight)
            }
        }
    }
}

/// Decision thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Consolidation merge threshold on normalized similarity (0.0 - 1.0)
    pub dedup: f64,

    /// Minimum composite for a ground-truth segment to count as present
    pub presence: f64,

    /// Composite below which the document is critically deficient
    pub critical: f64,

    /// Composite at or above which wording counts as faithful
    pub pass: f64,

    /// Minimum lexical similarity for the detector to flag an element
    pub detection: f64,

    /// Share of regulatory vocabulary that flags an element inside a safety region
    pub region_density: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            dedup: 0.85,
            presence: 40.0,
            critical: 60.0,
            pass: 90.0,
            detection: 55.0,
            region_density: 0.08,
        }
    }
}

/// Configuration of the deterministic pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub thresholds: Thresholds,

    pub combine: CombinePolicy,

    /// Longest run of document sentences the global path may match to one segment
    pub max_span_sentences: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            combine: DEFAULT_COMBINE_POLICY,
            max_span_sentences: 3,
        }
    }
}

impl ScoringConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: ScoringConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ScoringConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Check ranges and ordering of thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;

        if !(0.0..=1.0).contains(&t.dedup) {
            return Err(ConfigError::ValidationError(format!(
                "thresholds.dedup must be within [0, 1], got {}",
                t.dedup
            )));
        }
        if !(0.0..=1.0).contains(&t.region_density) {
            return Err(ConfigError::ValidationError(format!(
                "thresholds.region_density must be within [0, 1], got {}",
                t.region_density
            )));
        }
        for (name, value) in [
            ("presence", t.presence),
            ("critical", t.critical),
            ("pass", t.pass),
            ("detection", t.detection),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "thresholds.{} must be within [0, 100], got {}",
                    name, value
                )));
            }
        }
        if t.critical > t.pass {
            return Err(ConfigError::ValidationError(format!(
                "thresholds.critical ({}) must not exceed thresholds.pass ({})",
                t.critical, t.pass
            )));
        }
        if self.max_span_sentences == 0 {
            return Err(ConfigError::ValidationError(
                "max_span_sentences must be at least 1".to_string(),
            ));
        }
        if let CombinePolicy::Weighted { global_weight } = self.combine {
            if !(0.0..=1.0).contains(&global_weight) {
                return Err(ConfigError::ValidationError(format!(
                    "combine.global_weight must be within [0, 1], got {}",
                    global_weight
                )));
            }
        }
        Ok(())
    }
}
