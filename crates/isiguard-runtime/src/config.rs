//! Runtime configuration: collaborator timeouts, retries, budgets and
//! provider selection.
//!
//! Durations are written the human way (`"30s"`, `"500ms"`, `"2m"`).
//!
//! ```yaml
//! scoring:
//!   thresholds:
//!     critical: 60.0
//!   combine:
//!     policy: average
//! runtime:
//!   timeouts:
//!     extraction: 45s
//!   retry:
//!     max_attempts: 3
//!   provider:
//!     type: anthropic
//!     model: claude-sonnet-4-5
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use isiguard_core::{ConfigError, ScoringConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::pipeline::Collaborator;
use crate::resilience::CircuitBreakerConfig;

/// Serde adapter for durations written as `humantime` strings.
pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

/// Per-collaborator call timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "duration_str")]
    pub layout: Duration,

    #[serde(with = "duration_str")]
    pub extraction: Duration,

    #[serde(with = "duration_str")]
    pub reasoning: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            layout: Duration::from_secs(120),
            extraction: Duration::from_secs(45),
            reasoning: Duration::from_secs(45),
        }
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,

    #[serde(with = "duration_str")]
    pub initial_delay: Duration,

    #[serde(with = "duration_str")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Token budgets for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub global_max_tokens: u32,
    pub extraction_max_tokens: u32,
    pub reasoning_max_tokens: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            global_max_tokens: 60_000,
            extraction_max_tokens: 48_000,
            reasoning_max_tokens: 12_000,
        }
    }
}

/// Which LLM provider backs the extraction and reasoning agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSelection {
    /// Registry type name, e.g. `"anthropic"`
    #[serde(rename = "type")]
    pub provider_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Passed to the provider factory as-is
    #[serde(flatten)]
    pub settings: serde_json::Map<String, JsonValue>,
}

fn default_max_tokens() -> u32 {
    2000
}

impl ProviderSelection {
    pub fn new(provider_type: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            model: None,
            max_tokens: default_max_tokens(),
            settings: serde_json::Map::new(),
        }
    }

    /// The JSON block handed to the provider factory.
    pub fn factory_config(&self) -> JsonValue {
        let mut config = self.settings.clone();
        if let Some(model) = &self.model {
            config.insert("model".to_string(), JsonValue::String(model.clone()));
        }
        JsonValue::Object(config)
    }
}

/// Layout provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// Plain text or markdown, read locally
    #[default]
    Text,
    /// Azure Document Intelligence `prebuilt-layout`
    Azure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LayoutSelection {
    pub kind: LayoutKind,

    /// `endpoint`, `api_key`, `api_version` for Azure
    pub settings: serde_json::Map<String, JsonValue>,
}

/// Configuration of the async pipeline around the deterministic core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub timeouts: Timeouts,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub budgets: BudgetConfig,

    /// Candidate regions extracted at once
    pub extraction_concurrency: usize,

    /// No provider means detector text and deterministic classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderSelection>,

    pub layout: LayoutSelection,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            budgets: BudgetConfig::default(),
            extraction_concurrency: 4,
            provider: None,
            layout: LayoutSelection::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn timeout(&self, collaborator: Collaborator) -> Duration {
        match collaborator {
            Collaborator::Layout => self.timeouts.layout,
            Collaborator::Extraction => self.timeouts.extraction,
            Collaborator::Reasoning => self.timeouts.reasoning,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(ConfigError::ValidationError(format!(
                "retry.initial_delay ({}) exceeds retry.max_delay ({})",
                humantime::format_duration(self.retry.initial_delay),
                humantime::format_duration(self.retry.max_delay)
            )));
        }
        if self.extraction_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "extraction_concurrency must be at least 1".to_string(),
            ));
        }
        for (name, timeout) in [
            ("layout", self.timeouts.layout),
            ("extraction", self.timeouts.extraction),
            ("reasoning", self.timeouts.reasoning),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::ValidationError(format!("timeouts.{} must be non-zero", name)));
            }
        }
        if self.circuit_breaker.failure_threshold == 0 || self.circuit_breaker.success_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "circuit breaker thresholds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Scoring and runtime sections of one configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VerifierConfig {
    pub scoring: ScoringConfig,
    pub runtime: RuntimeConfig,
}

impl VerifierConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: VerifierConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        self.runtime.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isiguard_core::CombinePolicy;

    #[test]
    fn test_defaults_are_valid() {
        assert!(VerifierConfig::default().validate().is_ok());
    }

    #[test]
    fn test_human_durations() {
        let config = VerifierConfig::from_yaml(
            r#"
runtime:
  timeouts:
    extraction: 1m 30s
    reasoning: 500ms
  retry:
    initial_delay: 250ms
    max_delay: 4s
  circuit_breaker:
    recovery_timeout: 10s
"#,
        )
        .unwrap();

        let runtime = config.runtime;
        assert_eq!(runtime.timeouts.extraction, Duration::from_secs(90));
        assert_eq!(runtime.timeouts.reasoning, Duration::from_millis(500));
        assert_eq!(runtime.timeouts.layout, Duration::from_secs(120));
        assert_eq!(runtime.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(runtime.circuit_breaker.recovery_timeout, Duration::from_secs(10));
        assert_eq!(runtime.timeout(Collaborator::Reasoning), Duration::from_millis(500));
    }

    #[test]
    fn test_scoring_and_provider_sections() {
        let config = VerifierConfig::from_yaml(
            r#"
scoring:
  combine:
    policy: minimum
runtime:
  provider:
    type: openai
    model: gpt-4o
    azure_endpoint: https://contoso.openai.azure.com
    deployment: isi
"#,
        )
        .unwrap();

        assert_eq!(config.scoring.combine, CombinePolicy::Minimum);
        let provider = config.runtime.provider.unwrap();
        assert_eq!(provider.provider_type, "openai");
        assert_eq!(provider.max_tokens, 2000);

        let factory = provider.factory_config();
        assert_eq!(factory["model"], "gpt-4o");
        assert_eq!(factory["deployment"], "isi");
    }

    #[test]
    fn test_bad_duration_is_rejected() {
        let result = VerifierConfig::from_yaml("runtime:\n  timeouts:\n    layout: soon\n");
        assert!(matches!(result, Err(ConfigError::YamlError(_))));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = VerifierConfig::default();
        config.runtime.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = VerifierConfig::default();
        config.runtime.extraction_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = VerifierConfig::default();
        config.scoring.thresholds.pass = 10.0;
        assert!(config.validate().is_err());
    }
}
