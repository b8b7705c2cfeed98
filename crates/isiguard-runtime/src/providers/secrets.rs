//! Credential handling for LLM and layout services.
//!
//! Keys are wrapped in [`secrecy::SecretString`] the moment they are read.
//! `Debug` and `Display` print `[REDACTED]`; the value is only reachable
//! through [`ApiCredential::expose`], which callers use when setting a
//! request header and nowhere else.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use super::ProviderError;

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Config,
    Environment,
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A secret value plus where it came from.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        std::env::var(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .map_err(|_| {
                ProviderError::NotConfigured(format!(
                    "{} not set: configure '{}' environment variable",
                    name, env_var
                ))
            })
    }

    /// `config[config_key]` if present, else the environment variable.
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = config[config_key].as_str() {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }
        if let Ok(value) = std::env::var(env_var) {
            return Ok(Self::new(value, CredentialSource::Environment, name));
        }
        Err(ProviderError::NotConfigured(format!(
            "{} required: set '{}' in config or {} environment variable",
            name, config_key, env_var
        )))
    }

    pub fn is_available(config: &JsonValue, config_key: &str, env_var: &str) -> bool {
        config[config_key].as_str().is_some() || std::env::var(env_var).is_ok()
    }

    /// The raw value. Call at the point of use only.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

struct CredentialSpec {
    config_key: &'static str,
    env_var: &'static str,
    name: &'static str,
}

/// Loads several credentials at once, e.g. a key plus an endpoint.
///
/// ```ignore
/// let creds = CredentialBuilder::new()
///     .require("api_key", "AZURE_DOCUMENT_INTELLIGENCE_KEY", "Document Intelligence key")
///     .require("endpoint", "AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT", "Document Intelligence endpoint")
///     .build(&config)?;
/// ```
#[derive(Default)]
pub struct CredentialBuilder {
    required: Vec<CredentialSpec>,
    optional: Vec<CredentialSpec>,
}

impl CredentialBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, config_key: &'static str, env_var: &'static str, name: &'static str) -> Self {
        self.required.push(CredentialSpec {
            config_key,
            env_var,
            name,
        });
        self
    }

    pub fn optional(mut self, config_key: &'static str, env_var: &'static str, name: &'static str) -> Self {
        self.optional.push(CredentialSpec {
            config_key,
            env_var,
            name,
        });
        self
    }

    pub fn build(self, config: &JsonValue) -> Result<CredentialSet, ProviderError> {
        let mut credentials = BTreeMap::new();

        for spec in self.required {
            let cred = ApiCredential::from_config_or_env(config, spec.config_key, spec.env_var, spec.name)?;
            credentials.insert(spec.config_key, cred);
        }
        for spec in self.optional {
            if ApiCredential::is_available(config, spec.config_key, spec.env_var) {
                let cred = ApiCredential::from_config_or_env(config, spec.config_key, spec.env_var, spec.name)?;
                credentials.insert(spec.config_key, cred);
            }
        }

        Ok(CredentialSet { credentials })
    }
}

/// Credentials loaded by a [`CredentialBuilder`].
pub struct CredentialSet {
    credentials: BTreeMap<&'static str, ApiCredential>,
}

impl CredentialSet {
    pub fn get(&self, key: &str) -> Result<&ApiCredential, ProviderError> {
        self.credentials
            .get(key)
            .ok_or_else(|| ProviderError::NotConfigured(format!("Credential '{}' not found", key)))
    }

    pub fn get_optional(&self, key: &str) -> Option<&ApiCredential> {
        self.credentials.get(key)
    }

    /// Remove a credential, taking ownership of it.
    pub fn take(&mut self, key: &str) -> Result<ApiCredential, ProviderError> {
        self.credentials
            .remove(key)
            .ok_or_else(|| ProviderError::NotConfigured(format!("Credential '{}' not found", key)))
    }

    pub fn has(&self, key: &str) -> bool {
        self.credentials.contains_key(key)
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("keys", &self.credentials.keys().collect::<Vec<_>>())
            .finish()
    }
}
