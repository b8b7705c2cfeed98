//! OpenAI chat completions provider, including Azure OpenAI deployments.
//!
//! With `azure_endpoint` set, requests go to
//! `{endpoint}/openai/deployments/{deployment}/chat/completions` with an
//! `api-key` header. Otherwise they go to the public API with a bearer token.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const AZURE_OPENAI_ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    OpenAi {
        base_url: String,
    },
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

/// OpenAI or Azure OpenAI chat client.
pub struct OpenAiProvider {
    credential: ApiCredential,
    endpoint: Endpoint,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            credential: ApiCredential::new(api_key, CredentialSource::Programmatic, "OpenAI API key"),
            endpoint: Endpoint::OpenAi {
                base_url: DEFAULT_BASE_URL.to_string(),
            },
            client: http_client()?,
        })
    }

    /// Build from config. Keys: `api_key`, `base_url`, `azure_endpoint`,
    /// `deployment`, `api_version`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential =
            ApiCredential::from_config_or_env(config, "api_key", OPENAI_API_KEY_ENV, "OpenAI API key")?;

        let azure_endpoint = config["azure_endpoint"]
            .as_str()
            .map(str::to_string)
            .or_else(|| std::env::var(AZURE_OPENAI_ENDPOINT_ENV).ok());

        let endpoint = match azure_endpoint {
            Some(endpoint) => {
                let deployment = config["deployment"].as_str().ok_or_else(|| {
                    ProviderError::NotConfigured("Azure OpenAI requires 'deployment'".to_string())
                })?;
                Endpoint::Azure {
                    endpoint: endpoint.trim_end_matches('/').to_string(),
                    deployment: deployment.to_string(),
                    api_version: config["api_version"]
                        .as_str()
                        .unwrap_or(DEFAULT_AZURE_API_VERSION)
                        .to_string(),
                }
            }
            None => Endpoint::OpenAi {
                base_url: config["base_url"].as_str().unwrap_or(DEFAULT_BASE_URL).to_string(),
            },
        };

        Ok(Self {
            credential,
            endpoint,
            client: http_client()?,
        })
    }

    fn url(&self) -> String {
        match &self.endpoint {
            Endpoint::OpenAi { base_url } => format!("{}/chat/completions", base_url),
            Endpoint::Azure {
                endpoint,
                deployment,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint, deployment, api_version
            ),
        }
    }
}

fn http_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .map_err(|e| ProviderError::HttpError(format!("failed to build HTTP client: {}", e)))
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = ChatRequest {
            model: &config.model,
            messages: &messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            response_format: config.json_mode.then_some(ResponseFormat { r#type: "json_object" }),
        };

        let builder = self.client.post(self.url()).timeout(config.timeout).json(&request);
        let builder = match self.endpoint {
            Endpoint::OpenAi { .. } => builder.bearer_auth(self.credential.expose()),
            Endpoint::Azure { .. } => builder.header("api-key", self.credential.expose()),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(config.timeout)
            } else {
                ProviderError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let message = match response.json::<OpenAiError>().await {
                Ok(body) => body.error.message,
                Err(e) => format!("unreadable error body: {}", e),
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: TokenUsage {
                prompt_tokens: body.usage.prompt_tokens,
                completion_tokens: body.usage.completion_tokens,
                ..Default::default()
            },
            model: body.model,
            stop_reason: choice.finish_reason,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        match self.endpoint {
            Endpoint::OpenAi { .. } => "openai",
            Endpoint::Azure { .. } => "azure-openai",
        }
    }
}

/// Builds [`OpenAiProvider`]s.
///
/// ```json
/// {
///   "api_key": "sk-...",
///   "azure_endpoint": "https://my-resource.openai.azure.com",
///   "deployment": "gpt-4o",
///   "api_version": "2024-10-21"
/// }
/// ```
pub struct OpenAiProviderFactory;

impl ProviderFactory for OpenAiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "openai"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(OpenAiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", OPENAI_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "OpenAI API key required: set 'api_key' in config or {} env",
                OPENAI_API_KEY_ENV
            )));
        }
        if config["azure_endpoint"].is_string() && !config["deployment"].is_string() {
            return Err(ProviderError::NotConfigured(
                "Azure OpenAI requires 'deployment'".to_string(),
            ));
        }
        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({ "model": "gpt-4o" })
    }

    fn description(&self) -> &'static str {
        "OpenAI and Azure OpenAI chat completions with JSON mode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_url() {
        let provider = OpenAiProvider::from_config(&serde_json::json!({"api_key": "sk-test"})).unwrap();
        assert_eq!(provider.url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_azure_url() {
        let provider = OpenAiProvider::from_config(&serde_json::json!({
            "api_key": "azure-key",
            "azure_endpoint": "https://contoso.openai.azure.com/",
            "deployment": "isi-gpt4o"
        }))
        .unwrap();
        assert_eq!(
            provider.url(),
            "https://contoso.openai.azure.com/openai/deployments/isi-gpt4o/chat/completions?api-version=2024-10-21"
        );
        assert_eq!(provider.name(), "azure-openai");
    }

    #[test]
    fn test_azure_requires_deployment() {
        let config = serde_json::json!({
            "api_key": "azure-key",
            "azure_endpoint": "https://contoso.openai.azure.com"
        });
        assert!(OpenAiProviderFactory.validate_config(&config).is_err());
        assert!(OpenAiProvider::from_config(&config).is_err());
    }

    #[test]
    fn test_json_mode_request() {
        let messages = vec![ChatMessage::system("rules"), ChatMessage::user("text")];
        let request = ChatRequest {
            model: "gpt-4o",
            messages: &messages,
            max_tokens: 100,
            temperature: 0.0,
            response_format: Some(ResponseFormat { r#type: "json_object" }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let provider = OpenAiProvider::new("sk-very-secret").unwrap();
        assert!(!format!("{:?}", provider).contains("sk-very-secret"));
    }
}
