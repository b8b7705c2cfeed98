//! Azure AI Document Intelligence `prebuilt-layout`.
//!
//! Submits the document, polls the `Operation-Location` until the analysis
//! finishes, and maps paragraphs (with roles and bounding polygons) to
//! layout elements in the service's reading order.

use std::time::Duration;

use async_trait::async_trait;
use isiguard_core::{BoundingRegion, ElementRole, LayoutElement};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{DocumentSource, LayoutError, LayoutProvider};
use crate::providers::{ApiCredential, CredentialBuilder};

pub const AZURE_DOCUMENT_INTELLIGENCE_KEY_ENV: &str = "AZURE_DOCUMENT_INTELLIGENCE_KEY";
pub const AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT_ENV: &str = "AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT";

const DEFAULT_API_VERSION: &str = "2024-11-30";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct AzureLayoutProvider {
    credential: ApiCredential,
    endpoint: String,
    api_version: String,
    poll_interval: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for AzureLayoutProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureLayoutProvider")
            .field("credential", &self.credential)
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl AzureLayoutProvider {
    /// Keys: `api_key`, `endpoint`, `api_version`, `poll_interval_ms`.
    /// Key and endpoint fall back to the environment.
    pub fn from_config(config: &JsonValue) -> Result<Self, LayoutError> {
        let mut credentials = CredentialBuilder::new()
            .require("api_key", AZURE_DOCUMENT_INTELLIGENCE_KEY_ENV, "Document Intelligence key")
            .require("endpoint", AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT_ENV, "Document Intelligence endpoint")
            .build(config)
            .map_err(|e| LayoutError::NotConfigured(e.to_string()))?;

        let credential = credentials
            .take("api_key")
            .map_err(|e| LayoutError::NotConfigured(e.to_string()))?;
        let endpoint = credentials
            .get("endpoint")
            .map_err(|e| LayoutError::NotConfigured(e.to_string()))?
            .expose()
            .trim_end_matches('/')
            .to_string();

        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(LayoutError::NotConfigured(
                "endpoint must start with http:// or https://".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LayoutError::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credential,
            endpoint,
            api_version: config["api_version"].as_str().unwrap_or(DEFAULT_API_VERSION).to_string(),
            poll_interval: config["poll_interval_ms"]
                .as_u64()
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            client,
        })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/prebuilt-layout:analyze?api-version={}",
            self.endpoint, self.api_version
        )
    }

    async fn error_from(response: reqwest::Response) -> LayoutError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        LayoutError::ApiError { status, message }
    }
}

fn http_error(e: reqwest::Error) -> LayoutError {
    LayoutError::HttpError(e.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paragraph {
    #[serde(default)]
    role: Option<ElementRole>,
    content: String,
    #[serde(default)]
    bounding_regions: Vec<AzureRegion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureRegion {
    page_number: u32,
    #[serde(default)]
    polygon: Vec<f64>,
}

/// Paragraphs in service order become elements with consecutive ranks.
fn elements_from_result(result: AnalyzeResult) -> Vec<LayoutElement> {
    result
        .paragraphs
        .into_iter()
        .filter(|p| !p.content.trim().is_empty())
        .enumerate()
        .map(|(rank, paragraph)| {
            let region = paragraph.bounding_regions.into_iter().next();
            LayoutElement {
                page: region.as_ref().map(|r| r.page_number).unwrap_or(1),
                order_rank: u32::try_from(rank).unwrap_or(u32::MAX),
                text: paragraph.content,
                role: paragraph.role.unwrap_or_default(),
                bounding_region: region.map(|r| BoundingRegion {
                    page: r.page_number,
                    polygon: r.polygon,
                }),
            }
        })
        .collect()
}

#[async_trait]
impl LayoutProvider for AzureLayoutProvider {
    async fn analyze(&self, document: &DocumentSource) -> Result<Vec<LayoutElement>, LayoutError> {
        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", self.credential.expose())
            .header("Content-Type", document.content_type.as_str())
            .body(document.bytes.clone())
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let operation_url = response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| LayoutError::AnalysisFailed("response has no Operation-Location".to_string()))?;

        tracing::debug!(api_version = %self.api_version, "Layout analysis submitted");

        loop {
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(&operation_url)
                .header("Ocp-Apim-Subscription-Key", self.credential.expose())
                .send()
                .await
                .map_err(http_error)?;

            if !response.status().is_success() {
                return Err(Self::error_from(response).await);
            }

            let operation: AnalyzeOperation = response
                .json()
                .await
                .map_err(|e| LayoutError::AnalysisFailed(format!("unreadable analysis result: {}", e)))?;

            match operation.status.as_str() {
                "succeeded" => {
                    let result = operation.analyze_result.ok_or_else(|| {
                        LayoutError::AnalysisFailed("succeeded without analyzeResult".to_string())
                    })?;
                    let elements = elements_from_result(result);
                    tracing::info!(elements = elements.len(), "Layout analysis complete");
                    return Ok(elements);
                }
                "failed" | "canceled" => {
                    let detail = operation.error.map(|e| e.to_string()).unwrap_or_default();
                    return Err(LayoutError::AnalysisFailed(format!("{} {}", operation.status, detail)));
                }
                _ => continue,
            }
        }
    }

    fn name(&self) -> &str {
        "azure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_become_elements() {
        let result: AnalyzeResult = serde_json::from_value(serde_json::json!({
            "paragraphs": [
                {
                    "role": "title",
                    "content": "Acme Tablets",
                    "boundingRegions": [{"pageNumber": 1, "polygon": [0.5, 0.5, 4.0, 0.5, 4.0, 1.0, 0.5, 1.0]}]
                },
                {"content": "   "},
                {
                    "role": "pageFooter",
                    "content": "Do not take if pregnant.",
                    "boundingRegions": [{"pageNumber": 2, "polygon": []}]
                },
                {"role": "formulaBlock", "content": "Consult your doctor."}
            ]
        }))
        .unwrap();

        let elements = elements_from_result(result);
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].role, ElementRole::Title);
        assert_eq!(elements[0].bounding_region.as_ref().unwrap().polygon.len(), 8);
        assert_eq!(elements[1].role, ElementRole::PageFooter);
        assert_eq!(elements[1].page, 2);
        assert_eq!(elements[1].order_rank, 1);
        assert_eq!(elements[2].role, ElementRole::Paragraph);
        assert_eq!(elements[2].page, 1);
    }

    #[test]
    fn test_from_config() {
        let provider = AzureLayoutProvider::from_config(&serde_json::json!({
            "api_key": "di-secret",
            "endpoint": "https://contoso.cognitiveservices.azure.com/"
        }))
        .unwrap();

        assert_eq!(
            provider.analyze_url(),
            "https://contoso.cognitiveservices.azure.com/documentintelligence/documentModels/prebuilt-layout:analyze?api-version=2024-11-30"
        );
        assert!(!format!("{:?}", provider).contains("di-secret"));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let result = AzureLayoutProvider::from_config(&serde_json::json!({
            "api_key": "k",
            "endpoint": "contoso"
        }));
        assert!(matches!(result, Err(LayoutError::NotConfigured(_))));
    }
}
