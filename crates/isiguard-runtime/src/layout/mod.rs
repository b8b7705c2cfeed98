//! Layout providers: turn a raw document into ordered layout elements.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use isiguard_core::LayoutElement;
use thiserror::Error;

use crate::config::{LayoutKind, LayoutSelection};

#[cfg(feature = "azure")]
mod azure;
mod text;

#[cfg(feature = "azure")]
pub use azure::AzureLayoutProvider;
pub use text::TextLayoutProvider;

/// Errors from layout analysis.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Layout service error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Layout analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Unreadable document: {0}")]
    InvalidDocument(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Layout provider not configured: {0}")]
    NotConfigured(String),

    #[error("Circuit open for layout")]
    CircuitOpen,
}

impl LayoutError {
    pub fn is_transient(&self) -> bool {
        match self {
            LayoutError::HttpError(_) | LayoutError::Timeout(_) => true,
            LayoutError::ApiError { status, .. } => *status == 429 || *status >= 500,
            LayoutError::AnalysisFailed(_)
            | LayoutError::InvalidDocument(_)
            | LayoutError::NotConfigured(_)
            | LayoutError::CircuitOpen => false,
        }
    }
}

/// A document as handed to a layout provider.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    pub bytes: Vec<u8>,

    /// MIME type, e.g. `application/pdf` or `text/markdown`
    pub content_type: String,
}

impl DocumentSource {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes(), "text/plain")
    }

    /// Guess the content type from a file extension.
    pub fn content_type_for(path: &std::path::Path) -> &'static str {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => "application/pdf",
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("tif") | Some("tiff") => "image/tiff",
            Some("json") => "application/json",
            Some("md") | Some("markdown") => "text/markdown",
            _ => "text/plain",
        }
    }

    pub fn is_text(&self) -> bool {
        self.content_type.starts_with("text/") || self.content_type == "application/json"
    }
}

/// Turns a document into layout elements in reading order.
#[async_trait]
pub trait LayoutProvider: Send + Sync {
    async fn analyze(&self, document: &DocumentSource) -> Result<Vec<LayoutElement>, LayoutError>;

    fn name(&self) -> &str;
}

/// Build the layout provider a configuration selects.
pub fn create_layout_provider(selection: &LayoutSelection) -> Result<Arc<dyn LayoutProvider>, LayoutError> {
    match selection.kind {
        LayoutKind::Text => Ok(Arc::new(TextLayoutProvider::new())),
        #[cfg(feature = "azure")]
        LayoutKind::Azure => Ok(Arc::new(AzureLayoutProvider::from_config(
            &serde_json::Value::Object(selection.settings.clone()),
        )?)),
        #[cfg(not(feature = "azure"))]
        LayoutKind::Azure => Err(LayoutError::NotConfigured(
            "Azure layout requires the 'azure' feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_content_type_for() {
        assert_eq!(DocumentSource::content_type_for(Path::new("fa.PDF")), "application/pdf");
        assert_eq!(DocumentSource::content_type_for(Path::new("isi.md")), "text/markdown");
        assert_eq!(DocumentSource::content_type_for(Path::new("isi")), "text/plain");
    }

    #[test]
    fn test_transient_errors() {
        assert!(LayoutError::ApiError { status: 429, message: String::new() }.is_transient());
        assert!(LayoutError::ApiError { status: 503, message: String::new() }.is_transient());
        assert!(!LayoutError::ApiError { status: 401, message: String::new() }.is_transient());
        assert!(!LayoutError::InvalidDocument("binary".into()).is_transient());
        assert!(!LayoutError::CircuitOpen.is_transient());
    }

    #[test]
    fn test_create_text_provider() {
        let provider = create_layout_provider(&LayoutSelection::default()).unwrap();
        assert_eq!(provider.name(), "text");
    }
}
