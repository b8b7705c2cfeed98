//! Local layout for text, markdown and pre-analyzed JSON documents.

use async_trait::async_trait;
use isiguard_core::{ElementRole, LayoutElement};
use lazy_static::lazy_static;
use regex::Regex;

use super::{DocumentSource, LayoutError, LayoutProvider};

lazy_static! {
    static ref BLANK_LINE: Regex = Regex::new(r"\n[ \t]*\n").unwrap();
    static ref MARKDOWN_HEADING: Regex = Regex::new(r"^(#{1,6})\s+(.*)$").unwrap();
}

/// Reads text documents without a layout service.
///
/// Pages are separated by form feeds and elements by blank lines. A block
/// that is a single markdown heading line becomes a heading element
/// (`#` on the first page's first block is the title). A JSON document is
/// read as an array of layout elements.
#[derive(Debug, Clone, Default)]
pub struct TextLayoutProvider;

impl TextLayoutProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn elements_from_text(text: &str) -> Vec<LayoutElement> {
        let text = text.replace("\r\n", "\n");
        let mut elements = Vec::new();
        let mut order_rank = 0u32;

        for (page_index, page) in text.split('\x0c').enumerate() {
            let page_number = u32::try_from(page_index + 1).unwrap_or(u32::MAX);

            for block in BLANK_LINE.split(page) {
                let block = block.trim();
                if block.is_empty() {
                    continue;
                }

                let (text, role) = match MARKDOWN_HEADING.captures(block).filter(|_| !block.contains('\n')) {
                    Some(caps) => {
                        let role = if &caps[1] == "#" && elements.is_empty() {
                            ElementRole::Title
                        } else {
                            ElementRole::SectionHeading
                        };
                        (caps[2].trim().to_string(), role)
                    }
                    None => (block.to_string(), ElementRole::Paragraph),
                };

                elements.push(LayoutElement::with_role(page_number, order_rank, text, role));
                order_rank += 1;
            }
        }

        elements
    }
}

#[async_trait]
impl LayoutProvider for TextLayoutProvider {
    async fn analyze(&self, document: &DocumentSource) -> Result<Vec<LayoutElement>, LayoutError> {
        if !document.is_text() {
            return Err(LayoutError::NotConfigured(format!(
                "text layout cannot read '{}' documents; use the azure layout provider",
                document.content_type
            )));
        }

        let text = std::str::from_utf8(&document.bytes)
            .map_err(|e| LayoutError::InvalidDocument(format!("not UTF-8 text: {}", e)))?;

        if document.content_type == "application/json" {
            return serde_json::from_str(text)
                .map_err(|e| LayoutError::InvalidDocument(format!("not a layout element array: {}", e)));
        }

        let elements = Self::elements_from_text(text);
        tracing::debug!(elements = elements.len(), "Text layout analyzed");
        Ok(elements)
    }

    fn name(&self) -> &str {
        "text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_pages_and_headings() {
        let text = "# Acme Tablets\n\nSave on every refill.\n\x0c## Important Safety Information\n\nDo not take if pregnant.\nConsult your doctor.\n";
        let elements = TextLayoutProvider::elements_from_text(text);

        assert_eq!(elements.len(), 4);
        assert_eq!(elements[0].role, ElementRole::Title);
        assert_eq!(elements[0].text, "Acme Tablets");
        assert_eq!(elements[1].page, 1);
        assert_eq!(elements[2].page, 2);
        assert_eq!(elements[2].role, ElementRole::SectionHeading);
        assert_eq!(elements[2].text, "Important Safety Information");
        assert_eq!(elements[3].text, "Do not take if pregnant.\nConsult your doctor.");
        assert_eq!(elements[3].role, ElementRole::Paragraph);

        let ranks: Vec<u32> = elements.iter().map(|e| e.order_rank).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_text_has_no_elements() {
        assert!(TextLayoutProvider::elements_from_text(" \n\n \x0c\n").is_empty());
    }

    #[tokio::test]
    async fn test_json_elements() {
        let json = r#"[{"page": 1, "order_rank": 0, "text": "Do not take if pregnant.", "role": "footnote"}]"#;
        let elements = TextLayoutProvider::new()
            .analyze(&DocumentSource::new(json, "application/json"))
            .await
            .unwrap();
        assert_eq!(elements[0].role, ElementRole::Footnote);
    }

    #[tokio::test]
    async fn test_binary_document_is_rejected() {
        let provider = TextLayoutProvider::new();
        let pdf = DocumentSource::new(b"%PDF-1.7".to_vec(), "application/pdf");
        assert!(matches!(provider.analyze(&pdf).await, Err(LayoutError::NotConfigured(_))));

        let bad = DocumentSource::new(vec![0xff, 0xfe, 0x00], "text/plain");
        assert!(matches!(provider.analyze(&bad).await, Err(LayoutError::InvalidDocument(_))));
    }
}
