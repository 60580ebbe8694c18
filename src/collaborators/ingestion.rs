//! Ingesters: format-specific raw-bytes-to-text-plus-structure adapters
//! (spec §4.2, §6 "Ingester contract").

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::domain::{DocumentFormat, DocumentInput, TextElement, TextElementType};

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("unsupported document format: {format:?}")]
    #[diagnostic(code(folio_enrich::ingest::unsupported_format))]
    UnsupportedFormat { format: DocumentFormat },

    #[error("failed to decode document content: {message}")]
    #[diagnostic(code(folio_enrich::ingest::decode))]
    Decode { message: String },
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Output of ingestion: normalized-ready text plus the structural elements
/// an ingester could recover (spec §4.2).
pub struct Ingested {
    pub text: String,
    pub elements: Vec<TextElement>,
}

#[async_trait]
pub trait Ingester: Send + Sync {
    fn supports(&self, format: DocumentFormat) -> bool;

    async fn ingest(&self, input: &DocumentInput) -> Result<Ingested>;
}

/// Dispatches to the first registered ingester whose `supports` matches
/// (spec §4.2: ingestion is format-dispatched). Built explicitly with a
/// caller-supplied ingester list rather than a global registry.
#[derive(Default)]
pub struct IngesterRegistry {
    ingesters: Vec<Box<dyn Ingester>>,
}

impl IngesterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ingester(mut self, ingester: Box<dyn Ingester>) -> Self {
        self.ingesters.push(ingester);
        self
    }

    pub async fn ingest(&self, input: &DocumentInput) -> Result<Ingested> {
        for ingester in &self.ingesters {
            if ingester.supports(input.format) {
                return ingester.ingest(input).await;
            }
        }
        Err(IngestError::UnsupportedFormat { format: input.format })
    }
}

/// Thin wrapper: the content is already plain text (spec §4.2, "thin
/// wrapper over a third-party library" does not apply here since there is
/// no format to decode).
#[derive(Debug, Default)]
pub struct PlainTextIngester;

#[async_trait]
impl Ingester for PlainTextIngester {
    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::PlainText)
    }

    async fn ingest(&self, input: &DocumentInput) -> Result<Ingested> {
        let paragraphs: Vec<TextElement> = input
            .content
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| TextElement {
                text: p.to_string(),
                element_type: TextElementType::Paragraph,
                section_path: Vec::new(),
                page: None,
                level: None,
            })
            .collect();
        Ok(Ingested {
            text: input.content.clone(),
            elements: paragraphs,
        })
    }
}

/// Heading-aware Markdown ingester: `#`-prefixed lines become headings that
/// establish a section path for the paragraphs beneath them, stripped of
/// Markdown syntax before being handed to normalization.
#[derive(Debug, Default)]
pub struct MarkdownIngester;

#[async_trait]
impl Ingester for MarkdownIngester {
    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Markdown)
    }

    async fn ingest(&self, input: &DocumentInput) -> Result<Ingested> {
        let mut elements = Vec::new();
        let mut section_path: Vec<String> = Vec::new();
        let mut plain_lines = Vec::new();

        for line in input.content.lines() {
            let trimmed = line.trim_end();
            if let Some(heading) = parse_heading(trimmed) {
                let (level, text) = heading;
                section_path.truncate((level - 1) as usize);
                section_path.push(text.to_string());
                elements.push(TextElement {
                    text: text.to_string(),
                    element_type: TextElementType::Heading,
                    section_path: section_path.clone(),
                    page: None,
                    level: Some(level),
                });
                plain_lines.push(text.to_string());
            } else if let Some(item) = trimmed.trim_start().strip_prefix("- ") {
                elements.push(TextElement {
                    text: item.to_string(),
                    element_type: TextElementType::ListItem,
                    section_path: section_path.clone(),
                    page: None,
                    level: None,
                });
                plain_lines.push(item.to_string());
            } else if !trimmed.trim().is_empty() {
                elements.push(TextElement {
                    text: trimmed.trim().to_string(),
                    element_type: TextElementType::Paragraph,
                    section_path: section_path.clone(),
                    page: None,
                    level: None,
                });
                plain_lines.push(trimmed.trim().to_string());
            }
        }

        Ok(Ingested {
            text: plain_lines.join("\n"),
            elements,
        })
    }
}

fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = trimmed[hashes..].trim_start();
    if rest.is_empty() {
        return None;
    }
    Some((hashes as u8, rest))
}

/// A minimal tag-stripping HTML ingester: strips tags with a best-effort
/// scanner (no full DOM parse, consistent with "thin wrapper" framing for
/// formats not requiring a heavyweight third-party codec) and records
/// `<h1>`-`<h6>` / `<p>` / `<li>` boundaries as elements.
#[derive(Debug, Default)]
pub struct HtmlIngester;

#[async_trait]
impl Ingester for HtmlIngester {
    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Html)
    }

    async fn ingest(&self, input: &DocumentInput) -> Result<Ingested> {
        let mut elements = Vec::new();
        let mut plain_lines = Vec::new();
        let mut section_path: Vec<String> = Vec::new();

        for block in split_html_blocks(&input.content) {
            let (tag, text) = block;
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let element_type = match tag.as_str() {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => TextElementType::Heading,
                "li" => TextElementType::ListItem,
                "td" | "th" => TextElementType::TableCell,
                _ => TextElementType::Paragraph,
            };
            let level = tag
                .strip_prefix('h')
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|l| matches!(element_type, TextElementType::Heading));

            if let Some(level) = level {
                section_path.truncate((level - 1) as usize);
                section_path.push(text.to_string());
            }

            elements.push(TextElement {
                text: text.to_string(),
                element_type,
                section_path: section_path.clone(),
                page: None,
                level,
            });
            plain_lines.push(text.to_string());
        }

        Ok(Ingested {
            text: plain_lines.join("\n"),
            elements,
        })
    }
}

/// Splits HTML into `(tag_name, inner_text)` blocks for the handful of
/// block-level tags ingestion cares about, stripping nested markup from
/// each block's text. Not a general-purpose HTML parser.
fn split_html_blocks(html: &str) -> Vec<(String, String)> {
    const BLOCK_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "td", "th"];
    let mut blocks = Vec::new();
    let mut rest = html;

    while let Some(open_start) = rest.find('<') {
        let after_bracket = &rest[open_start + 1..];
        let Some(tag_end) = after_bracket.find('>') else {
            break;
        };
        let tag_raw = &after_bracket[..tag_end];
        let tag_name = tag_raw
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_lowercase();

        if !BLOCK_TAGS.contains(&tag_name.as_str()) {
            rest = &after_bracket[tag_end + 1..];
            continue;
        }

        let closing = format!("</{tag_name}>");
        let body_start = open_start + 1 + tag_end + 1;
        let Some(close_rel) = rest[body_start..].find(&closing) else {
            rest = &rest[body_start..];
            continue;
        };
        let inner = &rest[body_start..body_start + close_rel];
        let text = strip_tags(inner);
        blocks.push((tag_name, text));
        rest = &rest[body_start + close_rel + closing.len()..];
    }

    blocks
}

fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn markdown_ingester_tracks_section_path() {
        let ingester = MarkdownIngester;
        let input = DocumentInput {
            content: "# Agreement\n\n## Termination\n\nEither party may terminate.".into(),
            format: DocumentFormat::Markdown,
            filename: None,
        };
        let ingested = ingester.ingest(&input).await.unwrap();
        let termination_para = ingested
            .elements
            .iter()
            .find(|e| e.text.contains("Either party"))
            .unwrap();
        assert_eq!(termination_para.section_path, vec!["Agreement", "Termination"]);
    }

    #[tokio::test]
    async fn html_ingester_strips_tags() {
        let ingester = HtmlIngester;
        let input = DocumentInput {
            content: "<h1>Notice</h1><p>This is a <b>binding</b> agreement.</p>".into(),
            format: DocumentFormat::Html,
            filename: None,
        };
        let ingested = ingester.ingest(&input).await.unwrap();
        assert!(ingested.text.contains("This is a binding agreement."));
        assert_eq!(ingested.elements[0].element_type, TextElementType::Heading);
    }

    #[tokio::test]
    async fn registry_dispatches_by_format() {
        let registry = IngesterRegistry::new()
            .with_ingester(Box::new(PlainTextIngester))
            .with_ingester(Box::new(MarkdownIngester));
        let input = DocumentInput::plain_text("hello\n\nworld");
        let ingested = registry.ingest(&input).await.unwrap();
        assert_eq!(ingested.elements.len(), 2);

        let pdf_input = DocumentInput {
            content: String::new(),
            format: DocumentFormat::Pdf,
            filename: None,
        };
        assert!(matches!(
            registry.ingest(&pdf_input).await,
            Err(IngestError::UnsupportedFormat { .. })
        ));
    }
}
