//! Document input types.

use serde::{Deserialize, Serialize};

/// The format of an incoming document, driving ingester dispatch (spec
/// §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Html,
    Markdown,
    Word,
    Rtf,
    Email,
}

impl DocumentFormat {
    /// Whether this format's content is expected to be base64-encoded
    /// binary rather than UTF-8 text (spec §3: "Content is text or
    /// base64-encoded binary depending on format").
    pub fn is_binary(self) -> bool {
        matches!(self, DocumentFormat::Pdf | DocumentFormat::Word)
    }
}

/// A document submitted for enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    /// Raw content: UTF-8 text, or base64 for binary formats.
    pub content: String,
    pub format: DocumentFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl DocumentInput {
    pub fn plain_text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            format: DocumentFormat::PlainText,
            filename: None,
        }
    }
}

/// An ordered structural element extracted by an ingester alongside the raw
/// text (spec §4.2, §6: "heading/paragraph/list-item/table-cell with
/// section path, page number, heading level").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextElement {
    pub text: String,
    pub element_type: TextElementType,
    /// Breadcrumb of enclosing headings, outermost first.
    pub section_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextElementType {
    Heading,
    Paragraph,
    ListItem,
    TableCell,
}
