//! Canonical text and its chunked/sentence-indexed decomposition.

use serde::{Deserialize, Serialize};

/// A single sentence boundary recorded within a [`Chunk`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentence {
    /// Byte offset range within the *chunk's* text, not the full document.
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// A bounded, offset-tracked window of normalized text used as the unit of
/// LLM requests (spec GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// Byte offset range within the full normalized text.
    pub start_offset: usize,
    pub end_offset: usize,
    pub sentences: Vec<Sentence>,
}

impl Chunk {
    /// Translate a byte offset local to this chunk's text back to an offset
    /// in the full document (spec §4.9, LLM phase: "Chunk-text offsets are
    /// translated back to document offsets").
    pub fn to_document_offset(&self, local_offset: usize) -> usize {
        self.start_offset + local_offset
    }
}

/// The full result of ingestion + normalization: the complete normalized
/// text plus its chunked and structural decomposition (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalText {
    pub full_text: String,
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub elements: Vec<crate::domain::document::TextElement>,
}

impl CanonicalText {
    /// Invariant check (spec §3): chunk ranges cover the full text in
    /// order, and each chunk's recorded text matches the slice of
    /// `full_text` it claims to cover.
    pub fn chunks_cover_full_text(&self) -> bool {
        let mut expected_start = 0usize;
        for chunk in &self.chunks {
            if chunk.start_offset > expected_start {
                return false; // gap
            }
            if chunk.end_offset > self.full_text.len() {
                return false;
            }
            if !self.full_text.is_char_boundary(chunk.start_offset)
                || !self.full_text.is_char_boundary(chunk.end_offset)
            {
                return false;
            }
            if self.full_text[chunk.start_offset..chunk.end_offset] != chunk.text {
                return false;
            }
            expected_start = chunk.end_offset.max(expected_start);
        }
        self.chunks.last().is_none_or(|c| c.end_offset == self.full_text.len())
    }
}
