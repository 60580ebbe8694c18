//! Byte-offset spans over the canonical document text.

use serde::{Deserialize, Serialize};

/// A half-open byte range `[start, end)` into a document's full normalized
/// text, paired with the text it denotes.
///
/// Invariant (spec §3): `0 <= start < end <= full_text.len()` and
/// `full_text[start..end] == text`. Constructors that take the full text
/// enforce this; callers reconstructing a `Span` from persisted data should
/// revalidate with [`Span::matches`] before trusting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// The sentence containing this span, when known. Populated lazily by
    /// stages that have a sentence index handy (spec §4.5, §4.8); left
    /// `None` otherwise rather than recomputed speculatively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence_text: Option<String>,
}

impl Span {
    /// Build a span, slicing `text` out of `full_text`. Panics if the range
    /// is out of bounds or not on a char boundary — callers own offset
    /// arithmetic and a panic here means a prior stage computed bad offsets.
    pub fn new(full_text: &str, start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            text: full_text[start..end].to_string(),
            sentence_text: None,
        }
    }

    pub fn with_sentence(mut self, sentence_text: impl Into<String>) -> Self {
        self.sentence_text = Some(sentence_text.into());
        self
    }

    /// Re-check the core invariant against a full text, e.g. after
    /// deserializing a persisted job.
    pub fn matches(&self, full_text: &str) -> bool {
        self.end <= full_text.len()
            && self.start < self.end
            && full_text.is_char_boundary(self.start)
            && full_text.is_char_boundary(self.end)
            && &full_text[self.start..self.end] == self.text
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether `self` fully contains `other` (both endpoints inside).
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether the two spans overlap at all (touching at a boundary does
    /// not count as overlap).
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slices_correctly() {
        let text = "The breach of contract was clear.";
        let span = Span::new(text, 4, 22);
        assert_eq!(span.text, "breach of contract");
        assert!(span.matches(text));
    }

    #[test]
    fn containment_and_overlap() {
        let text = "The breach of contract was clear.";
        let outer = Span::new(text, 4, 22); // "breach of contract"
        let inner = Span::new(text, 4, 10); // "breach"
        assert!(outer.contains(&inner));
        assert!(outer.overlaps(&inner));
    }
}
