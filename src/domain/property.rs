//! Property annotations: relations between two spans/individuals (spec §4.11).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::span::Span;

/// Which phase produced a [`PropertyAnnotation`] (spec §4.11: an early
/// Aho-Corasick pass over a small fixed vocabulary of relational phrases,
/// followed by an LLM phase for the remainder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertySource {
    #[serde(rename = "aho_corasick")]
    StringMatch,
    Llm,
}

/// A directed relation between a subject span and an object span, optionally
/// resolved against a FOLIO object property (spec §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyAnnotation {
    pub id: String,
    pub subject_span: Span,
    pub predicate_text: String,
    pub object_span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folio_property_iri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folio_property_label: Option<String>,
    pub source: PropertySource,
    pub confidence: f32,
}

impl PropertyAnnotation {
    pub fn new(
        subject_span: Span,
        predicate_text: impl Into<String>,
        object_span: Span,
        source: PropertySource,
        confidence: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject_span,
            predicate_text: predicate_text.into(),
            object_span,
            folio_property_iri: None,
            folio_property_label: None,
            source,
            confidence,
        }
    }
}
