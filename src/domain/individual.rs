//! Extracted named individuals (parties, dates, citations, monetary amounts...).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::span::Span;

/// The kind of real-world thing an [`Individual`] denotes (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndividualKind {
    Party,
    Date,
    MonetaryAmount,
    Citation,
    Statute,
    Regulation,
    Court,
    Jurisdiction,
    DocketNumber,
    Other,
}

/// Which extractor produced an [`Individual`], used for the source-priority
/// dedup in spec §4.10: "eyecite(100) > citeurl(95) > regex(80) >
/// spacy_ner(70) > llm(50)".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndividualSource {
    Eyecite,
    Citeurl,
    Regex,
    #[serde(rename = "spacy_ner")]
    Ner,
    Llm,
    /// Assigned when a dedup merge absorbs extractions from more than one
    /// source into a single surviving individual (spec §4.10: "if sources
    /// differ, marks source = hybrid").
    Hybrid,
}

impl IndividualSource {
    /// Higher wins when two extractions collide on the same span (spec
    /// §4.10). Kept as a method rather than a bare table so the ordering is
    /// discoverable from the type itself.
    pub fn priority(self) -> u8 {
        match self {
            IndividualSource::Eyecite => 100,
            IndividualSource::Citeurl => 95,
            IndividualSource::Regex => 80,
            IndividualSource::Ner => 70,
            IndividualSource::Llm => 50,
            IndividualSource::Hybrid => 100,
        }
    }
}

/// A link from an [`Individual`] to an ontology class it instantiates (spec
/// §4.10: "an individual may additionally be linked to the FOLIO class it is
/// an instance of").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassLink {
    pub folio_iri: String,
    pub folio_label: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    pub id: String,
    pub kind: IndividualKind,
    pub span: Span,
    pub canonical_value: String,
    pub source: IndividualSource,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_link: Option<ClassLink>,
}

impl Individual {
    pub fn new(
        kind: IndividualKind,
        span: Span,
        canonical_value: impl Into<String>,
        source: IndividualSource,
        confidence: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            span,
            canonical_value: canonical_value.into(),
            source,
            confidence,
            class_link: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_eyecite_above_llm() {
        assert!(IndividualSource::Eyecite.priority() > IndividualSource::Citeurl.priority());
        assert!(IndividualSource::Citeurl.priority() > IndividualSource::Regex.priority());
        assert!(IndividualSource::Regex.priority() > IndividualSource::Ner.priority());
        assert!(IndividualSource::Ner.priority() > IndividualSource::Llm.priority());
    }
}
