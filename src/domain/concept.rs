//! Candidate ontology linkages proposed by extraction and matching stages.

use serde::{Deserialize, Serialize};

/// Where a [`ConceptMatch`] originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptSource {
    EntityRuler,
    Llm,
    Reconciled,
    Matched,
    SemanticRuler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Preferred,
    Alternative,
    Lemma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptState {
    Preliminary,
    Confirmed,
    Rejected,
    Backup,
}

/// A candidate ontology linkage (spec §3).
///
/// `branches` is multi-valued: FOLIO is a polyhierarchy, so one concept can
/// sit under more than one top-level branch simultaneously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptMatch {
    pub concept_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folio_iri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folio_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folio_definition: Option<String>,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_color: Option<String>,
    pub confidence: f32,
    pub source: ConceptSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<MatchType>,
    pub state: ConceptState,

    // Enrichment fields populated once a concept is resolved against the
    // ontology (spec §4.7); absent before resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folio_examples: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folio_notes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folio_see_also: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folio_alt_labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folio_translations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iri_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy_path: Option<Vec<String>>,
}

impl ConceptMatch {
    pub fn new(concept_text: impl Into<String>, confidence: f32, source: ConceptSource) -> Self {
        Self {
            concept_text: concept_text.into(),
            folio_iri: None,
            folio_label: None,
            folio_definition: None,
            branches: Vec::new(),
            branch_color: None,
            confidence,
            source,
            match_type: None,
            state: ConceptState::Preliminary,
            folio_examples: None,
            folio_notes: None,
            folio_see_also: None,
            folio_alt_labels: None,
            folio_translations: None,
            iri_hash: None,
            children_count: None,
            hierarchy_path: None,
        }
    }
}
