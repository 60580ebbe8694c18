//! LLM-phase property extraction and lemma-variant generation (spec §4.10).
//!
//! The early Aho-Corasick pass ([`crate::matcher::property_matcher`]) only
//! catches a property's exact labels plus a handful of inflected forms; this
//! module supplies those inflected forms and runs the remaining per-chunk
//! LLM pass that domain/range-links additional relations the automaton
//! cannot see.
//!
//! Grounded on `backend/app/services/concept/llm_property_identifier.py`.

use serde::Deserialize;
use serde_json::json;

use crate::collaborators::llm::LlmClient;
use crate::domain::{Chunk, PropertyAnnotation, PropertySource, Span};

/// Produce simple inflected variants (plural/past/gerund) of each
/// single-word property label, paired with that property's IRI, for
/// [`crate::matcher::property_matcher::PropertyMatcher::build`] to index
/// alongside the ontology's own labels (spec §4.10: "lemma variants computed
/// by a lemmatizer"). Multi-word labels are left untouched — only their
/// exact and alternative forms are indexed.
pub fn generate_lemma_variants(
    property_labels: impl Iterator<Item = (String, String)>,
) -> Vec<(String, String)> {
    let mut variants = Vec::new();
    for (label, iri) in property_labels {
        if label.split_whitespace().count() != 1 {
            continue;
        }
        for inflected in inflect(&label) {
            variants.push((inflected, iri.clone()));
        }
    }
    variants
}

/// Cheap rule-based inflector covering the regular English verb forms that
/// show up in legal drafting (`terminate` -> `terminates`/`terminated`/
/// `terminating`). Irregular verbs are not handled; the ontology's own
/// alternative labels are expected to cover those.
fn inflect(word: &str) -> Vec<String> {
    let lower = word.to_lowercase();
    let mut out = Vec::new();

    if let Some(stem) = lower.strip_suffix('e') {
        out.push(format!("{lower}s"));
        out.push(format!("{stem}ed"));
        out.push(format!("{stem}ing"));
    } else {
        out.push(format!("{lower}s"));
        out.push(format!("{lower}ed"));
        out.push(format!("{lower}ing"));
    }

    out
}

#[derive(Debug, Deserialize)]
struct PropertyResponse {
    #[serde(default)]
    relations: Vec<PropertyEntry>,
}

#[derive(Debug, Deserialize)]
struct PropertyEntry {
    subject_text: String,
    #[serde(default)]
    subject_start: usize,
    #[serde(default)]
    subject_end: usize,
    predicate_text: String,
    object_text: String,
    #[serde(default)]
    object_start: usize,
    #[serde(default)]
    object_end: usize,
    #[serde(default)]
    folio_property_iri: Option<String>,
    #[serde(default)]
    folio_property_label: Option<String>,
    #[serde(default)]
    confidence: f32,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "relations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "subject_text": { "type": "string" },
                        "subject_start": { "type": "integer" },
                        "subject_end": { "type": "integer" },
                        "predicate_text": { "type": "string" },
                        "object_text": { "type": "string" },
                        "object_start": { "type": "integer" },
                        "object_end": { "type": "integer" },
                        "folio_property_iri": { "type": "string" },
                        "folio_property_label": { "type": "string" },
                        "confidence": { "type": "number" }
                    },
                    "required": ["subject_text", "predicate_text", "object_text"]
                }
            }
        },
        "required": ["relations"]
    })
}

fn prompt_for(chunk: &Chunk) -> String {
    format!(
        "Identify subject-predicate-object relations between parties, \
         obligations, and other legal concepts in this text, and where \
         possible name the FOLIO object property the predicate expresses.\n\n\
         Text:\n{}",
        chunk.text
    )
}

/// Run one structured LLM call per chunk, translating chunk-local offsets
/// back to document offsets and tagging every result `PropertySource::Llm`
/// (spec §4.10, LLM phase).
pub async fn identify_properties(
    llm: &dyn LlmClient,
    chunks: &[Chunk],
    full_text: &str,
) -> Vec<PropertyAnnotation> {
    let mut discovered = Vec::new();

    for chunk in chunks {
        let prompt = prompt_for(chunk);
        let Ok(raw) = llm.structured(&prompt, &schema()).await else {
            continue;
        };
        let Ok(response) = serde_json::from_value::<PropertyResponse>(raw) else {
            continue;
        };

        for entry in response.relations {
            if entry.subject_end <= entry.subject_start
                || entry.object_end <= entry.object_start
                || entry.subject_end > chunk.text.len()
                || entry.object_end > chunk.text.len()
            {
                continue;
            }
            let subject_span = Span::new(
                full_text,
                chunk.to_document_offset(entry.subject_start),
                chunk.to_document_offset(entry.subject_end),
            );
            let object_span = Span::new(
                full_text,
                chunk.to_document_offset(entry.object_start),
                chunk.to_document_offset(entry.object_end),
            );

            let mut annotation = PropertyAnnotation::new(
                subject_span,
                entry.predicate_text,
                object_span,
                PropertySource::Llm,
                entry.confidence,
            );
            annotation.folio_property_iri = entry.folio_property_iri;
            annotation.folio_property_label = entry.folio_property_label;
            discovered.push(annotation);
        }
    }

    discovered
}

/// Merge the early string-match pass with the LLM pass: an LLM relation
/// whose subject/object spans both exactly match an existing annotation is
/// dropped as a duplicate; everything else is appended (spec §4.10: the two
/// passes cover disjoint predicate vocabularies in practice, so conflict
/// resolution only needs to suppress literal re-discoveries).
pub fn merge_properties(
    mut existing: Vec<PropertyAnnotation>,
    llm_discovered: Vec<PropertyAnnotation>,
) -> Vec<PropertyAnnotation> {
    for candidate in llm_discovered {
        let duplicate = existing.iter().any(|e| {
            e.subject_span.start == candidate.subject_span.start
                && e.subject_span.end == candidate.subject_span.end
                && e.object_span.start == candidate.object_span.start
                && e.object_span.end == candidate.object_span.end
        });
        if !duplicate {
            existing.push(candidate);
        }
    }
    existing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::llm::NullLlm;

    #[test]
    fn inflects_regular_verb_ending_in_e() {
        let variants = inflect("terminate");
        assert!(variants.contains(&"terminates".to_string()));
        assert!(variants.contains(&"terminated".to_string()));
        assert!(variants.contains(&"terminating".to_string()));
    }

    #[test]
    fn inflects_regular_verb() {
        let variants = inflect("breach");
        assert!(variants.contains(&"breachs".to_string()));
        assert!(variants.contains(&"breached".to_string()));
        assert!(variants.contains(&"breaching".to_string()));
    }

    #[test]
    fn multi_word_labels_skipped_for_lemma_generation() {
        let variants = generate_lemma_variants(
            vec![("breach of contract".to_string(), "folio:Breach".to_string())].into_iter(),
        );
        assert!(variants.is_empty());
    }

    #[tokio::test]
    async fn null_llm_yields_no_relations() {
        let chunk = Chunk {
            index: 0,
            text: "The parties agree to cooperate.".into(),
            start_offset: 0,
            end_offset: 32,
            sentences: Vec::new(),
        };
        let relations = identify_properties(&NullLlm, &[chunk], "The parties agree to cooperate.").await;
        assert!(relations.is_empty());
    }

    #[test]
    fn merge_drops_exact_span_duplicates() {
        let text = "A shall notify B.";
        let span_a = Span::new(text, 0, 1);
        let span_b = Span::new(text, 16, 17);
        let early = vec![PropertyAnnotation::new(
            span_a.clone(),
            "shall notify",
            span_b.clone(),
            PropertySource::StringMatch,
            0.85,
        )];
        let llm = vec![PropertyAnnotation::new(span_a, "shall notify", span_b, PropertySource::Llm, 0.6)];
        let merged = merge_properties(early, llm);
        assert_eq!(merged.len(), 1);
    }
}
