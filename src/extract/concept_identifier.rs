//! LLM concept identifier (spec §4.5): for each chunk, dispatch a structured
//! request asking the model for candidate concepts, then build preliminary
//! annotations by Aho-Corasick-matching the unique concept texts against
//! the full text so the event stream can paint before reconciliation.
//!
//! Grounded on `backend/app/services/concept/llm_concept_identifier.py`.

use std::collections::HashMap;

use aho_corasick::{AhoCorasick, MatchKind};
use serde::Deserialize;
use serde_json::json;

use crate::collaborators::llm::LlmClient;
use crate::domain::{Annotation, AnnotationState, Chunk, ConceptMatch, ConceptSource};
use crate::matcher::is_word_boundary_match;
use crate::normalize::sentence_containing;

const STAGE_NAME: &str = "llm_concept_identifier";

#[derive(Debug, Deserialize)]
struct ConceptResponse {
    #[serde(default)]
    concepts: Vec<ConceptEntry>,
}

#[derive(Debug, Deserialize)]
struct ConceptEntry {
    concept_text: String,
    #[serde(default)]
    branch_hint: Option<String>,
    #[serde(default)]
    confidence: f32,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "concepts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "concept_text": { "type": "string" },
                        "branch_hint": { "type": "string" },
                        "confidence": { "type": "number" }
                    },
                    "required": ["concept_text", "confidence"]
                }
            }
        },
        "required": ["concepts"]
    })
}

fn prompt_for(chunk: &Chunk, branch_catalog: &[String]) -> String {
    format!(
        "Identify legal ontology concepts mentioned in the following text. \
         Candidate branches: {}.\n\nText:\n{}",
        branch_catalog.join(", "),
        chunk.text
    )
}

/// Run one structured LLM call per chunk, deduping concepts by text to the
/// highest-confidence variant across chunks (spec §4.5).
pub async fn identify_concepts(
    llm: &dyn LlmClient,
    chunks: &[Chunk],
    branch_catalog: &[String],
) -> Vec<ConceptMatch> {
    let mut best: HashMap<String, ConceptMatch> = HashMap::new();

    for chunk in chunks {
        let prompt = prompt_for(chunk, branch_catalog);
        let Ok(raw) = llm.structured(&prompt, &schema()).await else {
            continue;
        };
        let Ok(response) = serde_json::from_value::<ConceptResponse>(raw) else {
            continue;
        };

        for entry in response.concepts {
            let key = entry.concept_text.to_lowercase();
            let mut concept = ConceptMatch::new(entry.concept_text, entry.confidence, ConceptSource::Llm);
            if let Some(branch) = entry.branch_hint {
                concept.branches.push(branch);
            }
            best.entry(key)
                .and_modify(|existing| {
                    if concept.confidence > existing.confidence {
                        *existing = concept.clone();
                    }
                })
                .or_insert(concept);
        }
    }

    best.into_values().collect()
}

/// Suppress LLM concepts whose text matches a known property label — they
/// are verbs, not classes (spec §4.6: "LLM concepts whose text matches a
/// known property label are suppressed").
pub fn suppress_property_text(concepts: Vec<ConceptMatch>, property_labels: &HashMap<String, ()>) -> Vec<ConceptMatch> {
    concepts
        .into_iter()
        .filter(|c| !property_labels.contains_key(&c.concept_text.to_lowercase()))
        .collect()
}

/// Materialize one preliminary annotation per unique concept text found via
/// an Aho-Corasick pass over the full text (spec §4.5). `sentence_text` is
/// populated from the chunk's sentence index when the match falls inside a
/// known chunk range.
pub fn build_preliminary_annotations(
    full_text: &str,
    chunks: &[Chunk],
    concepts: &[ConceptMatch],
) -> Vec<Annotation> {
    if concepts.is_empty() {
        return Vec::new();
    }

    let patterns: Vec<String> = concepts.iter().map(|c| c.concept_text.to_lowercase()).collect();
    let Ok(automaton) = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::Standard)
        .build(&patterns)
    else {
        return Vec::new();
    };

    let canonical = crate::domain::CanonicalText {
        full_text: full_text.to_string(),
        chunks: chunks.to_vec(),
        elements: Vec::new(),
    };

    let mut annotations = Vec::new();
    for mat in automaton.find_overlapping_iter(full_text) {
        if !is_word_boundary_match(full_text, mat.start(), mat.end()) {
            continue;
        }
        let source_concept = &concepts[mat.pattern().as_usize()];
        let mut span = crate::domain::Span::new(full_text, mat.start(), mat.end());
        if let Some(sentence) = sentence_containing(&canonical, mat.start()) {
            span = span.with_sentence(sentence);
        }

        let mut concept = source_concept.clone();
        concept.state = crate::domain::ConceptState::Preliminary;

        let mut annotation = Annotation::new(span, vec![concept], AnnotationState::Preliminary);
        annotation.record(STAGE_NAME, "preliminary", "llm concept identified");
        annotations.push(annotation);
    }

    annotations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::llm::NullLlm;

    #[tokio::test]
    async fn null_llm_yields_no_concepts() {
        let chunks = vec![Chunk {
            index: 0,
            text: "some text".into(),
            start_offset: 0,
            end_offset: 9,
            sentences: Vec::new(),
        }];
        let concepts = identify_concepts(&NullLlm, &chunks, &[]).await;
        assert!(concepts.is_empty());
    }

    #[test]
    fn preliminary_annotations_respect_word_boundary() {
        let full_text = "damages were awarded in the case.";
        let concepts = vec![ConceptMatch::new("damages", 0.7, ConceptSource::Llm)];
        let chunks = vec![Chunk {
            index: 0,
            text: full_text.into(),
            start_offset: 0,
            end_offset: full_text.len(),
            sentences: vec![crate::domain::Sentence {
                start: 0,
                end: full_text.len(),
                text: full_text.into(),
            }],
        }];
        let annotations = build_preliminary_annotations(full_text, &chunks, &concepts);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].span.text, "damages");
        assert_eq!(annotations[0].state, AnnotationState::Preliminary);
    }
}
