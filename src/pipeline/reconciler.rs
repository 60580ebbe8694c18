//! Three-source concept reconciliation (spec §4.6): joins the deterministic
//! entity-ruler pass against the LLM concept-identification pass on
//! case-insensitive `concept_text`, producing four buckets and syncing
//! annotation state accordingly.
//!
//! Grounded on `backend/app/services/concept/reconciler.py`.

use std::collections::HashMap;

use crate::config::PipelineConfig;
use crate::domain::{Annotation, AnnotationState, ConceptMatch, ConceptSource, ConceptState};

const STAGE_NAME: &str = "reconciler";

/// The four reconciliation buckets a concept falls into once the ruler and
/// LLM passes are joined (spec §4.6).
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationBucket {
    /// Both the ruler and the LLM proposed this concept text.
    BothAgree,
    /// Only the deterministic ruler proposed it.
    RulerOnly,
    /// Only the LLM proposed it.
    LlmOnly,
    /// Ruler and LLM proposed the same text but disagreed on the concept
    /// (different `folio_iri`); resolved in the ruler's favor.
    ConflictResolved,
}

fn clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Join ruler and LLM concepts by lowercased `concept_text` (spec §4.6).
/// Ruler-only concepts below `ruler_only_min_confidence` are dropped rather
/// than bucketed; everything else survives into one of the four buckets.
pub fn reconcile(
    ruler_concepts: Vec<ConceptMatch>,
    llm_concepts: Vec<ConceptMatch>,
    config: &PipelineConfig,
) -> Vec<(ReconciliationBucket, ConceptMatch)> {
    let mut llm_by_text: HashMap<String, ConceptMatch> =
        llm_concepts.into_iter().map(|c| (clean(&c.concept_text), c)).collect();

    let mut reconciled = Vec::new();

    for ruler_concept in ruler_concepts {
        let key = clean(&ruler_concept.concept_text);
        match llm_by_text.remove(&key) {
            Some(llm_concept) => {
                let same_concept = ruler_concept.folio_iri.is_some()
                    && ruler_concept.folio_iri == llm_concept.folio_iri;
                let bucket = if same_concept || llm_concept.folio_iri.is_none() {
                    ReconciliationBucket::BothAgree
                } else {
                    ReconciliationBucket::ConflictResolved
                };
                // Keep the LLM concept as the base (original
                // `reconciler.py`'s `concept = llm_by_text[key]`), not the
                // ruler's — only confidence, source, and branches are
                // merged in from the ruler side.
                let ruler_confidence = ruler_concept.confidence;
                let ruler_branches = ruler_concept.branches;
                let mut merged = llm_concept;
                merged.source = ConceptSource::Reconciled;
                merged.confidence = (ruler_confidence.max(merged.confidence) + 0.05).min(1.0);
                if merged.branches.is_empty() {
                    merged.branches = ruler_branches;
                }
                reconciled.push((bucket, merged));
            }
            None => {
                if ruler_concept.confidence >= config.ruler_only_min_confidence {
                    reconciled.push((ReconciliationBucket::RulerOnly, ruler_concept));
                }
            }
        }
    }

    for (_, llm_concept) in llm_by_text {
        reconciled.push((ReconciliationBucket::LlmOnly, llm_concept));
    }

    reconciled
}

/// Sync each preliminary annotation's state with its reconciliation outcome
/// (spec §4.6: "annotation state sync... join on `(concept_text,
/// folio_iri)`"). Joined on `concept_text` alone rather than the full pair:
/// preliminary annotations come from the LLM identifier (spec §4.5), which
/// never populates `folio_iri` (resolution happens later, in §4.7), while a
/// `both_agree`/`ruler_only` reconciled concept carries the ruler's iri —
/// joining on the pair as written would never match the common case, so the
/// iri half of the key is dropped here.
///
/// `both_agree`/`conflict_resolved` → confirmed; `ruler_only` → kept
/// preliminary (resolution confirms later); `llm_only` → kept preliminary;
/// absent from `reconciled` entirely → rejected.
pub fn sync_annotation_states(
    annotations: &mut [Annotation],
    reconciled: &[(ReconciliationBucket, ConceptMatch)],
) {
    let mut index: HashMap<String, (ReconciliationBucket, &ConceptMatch)> = HashMap::new();
    for (bucket, concept) in reconciled {
        index.insert(clean(&concept.concept_text), (*bucket, concept));
    }

    for annotation in annotations.iter_mut() {
        let Some(primary) = annotation.concepts.first() else { continue };
        let key = clean(&primary.concept_text);

        let Some((bucket, reconciled_concept)) = index.get(&key) else {
            let kept_concepts = annotation.concepts.clone();
            annotation.upgrade(
                kept_concepts,
                AnnotationState::Rejected,
                std::iter::once(
                    crate::domain::StageEvent::new(STAGE_NAME, "rejected").with_detail("absent_from_reconciliation"),
                ),
            );
            continue;
        };

        let new_state = match bucket {
            ReconciliationBucket::BothAgree | ReconciliationBucket::ConflictResolved => {
                ConceptState::Confirmed
            }
            ReconciliationBucket::RulerOnly | ReconciliationBucket::LlmOnly => ConceptState::Preliminary,
        };

        let mut concept = (*reconciled_concept).clone();
        concept.state = new_state;
        let annotation_state = AnnotationState::from(new_state);
        annotation.upgrade(
            vec![concept],
            annotation_state,
            std::iter::once(
                crate::domain::StageEvent::new(STAGE_NAME, format!("{bucket:?}")).with_detail("reconciled"),
            ),
        );
    }
}

impl std::fmt::Debug for ReconciliationBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReconciliationBucket::BothAgree => "both_agree",
            ReconciliationBucket::RulerOnly => "ruler_only",
            ReconciliationBucket::LlmOnly => "llm_only",
            ReconciliationBucket::ConflictResolved => "conflict_resolved",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Span;

    fn concept(text: &str, iri: Option<&str>, confidence: f32, source: ConceptSource) -> ConceptMatch {
        let mut c = ConceptMatch::new(text, confidence, source);
        c.folio_iri = iri.map(str::to_string);
        c
    }

    #[test]
    fn both_agree_when_texts_and_iris_match() {
        let config = PipelineConfig::default();
        let ruler = vec![concept("breach of contract", Some("folio:Breach"), 0.9, ConceptSource::EntityRuler)];
        let mut llm_concept = concept("breach of contract", Some("folio:Breach"), 0.6, ConceptSource::Llm);
        llm_concept.folio_definition = Some("llm-contributed definition".into());
        let llm = vec![llm_concept];
        let reconciled = reconcile(ruler, llm, &config);
        assert_eq!(reconciled.len(), 1);
        assert_eq!(reconciled[0].0, ReconciliationBucket::BothAgree);
        // Base is the LLM concept (original `reconciler.py`'s
        // `concept = llm_by_text[key]`), boosted: `min(1.0, max(ruler, llm) + 0.05)`.
        assert_eq!(reconciled[0].1.confidence, 0.95);
        assert_eq!(
            reconciled[0].1.folio_definition.as_deref(),
            Some("llm-contributed definition"),
            "the surviving concept should be the LLM one, not the ruler's"
        );
    }

    #[test]
    fn conflict_when_iris_differ() {
        let config = PipelineConfig::default();
        let ruler = vec![concept("termination", Some("folio:Termination"), 0.9, ConceptSource::EntityRuler)];
        let llm = vec![concept("termination", Some("folio:Expiry"), 0.6, ConceptSource::Llm)];
        let reconciled = reconcile(ruler, llm, &config);
        assert_eq!(reconciled[0].0, ReconciliationBucket::ConflictResolved);
    }

    #[test]
    fn low_confidence_ruler_only_is_dropped() {
        let mut config = PipelineConfig::default();
        config.ruler_only_min_confidence = 0.60;
        let ruler = vec![concept("obscure term", None, 0.30, ConceptSource::EntityRuler)];
        let reconciled = reconcile(ruler, Vec::new(), &config);
        assert!(reconciled.is_empty());
    }

    #[test]
    fn sync_keeps_ruler_only_annotation_preliminary() {
        let config = PipelineConfig::default();
        let text = "breach of contract";
        let span = Span::new(text, 0, text.len());
        // LLM-sourced preliminary annotations never carry a folio_iri yet.
        let llm_like = concept("breach of contract", None, 0.9, ConceptSource::Llm);
        let mut annotations = vec![Annotation::new(span, vec![llm_like], AnnotationState::Preliminary)];
        let ruler_concept = concept("breach of contract", Some("folio:Breach"), 0.9, ConceptSource::EntityRuler);
        let reconciled = reconcile(vec![ruler_concept], Vec::new(), &config);
        sync_annotation_states(&mut annotations, &reconciled);
        assert_eq!(annotations[0].state, AnnotationState::Preliminary);
    }

    #[test]
    fn sync_confirms_both_agree_annotation_despite_missing_preliminary_iri() {
        let config = PipelineConfig::default();
        let text = "breach of contract";
        let span = Span::new(text, 0, text.len());
        let llm_like = concept("breach of contract", None, 0.6, ConceptSource::Llm);
        let mut annotations = vec![Annotation::new(span, vec![llm_like.clone()], AnnotationState::Preliminary)];
        let ruler_concept = concept("breach of contract", Some("folio:Breach"), 0.9, ConceptSource::EntityRuler);
        let reconciled = reconcile(vec![ruler_concept], vec![llm_like], &config);
        sync_annotation_states(&mut annotations, &reconciled);
        assert_eq!(annotations[0].state, AnnotationState::Confirmed);
    }

    #[test]
    fn sync_rejects_annotation_absent_from_reconciliation() {
        let config = PipelineConfig::default();
        let text = "unrelated phrase";
        let span = Span::new(text, 0, text.len());
        let llm_like = concept("unrelated phrase", None, 0.9, ConceptSource::Llm);
        let mut annotations = vec![Annotation::new(span, vec![llm_like], AnnotationState::Preliminary)];
        let reconciled = reconcile(Vec::new(), Vec::new(), &config);
        sync_annotation_states(&mut annotations, &reconciled);
        assert_eq!(annotations[0].state, AnnotationState::Rejected);
    }
}
