//! The deterministic label matcher ("EntityRuler", spec §4.4).
//!
//! Grounded on `backend/app/services/concept/entity_ruler.py`: every
//! ontology label becomes an Aho-Corasick pattern (skipping short labels and
//! common English words to control false positives), matched once against
//! the full normalized text. Per spec §9 ("from singletons with lazy init to
//! explicit construction"), [`EntityRuler::build`] is called once at startup
//! by the caller and handed down — no lazy `OnceLock`.

use aho_corasick::{AhoCorasick, MatchKind};
use rustc_hash::FxHashMap;

use crate::collaborators::ontology::{LabelType, Ontology};
use crate::domain::{ConceptMatch, ConceptSource, MatchType, Span};

use super::is_word_boundary_match;

/// Labels equal to common English words are suppressed to avoid
/// false-positive single-word matches on ordinary prose (spec §4.4).
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "of", "to", "in", "on", "at", "by", "for",
    "with", "is", "are", "was", "were", "be", "been", "being", "it", "this", "that", "these",
    "those", "as", "from", "not", "no", "so", "do", "does", "did", "has", "have", "had", "will",
    "shall", "may", "can", "court", "party", "act",
];

#[derive(Debug, Clone, Copy)]
struct PatternMeta {
    label_type: LabelType,
    token_count: usize,
}

/// Raw pattern id `-> (iri, label type, token count)`, decoded from Aho-Corasick
/// match results (spec §4.4: "tagged with `(iri, label_type)` encoded in the
/// pattern id").
pub struct EntityRuler {
    automaton: AhoCorasick,
    meta: Vec<(String, PatternMeta)>,
}

/// A raw hit before confidence scoring, as produced by the automaton pass.
#[derive(Debug, Clone)]
pub struct RulerHit {
    pub span: Span,
    pub iri: String,
    pub label_type: LabelType,
    pub token_count: usize,
}

fn is_stop_word(label: &str) -> bool {
    let lower = label.to_lowercase();
    STOP_WORDS.contains(&lower.as_str())
}

fn token_count(label: &str) -> usize {
    label.split_whitespace().count()
}

impl EntityRuler {
    /// Build the matcher from every ontology label (preferred + alternative)
    /// at least 3 characters long and not a stop word (spec §4.4).
    pub fn build(ontology: &dyn Ontology) -> Self {
        let mut patterns: Vec<String> = Vec::new();
        let mut meta: Vec<(String, PatternMeta)> = Vec::new();

        for (label, entry) in ontology.get_all_labels() {
            if label.chars().count() < 3 || is_stop_word(label) {
                continue;
            }
            patterns.push(label.clone());
            meta.push((
                entry.iri.clone(),
                PatternMeta {
                    label_type: entry.label_type,
                    token_count: token_count(label),
                },
            ));
        }

        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::Standard)
            .build(&patterns)
            .expect("ontology labels are valid literal patterns");

        Self { automaton, meta }
    }

    #[cfg(test)]
    fn from_labels(entries: Vec<(&str, &str, LabelType)>) -> Self {
        let mut map: FxHashMap<String, (String, LabelType)> = FxHashMap::default();
        for (label, iri, label_type) in entries {
            map.insert(label.to_lowercase(), (iri.to_string(), label_type));
        }
        let mut patterns = Vec::new();
        let mut meta = Vec::new();
        for (label, (iri, label_type)) in map {
            patterns.push(label.clone());
            meta.push((
                iri,
                PatternMeta {
                    label_type,
                    token_count: token_count(&label),
                },
            ));
        }
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::Standard)
            .build(&patterns)
            .unwrap();
        Self { automaton, meta }
    }

    /// Run the matcher against `text`, admitting only word-boundary matches
    /// (spec §4.8's boundary rule applies here too, per the original
    /// sharing one scanning routine between the ruler and the
    /// post-resolution matcher). Uses overlapping search so a contained
    /// label (e.g. `"breach"` inside `"breach of contract"`) is still
    /// reported alongside the longer match.
    pub fn scan(&self, text: &str) -> Vec<RulerHit> {
        let mut hits = Vec::new();
        for mat in self.automaton.find_overlapping_iter(text) {
            if !is_word_boundary_match(text, mat.start(), mat.end()) {
                continue;
            }
            let (iri, meta) = &self.meta[mat.pattern().as_usize()];
            hits.push(RulerHit {
                span: Span::new(text, mat.start(), mat.end()),
                iri: iri.clone(),
                label_type: meta.label_type,
                token_count: meta.token_count,
            });
        }
        hits
    }
}

/// Confidence lookup table from `(label_type, token_count)` (spec §4.4):
/// multi-word preferred -> 0.95, single-word preferred -> 0.80, multi-word
/// alternative -> 0.65, single-word alternative -> 0.35. Lemma-typed labels
/// (used only by the property matcher, spec §4.10) fall back to the
/// alternative tier.
pub fn ruler_confidence(label_type: LabelType, token_count: usize) -> f32 {
    let multi_word = token_count > 1;
    match (label_type, multi_word) {
        (LabelType::Preferred, true) => 0.95,
        (LabelType::Preferred, false) => 0.80,
        (LabelType::Alternative, true) | (LabelType::Lemma, true) => 0.65,
        (LabelType::Alternative, false) | (LabelType::Lemma, false) => 0.35,
    }
}

/// Convert raw ruler hits into [`ConceptMatch`]es with their confidence
/// assigned, grouped by span so callers can pair each with its originating
/// span (spec §4.6 reconciles on `concept_text`, not span, but downstream
/// stages want both).
pub fn hits_to_concepts(hits: &[RulerHit]) -> Vec<(Span, ConceptMatch)> {
    hits.iter()
        .map(|hit| {
            let confidence = ruler_confidence(hit.label_type, hit.token_count);
            let mut concept = ConceptMatch::new(hit.span.text.clone(), confidence, ConceptSource::EntityRuler);
            concept.folio_iri = Some(hit.iri.clone());
            concept.match_type = Some(match hit.label_type {
                LabelType::Preferred => MatchType::Preferred,
                LabelType::Alternative => MatchType::Alternative,
                LabelType::Lemma => MatchType::Lemma,
            });
            (hit.span.clone(), concept)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_word_preferred_scores_high() {
        assert_eq!(ruler_confidence(LabelType::Preferred, 2), 0.95);
        assert_eq!(ruler_confidence(LabelType::Preferred, 1), 0.80);
        assert_eq!(ruler_confidence(LabelType::Alternative, 2), 0.65);
        assert_eq!(ruler_confidence(LabelType::Alternative, 1), 0.35);
    }

    #[test]
    fn scan_respects_word_boundaries_and_containment() {
        let ruler = EntityRuler::from_labels(vec![
            ("breach of contract", "folio:Breach", LabelType::Preferred),
            ("breach", "folio:BreachOnly", LabelType::Alternative),
        ]);
        let text = "The breach of contract was clear, not contractual.";
        let hits = ruler.scan(text);

        assert!(hits.iter().any(|h| h.iri == "folio:Breach"));
        assert!(hits.iter().any(|h| h.iri == "folio:BreachOnly"));
        // "contractual" must not produce a spurious "contract"-shaped hit.
        assert!(!hits.iter().any(|h| h.span.text.eq_ignore_ascii_case("contract")));
    }

    #[test]
    fn stop_words_are_never_patterns() {
        assert!(is_stop_word("the"));
        assert!(!is_stop_word("breach"));
    }
}
