//! Early-phase property matcher (spec §4.10): an Aho-Corasick automaton over
//! ontology object-property labels (preferred, alternative, and
//! lemma-derived variants) producing [`PropertyAnnotation`]s with source
//! `aho_corasick`.
//!
//! Grounded on `backend/app/services/concept/property_matcher.py`.

use aho_corasick::{AhoCorasick, MatchKind};

use crate::collaborators::ontology::{LabelType, Ontology};
use crate::domain::{PropertyAnnotation, PropertySource, Span};

use super::is_word_boundary_match;

#[derive(Debug, Clone)]
struct PropertyMeta {
    iri: String,
    label: String,
    label_type: LabelType,
}

pub struct PropertyMatcher {
    automaton: AhoCorasick,
    meta: Vec<PropertyMeta>,
}

fn base_confidence(label_type: LabelType, multi_word: bool) -> f32 {
    let base = match label_type {
        LabelType::Preferred => 0.85,
        LabelType::Alternative => 0.75,
        LabelType::Lemma => 0.72,
    };
    if multi_word { base + 0.05 } else { base }
}

impl PropertyMatcher {
    /// Build from the ontology's property labels plus caller-supplied lemma
    /// variants (spec §4.10: "lemma variants computed by a lemmatizer").
    /// Lemma generation itself lives in [`crate::extract::properties`]; this
    /// constructor only indexes whatever the caller hands it.
    pub fn build(ontology: &dyn Ontology, lemma_variants: Vec<(String, String)>) -> Self {
        let mut patterns = Vec::new();
        let mut meta = Vec::new();

        for (label, entry) in ontology.get_all_property_labels() {
            patterns.push(label.clone());
            meta.push(PropertyMeta {
                iri: entry.iri.clone(),
                label: entry.matched_label.clone(),
                label_type: entry.label_type,
            });
        }

        for (lemma, iri) in lemma_variants {
            patterns.push(lemma.to_lowercase());
            meta.push(PropertyMeta {
                iri,
                label: lemma,
                label_type: LabelType::Lemma,
            });
        }

        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::Standard)
            .build(&patterns)
            .expect("property labels are valid literal patterns");

        Self { automaton, meta }
    }

    pub fn scan(&self, text: &str) -> Vec<PropertyAnnotation> {
        let mut raw: Vec<(usize, usize, usize, f32)> = Vec::new();
        for mat in self.automaton.find_overlapping_iter(text) {
            if !is_word_boundary_match(text, mat.start(), mat.end()) {
                continue;
            }
            let pattern_idx = mat.pattern().as_usize();
            let meta = &self.meta[pattern_idx];
            let multi_word = meta.label.split_whitespace().count() > 1;
            let confidence = base_confidence(meta.label_type, multi_word);
            raw.push((mat.start(), mat.end(), pattern_idx, confidence));
        }

        let deduped = dedup_property_overlaps(raw);

        deduped
            .into_iter()
            .map(|(start, end, pattern_idx, confidence)| {
                let meta = &self.meta[pattern_idx];
                let subject_span = Span::new(text, start, end);
                let mut annotation = PropertyAnnotation::new(
                    subject_span.clone(),
                    text[start..end].to_string(),
                    subject_span,
                    PropertySource::StringMatch,
                    confidence,
                );
                annotation.folio_property_iri = Some(meta.iri.clone());
                annotation.folio_property_label = Some(meta.label.clone());
                annotation
            })
            .collect()
    }
}

/// Deduplicate overlapping property spans (spec §4.10: "longer wins; on
/// tie, higher confidence wins; equal -> first"). Confidence travels
/// alongside each raw match so a length tie can be broken by it before
/// falling back to first-wins.
fn dedup_property_overlaps(mut raw: Vec<(usize, usize, usize, f32)>) -> Vec<(usize, usize, usize, f32)> {
    raw.sort_by_key(|(start, end, _, _)| (*start, std::cmp::Reverse(*end)));
    let mut kept: Vec<(usize, usize, usize, f32)> = Vec::new();

    'outer: for candidate in raw {
        let (c_start, c_end, _, c_confidence) = candidate;
        let mut drop_indices = Vec::new();
        for (i, &(e_start, e_end, _, e_confidence)) in kept.iter().enumerate() {
            let overlaps = c_start < e_end && e_start < c_end;
            if !overlaps {
                continue;
            }
            let c_len = c_end - c_start;
            let e_len = e_end - e_start;
            if c_len > e_len {
                drop_indices.push(i);
            } else if c_len < e_len {
                continue 'outer; // existing is longer
            } else if c_confidence > e_confidence {
                drop_indices.push(i); // tie on length, candidate more confident
            } else {
                continue 'outer; // tie on length and confidence -> first wins
            }
        }
        for idx in drop_indices.into_iter().rev() {
            kept.remove(idx);
        }
        kept.push(candidate);
    }

    kept.sort_by_key(|(start, _, _, _)| *start);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::ontology::InMemoryOntology;

    fn ontology_with_property(label: &str, iri: &str) -> InMemoryOntology {
        use crate::collaborators::ontology::Concept;
        let property = Concept {
            iri: iri.into(),
            label: label.into(),
            preferred_label: label.into(),
            alternative_labels: vec![],
            definition: None,
            examples: vec![],
            translations: vec![],
            sub_class_of: vec![],
            parent_class_of: vec![],
            see_also: vec![],
            branches: vec![],
            domain_iris: vec![],
            range_iris: vec![],
            inverse_of: None,
        };
        InMemoryOntology::new(vec![], vec![property])
    }

    #[test]
    fn matches_property_label_with_word_boundary() {
        let onto = ontology_with_property("terminate", "folio:Terminate");
        let matcher = PropertyMatcher::build(&onto, Vec::new());
        let hits = matcher.scan("Either party may terminate this agreement at will.");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].folio_property_iri.as_deref(), Some("folio:Terminate"));
    }

    #[test]
    fn equal_length_overlap_keeps_higher_confidence_match() {
        // A property label and a lemma variant with identical text collide
        // at the same span; the lemma variant is second in build order but
        // carries lower confidence, so the tie must not fall to "first wins".
        let onto = ontology_with_property("terminate", "folio:Terminate");
        let matcher = PropertyMatcher::build(&onto, vec![("terminate".into(), "folio:TerminateLemma".into())]);
        let hits = matcher.scan("The parties may terminate the lease.");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].folio_property_iri.as_deref(), Some("folio:Terminate"));
    }
}
