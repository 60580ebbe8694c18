//! Post-resolution string matcher (spec §4.8): builds an Aho-Corasick
//! automaton from resolved concept labels, resolves raw-match overlap with a
//! containment-aware policy, and merges the result into the job's existing
//! annotations so preliminary annotations upgrade in place instead of being
//! replaced.
//!
//! Grounded on `backend/app/services/concept/string_matcher.py`, which is
//! the spec's hardest boundary-behavior surface (spec §8: `"contract"` must
//! not match inside `"contractual"`; `"breach"` and `"breach of contract"`
//! at the same start must both survive).

use std::collections::HashMap;

use aho_corasick::{AhoCorasick, MatchKind};
use rustc_hash::FxHashMap;

use crate::domain::{Annotation, AnnotationState, ConceptMatch, ConceptSource, ConceptState, Span, StageEvent};

use super::is_word_boundary_match;

const STAGE_NAME: &str = "string_matcher";

/// A single safe label variant to index, carrying back the resolved concept
/// it should materialize when matched (spec §4.8: "resolved concept labels
/// plus safe alt labels and hidden labels").
pub struct IndexedLabel {
    pub label: String,
    pub concept: ConceptMatch,
}

/// A label is "safe" to index if it's longer than 3 characters and, when a
/// single word, not in a curated stop-word set (spec §4.8).
pub fn is_safe_label(label: &str, stop_words: &[&str]) -> bool {
    if label.chars().count() <= 3 {
        return false;
    }
    let is_single_word = !label.contains(char::is_whitespace);
    !is_single_word || !stop_words.contains(&label.to_lowercase().as_str())
}

/// Raw, boundary-admitted match before overlap resolution.
#[derive(Debug, Clone)]
struct RawMatch {
    start: usize,
    end: usize,
    text: String,
}

/// Pre-built automaton over resolved concept labels.
pub struct StringMatcher {
    automaton: AhoCorasick,
    /// `label (lowercased) -> candidate concepts`, since more than one
    /// branch can share the same surface text (spec §4.8: "multi-branch
    /// materialization").
    concepts_by_label: FxHashMap<String, Vec<ConceptMatch>>,
}

impl StringMatcher {
    pub fn build(labels: Vec<IndexedLabel>) -> Self {
        let mut concepts_by_label: FxHashMap<String, Vec<ConceptMatch>> = FxHashMap::default();
        let mut patterns = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for entry in labels {
            let key = entry.label.to_lowercase();
            if seen.insert(key.clone()) {
                patterns.push(key.clone());
            }
            concepts_by_label.entry(key).or_default().push(entry.concept);
        }

        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::Standard)
            .build(&patterns)
            .expect("resolved labels are valid literal patterns");

        Self {
            automaton,
            concepts_by_label,
        }
    }

    /// Raw boundary-admitted matches, not yet overlap-resolved.
    fn raw_matches(&self, text: &str) -> Vec<RawMatch> {
        let mut matches = Vec::new();
        for mat in self.automaton.find_overlapping_iter(text) {
            if !is_word_boundary_match(text, mat.start(), mat.end()) {
                continue;
            }
            matches.push(RawMatch {
                start: mat.start(),
                end: mat.end(),
                text: text[mat.start()..mat.end()].to_string(),
            });
        }
        matches
    }

    /// Scan `text` and return overlap-resolved `(start, end, matched_text)`
    /// triples ready for [`concepts_for`](Self::concepts_for) lookup. Combines
    /// [`Self::raw_matches`] with [`resolve_overlaps`] so callers never touch
    /// the private raw-match representation directly.
    pub fn matches(&self, text: &str) -> Vec<(usize, usize, String)> {
        let raw = self
            .raw_matches(text)
            .into_iter()
            .map(|m| (m.start, m.end, m.text))
            .collect();
        resolve_overlaps(raw)
    }

    pub fn concepts_for(&self, text: &str) -> &[ConceptMatch] {
        self.concepts_by_label
            .get(&text.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Apply the overlap policy over raw matches (spec §4.8):
/// - contained (A fully inside B) -> keep both
/// - identical spans -> dedupe, keep first
/// - partial (crossing boundaries) -> longer wins; tie -> first wins
pub fn resolve_overlaps(mut matches: Vec<(usize, usize, String)>) -> Vec<(usize, usize, String)> {
    matches.sort_by_key(|(start, end, _)| (*start, std::cmp::Reverse(*end)));

    let mut kept: Vec<(usize, usize, String)> = Vec::new();
    'outer: for candidate in matches {
        let (c_start, c_end, _) = &candidate;
        let mut drop_candidate = false;
        let mut indices_to_drop = Vec::new();

        for (i, existing) in kept.iter().enumerate() {
            let (e_start, e_end, _) = existing;

            if *c_start == *e_start && *c_end == *e_end {
                // identical span: keep first (already kept), drop candidate.
                continue 'outer;
            }

            let c_contains_e = *c_start <= *e_start && *e_end <= *c_end;
            let e_contains_c = *e_start <= *c_start && *c_end <= *e_end;
            if c_contains_e || e_contains_c {
                // full containment either direction: keep both.
                continue;
            }

            let overlaps = *c_start < *e_end && *e_start < *c_end;
            if overlaps {
                let c_len = c_end - c_start;
                let e_len = e_end - e_start;
                if c_len > e_len {
                    indices_to_drop.push(i);
                } else {
                    // existing is longer, or tied (first wins) -> drop candidate.
                    drop_candidate = true;
                }
            }
        }

        if drop_candidate {
            continue;
        }
        for idx in indices_to_drop.into_iter().rev() {
            kept.remove(idx);
        }
        kept.push(candidate);
    }

    kept.sort_by_key(|(start, _, _)| *start);
    kept
}

/// Outcome of merging the string matcher's output into the job's existing
/// annotation list.
pub struct MatchResult {
    pub annotations: Vec<Annotation>,
}

/// Merge accepted `(span, concepts)` pairs into `existing` annotations per
/// spec §4.8 "Merging with existing annotations": upgrade an exact
/// `(start, end, iri)` match in place, else upgrade by same concept text at
/// the same span (preserving a preliminary annotation's id), else create a
/// fresh confirmed annotation. Annotations whose span nothing touched are
/// retained (rejections stay struck-through, spec: "Preserving rejections").
pub fn merge_matches(
    existing: Vec<Annotation>,
    accepted: Vec<(Span, Vec<ConceptMatch>)>,
) -> MatchResult {
    let mut annotations = existing;

    for (span, mut concepts) in accepted {
        if concepts.is_empty() {
            continue;
        }
        let primary = concepts.remove(0);
        let primary_iri = primary.folio_iri.clone();

        let exact_idx = annotations.iter().position(|a| {
            a.span.start == span.start && a.span.end == span.end && a.primary_iri() == primary_iri.as_deref()
        });

        let same_text_idx = exact_idx.or_else(|| {
            annotations.iter().position(|a| {
                a.span.start == span.start
                    && a.span.end == span.end
                    && a.concepts
                        .first()
                        .is_some_and(|c| c.concept_text.eq_ignore_ascii_case(&primary.concept_text))
            })
        });

        let mut upgraded_primary = primary.clone();
        upgraded_primary.state = ConceptState::Confirmed;
        upgraded_primary.source = ConceptSource::Matched;
        let mut new_concepts = vec![upgraded_primary];
        new_concepts.extend(concepts.into_iter().map(|mut backup| {
            backup.state = ConceptState::Backup;
            backup
        }));

        if let Some(idx) = same_text_idx {
            let annotation = &mut annotations[idx];
            if annotation.span.sentence_text.is_none() {
                annotation.span.sentence_text = span.sentence_text.clone();
            }
            annotation.upgrade(
                new_concepts,
                AnnotationState::Confirmed,
                vec![StageEvent::new(STAGE_NAME, "confirmed").with_detail("string_matching.confirmed")],
            );
        } else {
            let mut fresh = Annotation::new(span, new_concepts, AnnotationState::Confirmed);
            fresh.record(STAGE_NAME, "confirmed", "string_matching.confirmed");
            annotations.push(fresh);
        }
    }

    MatchResult { annotations: dedup_same_iri(annotations) }
}

/// Same-IRI dedup pass (spec §4.8): after merging, collapse overlapping
/// annotations that share the same IRI using the containment/length policy,
/// merging lineages and recording a `dedup_merged` event on the survivor.
fn dedup_same_iri(mut annotations: Vec<Annotation>) -> Vec<Annotation> {
    let mut by_iri: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, ann) in annotations.iter().enumerate() {
        if let Some(iri) = ann.primary_iri() {
            by_iri.entry(iri.to_string()).or_default().push(i);
        }
    }

    let mut drop: std::collections::HashSet<usize> = std::collections::HashSet::new();
    for indices in by_iri.values() {
        if indices.len() < 2 {
            continue;
        }
        for a in 0..indices.len() {
            for b in (a + 1)..indices.len() {
                let (ia, ib) = (indices[a], indices[b]);
                if drop.contains(&ia) || drop.contains(&ib) {
                    continue;
                }
                let (sa, sb) = (&annotations[ia].span, &annotations[ib].span);
                let overlapping = sa.overlaps(sb);
                if !overlapping {
                    continue;
                }
                let len_a = sa.len();
                let len_b = sb.len();
                let (survivor, loser) = if len_a >= len_b { (ia, ib) } else { (ib, ia) };
                drop.insert(loser);
                let loser_lineage = annotations[loser].lineage.clone();
                annotations[survivor].lineage.extend(loser_lineage);
                annotations[survivor].record(STAGE_NAME, "dedup_merged", "same-iri overlap collapsed");
            }
        }
    }

    annotations.sort_by_key(|a| a.span.start);
    annotations
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !drop.contains(i))
        .map(|(_, a)| a)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(start: usize, end: usize, text: &str) -> (usize, usize, String) {
        (start, end, text.to_string())
    }

    #[test]
    fn contained_matches_both_kept() {
        // "breach" (0,6) inside "breach of contract" (0,19)
        let input = vec![m(0, 6, "breach"), m(0, 19, "breach of contract")];
        let kept = resolve_overlaps(input);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn identical_spans_deduped() {
        let input = vec![m(0, 6, "breach"), m(0, 6, "breach")];
        let kept = resolve_overlaps(input);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn partial_overlap_longer_wins() {
        // crossing spans: (0,10) and (5,20) -> longer (5,20) wins
        let input = vec![m(0, 10, "a"), m(5, 20, "b")];
        let kept = resolve_overlaps(input);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].1 - kept[0].0, 15);
    }

    #[test]
    fn partial_overlap_tie_first_wins() {
        let input = vec![m(0, 10, "first"), m(5, 15, "second")];
        let kept = resolve_overlaps(input);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].2, "first");
    }

    #[test]
    fn boundary_word_contract_not_matched_inside_contractual() {
        let matcher = StringMatcher::build(vec![IndexedLabel {
            label: "contract".into(),
            concept: ConceptMatch::new("contract", 0.9, ConceptSource::Matched),
        }]);
        let text = "This is contractual language, unlike a contract clause.";
        let raw = matcher.raw_matches(text);
        assert_eq!(raw.len(), 1);
        assert_eq!(&text[raw[0].start..raw[0].end], "contract");
    }
}
