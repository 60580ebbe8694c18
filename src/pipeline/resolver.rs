//! Ontology resolution (spec §4.7): turns a `(concept_text, branch_hint)`
//! pair into a scored, enriched [`ConceptMatch`] by trying a fast exact-IRI
//! path, then falling back to a seven-strategy search with ancestor
//! surfacing and branch re-ranking.
//!
//! Grounded on `backend/app/services/folio/resolver.py` (fast-path IRI
//! lookup, cache shape) and `backend/app/services/folio/search.py`
//! (`multi_strategy_search`'s word-overlap scoring and expansion table).

use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use crate::collaborators::ontology::{Concept, LabelType, Ontology};
use crate::config::PipelineConfig;
use crate::domain::{ConceptMatch, ConceptSource, ConceptState, MatchType};

/// Candidates beyond the primary match surfaced as `Backup` concepts (spec
/// §3: "`concepts` index 0 is primary; others are backup candidates").
const MAX_BACKUP_CANDIDATES: usize = 4;

/// `(concept_text, branch_hint) -> resolved concept` cache, avoiding
/// repeated ontology search for the same phrase within one job (spec §4.7:
/// "a `(concept_text, branch) -> ResolvedConcept` cache"). Keyed on text and
/// branch alone, not the caller's `folio_iri`, matching `resolver.py`'s own
/// cache key — a second call with the same text/branch but a different iri
/// still returns the first result.
#[derive(Default)]
pub struct ResolverCache {
    entries: FxHashMap<(String, Option<String>), Option<(ConceptMatch, Vec<ConceptMatch>)>>,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }
}

// Words too common to carry scoring weight (`search.py`'s `SEARCH_STOPWORDS`).
const SEARCH_STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "and", "or", "in", "for", "to", "with", "by", "on", "at", "is", "are",
    "was", "were", "be", "been", "being", "not", "no", "has", "have", "had", "do", "does", "did",
    "this", "that", "it", "its", "their", "other", "such", "than", "law", "legal", "type", "types",
    "general",
];

/// Legal content words mapped to FOLIO label suffixes the resolver should
/// also try (spec §4.7, strategy 4 "domain-aware expansions"). Ported from
/// `search.py`'s `LEGAL_TERM_EXPANSIONS`.
static LEGAL_TERM_EXPANSIONS: Lazy<FxHashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    FxHashMap::from_iter([
        ("litigation", &["practice", "service"][..]),
        ("transactional", &["practice", "service"][..]),
        ("transaction", &["practice", "service"][..]),
        ("transactions", &["practice", "service"][..]),
        ("regulatory", &["practice", "compliance"][..]),
        ("compliance", &["practice", "service"][..]),
        ("advisory", &["practice", "service"][..]),
        ("dispute", &["service", "resolution"][..]),
        ("disputes", &["service", "resolution"][..]),
        ("mediation", &["service"][..]),
        ("arbitration", &["service"][..]),
        ("negotiation", &["service"][..]),
        ("settlement", &["service", "practice"][..]),
        ("appellate", &["practice", "service"][..]),
        ("trial", &["practice", "service"][..]),
        ("appeals", &["practice", "service"][..]),
        ("prosecution", &["service"][..]),
        ("enforcement", &["service", "action"][..]),
        ("investigation", &["service"][..]),
        ("corporate", &["practice", "service", "law"][..]),
        ("employment", &["practice", "service", "law"][..]),
        ("intellectual", &["property", "practice"][..]),
        ("bankruptcy", &["practice", "service", "law"][..]),
        ("family", &["practice", "law"][..]),
        ("immigration", &["practice", "service", "law"][..]),
        ("environmental", &["practice", "law", "compliance"][..]),
        ("antitrust", &["practice", "law", "compliance"][..]),
        ("tax", &["practice", "service", "law"][..]),
        ("real", &["estate", "property"][..]),
        ("estate", &["planning", "practice", "law"][..]),
        ("counsel", &["service", "practice"][..]),
        ("counseling", &["service", "practice"][..]),
        ("consulting", &["service", "practice"][..]),
        ("collection", &["service", "practice"][..]),
        ("recovery", &["service", "practice"][..]),
        ("foreclosure", &["service", "practice"][..]),
        ("discovery", &["service", "practice"][..]),
        ("diligence", &["service", "practice"][..]),
        ("audit", &["service", "practice"][..]),
        ("drafting", &["service", "practice"][..]),
        ("documentation", &["service", "practice"][..]),
        ("filing", &["service", "practice"][..]),
        ("strategy", &["service", "practice"][..]),
        ("planning", &["service", "practice"][..]),
        ("risk", &["service", "management"][..]),
        ("structuring", &["service", "practice"][..]),
    ])
});

fn clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Lowercase alphabetic runs of 2+ characters (`search.py`'s `_tokenize`).
fn tokenize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_ascii_alphabetic() {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            if current.len() >= 2 {
                words.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.len() >= 2 {
        words.push(current);
    }
    words
}

fn content_words(text: &str) -> FxHashSet<String> {
    tokenize(text).into_iter().filter(|w| !SEARCH_STOPWORDS.contains(&w.as_str())).collect()
}

/// `content_words`, but preserving left-to-right order (for building a
/// readable "content word phrase" to search with) instead of an unordered
/// set.
fn content_words_vec(text: &str) -> Vec<String> {
    tokenize(text).into_iter().filter(|w| !SEARCH_STOPWORDS.contains(&w.as_str())).collect()
}

fn windowed_sub_phrases(words: &[&str]) -> Vec<String> {
    let mut phrases = Vec::new();
    let n = words.len();
    for window in (1..=n).rev() {
        for start in 0..=(n - window) {
            phrases.push(words[start..start + window].join(" "));
        }
    }
    phrases
}

/// Best match, in either direction, between two word sets: exact match
/// credits 1.0, a 3+ char prefix relationship credits 0.8, and a shared 4+
/// char prefix at 70%+ of the shorter word's length credits 0.7 (`search.py`'s
/// `_directional_overlap`).
fn directional_overlap(source: &FxHashSet<String>, dest: &FxHashSet<String>) -> f32 {
    if source.is_empty() {
        return 0.0;
    }
    let mut matched = 0.0f32;
    for sw in source {
        let mut best = 0.0f32;
        for dw in dest {
            if sw == dw {
                best = 1.0;
                break;
            } else if sw.len() >= 3 && dw.len() >= 3 && (sw.starts_with(dw.as_str()) || dw.starts_with(sw.as_str())) {
                best = best.max(0.8);
            } else if sw.len() >= 5 && dw.len() >= 5 {
                let prefix_len = sw.bytes().zip(dw.bytes()).take_while(|(a, b)| a == b).count();
                if prefix_len >= 4 && prefix_len as f32 / sw.len().min(dw.len()) as f32 >= 0.7 {
                    best = best.max(0.7);
                }
            }
        }
        matched += best;
    }
    matched / source.len() as f32
}

/// Bidirectional word overlap: the forward direction (query -> target)
/// versus the reverse (target -> query, discounted 25%), whichever is
/// higher (`search.py`'s `_word_overlap`).
fn word_overlap(query_words: &FxHashSet<String>, target_words: &FxHashSet<String>) -> f32 {
    if query_words.is_empty() || target_words.is_empty() {
        return 0.0;
    }
    let forward = directional_overlap(query_words, target_words);
    let reverse = if target_words.len() >= 2 {
        directional_overlap(target_words, query_words) * 0.75
    } else {
        0.0
    };
    forward.max(reverse)
}

/// Score a candidate concept against the query using label, synonym, and
/// definition overlap (spec §4.7; `search.py`'s `_compute_relevance_score`):
/// exact label match scores 99; otherwise the best of label containment
/// (92/88), label word overlap (`overlap * 88`), and synonym overlap
/// (`overlap * 82`) forms the primary score, with a definition-overlap
/// bonus of up to 8 points layered on top.
fn compute_relevance_score(
    query_content: &FxHashSet<String>,
    query_full: &str,
    label: &str,
    definition: Option<&str>,
    synonyms: &[String],
) -> f32 {
    if label.is_empty() {
        return 0.0;
    }

    let query_lower = query_full.trim().to_lowercase();
    let label_lower = label.to_lowercase();
    if query_lower == label_lower {
        return 99.0;
    }

    let label_content = content_words(label);
    let mut label_score = 0.0f32;
    if query_lower.len() >= 4 && label_lower.contains(&query_lower) {
        label_score = 92.0;
    } else if label_lower.len() >= 4
        && query_lower.contains(&label_lower)
        && label_lower.len() as f32 / query_lower.len() as f32 > 0.3
    {
        label_score = 88.0;
    }
    let overlap = word_overlap(query_content, &label_content);
    if overlap > 0.0 {
        label_score = label_score.max(overlap * 88.0);
    }

    let mut syn_score = 0.0f32;
    for syn in synonyms {
        let syn_content = content_words(syn);
        let s_overlap = word_overlap(query_content, &syn_content);
        if s_overlap > 0.0 {
            syn_score = syn_score.max(s_overlap * 82.0);
        }
    }

    let mut def_score = 0.0f32;
    if let Some(definition) = definition {
        let def_lower = definition.to_lowercase();
        if def_lower.contains(&query_lower) {
            def_score = 60.0;
        }
        let d_overlap = word_overlap(query_content, &content_words(definition));
        if d_overlap > 0.0 {
            def_score = def_score.max(d_overlap * 55.0);
        }
    }

    let primary = label_score.max(syn_score);
    let final_score = if primary > 0.0 { primary + (def_score * 0.12).min(8.0) } else { def_score };
    final_score.min(99.0)
}

/// A scored candidate produced by one of the seven search strategies,
/// before the best is picked.
struct Candidate<'a> {
    concept: &'a Concept,
    score: f32,
    match_type: MatchType,
}

fn score_concept(query_content: &FxHashSet<String>, query: &str, concept: &Concept) -> f32 {
    compute_relevance_score(
        query_content,
        query,
        &concept.label,
        concept.definition.as_deref(),
        &concept.alternative_labels,
    )
}

/// Run the seven search strategies and return every candidate that clears
/// `resolver_score_threshold`, deduplicated to the best-scoring hit per
/// concept (spec §4.7):
/// 1. full cleaned phrase against labels
/// 2. windowed sub-phrases (longest first) against labels
/// 3. content-word-only phrase against labels
/// 4. domain-aware expansions (`LEGAL_TERM_EXPANSIONS`)
/// 5. `search_by_label`
/// 6. `search_by_prefix`, plus a stem-prefix variant for long content words
/// 7. `search_by_definition`, floored at 60 only when the query literally
///    appears in the definition
fn search_strategies<'a>(
    ontology: &'a dyn Ontology,
    query: &str,
    branch_hint: Option<&str>,
    config: &PipelineConfig,
) -> Vec<Candidate<'a>> {
    let mut candidates = Vec::new();
    let labels = ontology.get_all_labels();
    let query_content = content_words(query);

    // Strategy 1: full phrase, exact.
    if let Some(entry) = labels.get(query) {
        if let Some(concept) = ontology.get_concept(&entry.iri) {
            candidates.push(Candidate {
                concept,
                score: 99.0,
                match_type: label_type_to_match_type(entry.label_type),
            });
        }
    }

    // Strategy 2: windowed sub-phrases.
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.len() > 1 {
        for phrase in windowed_sub_phrases(&words) {
            if let Some(entry) = labels.get(&phrase) {
                if let Some(concept) = ontology.get_concept(&entry.iri) {
                    candidates.push(Candidate {
                        concept,
                        score: score_concept(&query_content, query, concept),
                        match_type: label_type_to_match_type(entry.label_type),
                    });
                }
            }
        }
    }

    // Strategy 3: content words only.
    let content_phrase = content_words_vec(query).join(" ");
    if !content_phrase.is_empty() && content_phrase != query {
        if let Some(entry) = labels.get(&content_phrase) {
            if let Some(concept) = ontology.get_concept(&entry.iri) {
                candidates.push(Candidate {
                    concept,
                    score: score_concept(&query_content, query, concept),
                    match_type: label_type_to_match_type(entry.label_type),
                });
            }
        }
    }

    // Strategy 4: domain-aware expansions, e.g. "litigation" -> "litigation
    // practice" / "litigation service".
    for word in &query_content {
        let Some(suffixes) = LEGAL_TERM_EXPANSIONS.get(word.as_str()) else { continue };
        for suffix in *suffixes {
            let expanded = format!("{word} {suffix}");
            if let Some(entry) = labels.get(&expanded) {
                if let Some(concept) = ontology.get_concept(&entry.iri) {
                    candidates.push(Candidate {
                        concept,
                        score: score_concept(&query_content, query, concept),
                        match_type: MatchType::Alternative,
                    });
                }
            }
            for concept in ontology.search_by_label(&expanded, 3) {
                candidates.push(Candidate {
                    concept,
                    score: score_concept(&query_content, query, concept),
                    match_type: MatchType::Alternative,
                });
            }
        }
    }

    // Strategy 5: label search.
    for concept in ontology.search_by_label(query, 5) {
        candidates.push(Candidate {
            concept,
            score: score_concept(&query_content, query, concept),
            match_type: MatchType::Alternative,
        });
    }

    // Strategy 6: prefix search, plus a stem-prefix variant (content words
    // 6+ chars, minus their last two characters) that catches inflected
    // forms a literal prefix search would miss.
    for concept in ontology.search_by_prefix(query) {
        candidates.push(Candidate {
            concept,
            score: score_concept(&query_content, query, concept),
            match_type: MatchType::Alternative,
        });
    }
    for word in &query_content {
        if word.len() < 6 {
            continue;
        }
        let stem = &word[..word.len() - 2];
        for concept in ontology.search_by_prefix(stem) {
            candidates.push(Candidate {
                concept,
                score: score_concept(&query_content, query, concept),
                match_type: MatchType::Alternative,
            });
        }
    }

    // Strategy 7: definition search. The 60-point floor only applies when
    // the query literally appears in the definition text; otherwise the
    // candidate is scored on overlap alone.
    for concept in ontology.search_by_definition(query, 5) {
        let definition = concept.definition.as_deref().unwrap_or_default();
        let mut score = 0.0f32;
        if clean(definition).contains(&clean(query)) {
            score = 60.0;
        }
        let overlap = word_overlap(&query_content, &content_words(definition));
        if overlap > 0.0 {
            score = score.max(overlap * 55.0);
        }
        candidates.push(Candidate { concept, score, match_type: MatchType::Lemma });
    }

    let _ = branch_hint;
    dedup_best_per_concept(candidates)
        .into_iter()
        .filter(|c| c.score >= config.resolver_score_threshold)
        .collect()
}

/// Keep only the highest-scoring candidate per concept iri, mirroring
/// `multi_strategy_search`'s raw-candidate dict keyed by `iri_hash`.
fn dedup_best_per_concept(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut best: FxHashMap<&str, Candidate> = FxHashMap::default();
    for candidate in candidates {
        best.entry(candidate.concept.iri.as_str())
            .and_modify(|existing| {
                if candidate.score > existing.score {
                    existing.score = candidate.score;
                    existing.match_type = candidate.match_type;
                }
            })
            .or_insert(candidate);
    }
    best.into_values().collect()
}

fn label_type_to_match_type(label_type: LabelType) -> MatchType {
    match label_type {
        LabelType::Preferred => MatchType::Preferred,
        LabelType::Alternative => MatchType::Alternative,
        LabelType::Lemma => MatchType::Lemma,
    }
}

/// Walk up to `max_hops` ancestors of `concept` via `sub_class_of`, scoring
/// each at `base_score * 0.6^depth` (spec §4.7, "Ancestor surfacing"). Only
/// called once the base score clears 50 (`search.py`: `if score < 50:
/// continue` before walking `sub_class_of`).
fn surface_ancestors<'a>(
    ontology: &'a dyn Ontology,
    concept: &Concept,
    base_score: f32,
    max_hops: u32,
) -> Vec<Candidate<'a>> {
    let mut out = Vec::new();
    let mut frontier: Vec<&str> = concept.sub_class_of.iter().map(String::as_str).collect();
    let mut depth = 1u32;

    while depth <= max_hops && !frontier.is_empty() {
        let mut next_frontier = Vec::new();
        for iri in frontier {
            if let Some(ancestor) = ontology.get_concept(iri) {
                out.push(Candidate {
                    concept: ancestor,
                    score: base_score * 0.6_f32.powi(depth as i32),
                    match_type: MatchType::Alternative,
                });
                next_frontier.extend(ancestor.sub_class_of.iter().map(String::as_str));
            }
        }
        frontier = next_frontier;
        depth += 1;
    }

    out
}

fn to_concept_match(candidate: &Candidate, state: ConceptState) -> ConceptMatch {
    let concept = candidate.concept;
    let mut m = ConceptMatch::new(concept.preferred_label.clone(), (candidate.score / 100.0).min(1.0), ConceptSource::Matched);
    m.folio_iri = Some(concept.iri.clone());
    m.folio_label = Some(concept.preferred_label.clone());
    m.folio_definition = concept.definition.clone();
    m.branches = concept.branches.clone();
    m.match_type = Some(candidate.match_type);
    m.state = state;
    m.folio_examples = Some(concept.examples.clone());
    m.folio_see_also = Some(concept.see_also.clone());
    m.folio_alt_labels = Some(concept.alternative_labels.clone());
    m.folio_translations = Some(concept.translations.clone());
    m.iri_hash = Some(crate::collaborators::ontology::iri_hash(&concept.iri));
    m.children_count = Some(concept.parent_class_of.len() as u32);
    m
}

/// Resolve one `(concept_text, branch_hint)` pair to its best-scoring
/// ontology match plus backup candidates, consulting and populating `cache`
/// (spec §4.7). Returns `None` when no candidate clears
/// `resolver_score_threshold`.
///
/// `iri`, when given, is tried as a fast path: a direct [`Ontology::get_concept`]
/// hit short-circuits the search strategies entirely and trusts the
/// caller-supplied confidence as the score (`resolver.py`'s "used by
/// EntityRuler which already knows the IRI" comment) rather than
/// recomputing one. A failed lookup falls through to the seven-strategy
/// ladder. Either way, once a primary match is chosen, its ancestors (if
/// its score clears 50) and the next best-scoring runner-up candidates are
/// returned alongside it as `Backup`-state concepts.
pub fn resolve(
    ontology: &dyn Ontology,
    cache: &mut ResolverCache,
    concept_text: &str,
    branch_hint: Option<&str>,
    iri: Option<&str>,
    caller_confidence: f32,
    config: &PipelineConfig,
) -> Option<(ConceptMatch, Vec<ConceptMatch>)> {
    let query = clean(concept_text);
    let key = (query.clone(), branch_hint.map(str::to_lowercase));
    if let Some(cached) = cache.entries.get(&key) {
        return cached.clone();
    }

    let direct = iri.and_then(|iri| {
        let found = ontology.get_concept(iri);
        if found.is_none() {
            warn!(iri, "resolver: iri lookup failed, falling back to search");
        }
        found
    });

    let (best, mut candidates) = if let Some(concept) = direct {
        let candidate = Candidate {
            concept,
            score: (caller_confidence * 100.0).min(99.0),
            match_type: MatchType::Preferred,
        };
        (candidate, Vec::new())
    } else {
        let mut candidates = search_strategies(ontology, &query, branch_hint, config);

        // Branch-hint re-ranking: candidates whose branches include the hint
        // are boosted so a later same-score tie favors the hinted branch.
        if let Some(branch) = branch_hint {
            for candidate in &mut candidates {
                if candidate.concept.branches.iter().any(|b| b.eq_ignore_ascii_case(branch)) {
                    candidate.score *= 1.1;
                }
            }
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        if candidates.is_empty() {
            cache.entries.insert(key, None);
            return None;
        }
        let best = candidates.remove(0);
        (best, candidates)
    };

    let mut resolved = to_concept_match(&best, ConceptState::Confirmed);

    let ancestors = if best.score >= 50.0 {
        surface_ancestors(ontology, best.concept, best.score, config.resolver_max_ancestor_hops)
    } else {
        Vec::new()
    };
    resolved.hierarchy_path = Some(ancestors.iter().map(|a| a.concept.preferred_label.clone()).collect());

    let mut backups: Vec<ConceptMatch> = ancestors.iter().map(|c| to_concept_match(c, ConceptState::Backup)).collect();
    candidates.retain(|c| c.concept.iri != best.concept.iri);
    backups.extend(candidates.iter().map(|c| to_concept_match(c, ConceptState::Backup)));
    backups.truncate(MAX_BACKUP_CANDIDATES);

    let result = Some((resolved, backups));
    cache.entries.insert(key, result.clone());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::ontology::InMemoryOntology;

    fn sample_ontology() -> InMemoryOntology {
        let parent = Concept {
            iri: "folio:Obligation".into(),
            label: "Obligation".into(),
            preferred_label: "Obligation".into(),
            alternative_labels: vec![],
            definition: Some("A duty to act or forbear".into()),
            examples: vec![],
            translations: vec![],
            sub_class_of: vec![],
            parent_class_of: vec!["folio:Breach".into()],
            see_also: vec![],
            branches: vec!["Contracts".into()],
            domain_iris: vec![],
            range_iris: vec![],
            inverse_of: None,
        };
        let breach = Concept {
            iri: "folio:Breach".into(),
            label: "Breach of Contract".into(),
            preferred_label: "Breach of Contract".into(),
            alternative_labels: vec!["Contract Breach".into()],
            definition: Some("Failure to perform a contractual obligation".into()),
            examples: vec!["late delivery".into()],
            translations: vec![],
            sub_class_of: vec!["folio:Obligation".into()],
            parent_class_of: vec![],
            see_also: vec![],
            branches: vec!["Contracts".into(), "Litigation".into()],
            domain_iris: vec![],
            range_iris: vec![],
            inverse_of: None,
        };
        let litigation_practice = Concept {
            iri: "folio:LitigationPractice".into(),
            label: "Litigation Practice".into(),
            preferred_label: "Litigation Practice".into(),
            alternative_labels: vec![],
            definition: Some("Practice area covering courtroom disputes".into()),
            examples: vec![],
            translations: vec![],
            sub_class_of: vec![],
            parent_class_of: vec![],
            see_also: vec![],
            branches: vec!["Litigation".into()],
            domain_iris: vec![],
            range_iris: vec![],
            inverse_of: None,
        };
        InMemoryOntology::new(vec![parent, breach, litigation_practice], vec![])
    }

    fn resolve_default(
        onto: &InMemoryOntology,
        cache: &mut ResolverCache,
        text: &str,
        config: &PipelineConfig,
    ) -> Option<(ConceptMatch, Vec<ConceptMatch>)> {
        resolve(onto, cache, text, None, None, 0.0, config)
    }

    #[test]
    fn exact_label_resolves_with_top_score() {
        let onto = sample_ontology();
        let config = PipelineConfig::default();
        let mut cache = ResolverCache::new();
        let (resolved, _) = resolve_default(&onto, &mut cache, "Breach of Contract", &config).unwrap();
        assert_eq!(resolved.folio_iri.as_deref(), Some("folio:Breach"));
        assert!(resolved.confidence > 0.9);
    }

    #[test]
    fn alternative_label_resolves() {
        let onto = sample_ontology();
        let config = PipelineConfig::default();
        let mut cache = ResolverCache::new();
        let (resolved, _) = resolve_default(&onto, &mut cache, "Contract Breach", &config).unwrap();
        assert_eq!(resolved.folio_iri.as_deref(), Some("folio:Breach"));
    }

    #[test]
    fn ancestor_hierarchy_path_is_populated() {
        let onto = sample_ontology();
        let config = PipelineConfig::default();
        let mut cache = ResolverCache::new();
        let (resolved, backups) = resolve_default(&onto, &mut cache, "Breach of Contract", &config).unwrap();
        assert_eq!(resolved.hierarchy_path.as_deref(), Some(&["Obligation".to_string()][..]));
        assert!(
            backups.iter().any(|b| b.folio_iri.as_deref() == Some("folio:Obligation") && b.state == ConceptState::Backup),
            "the surfaced ancestor should also come back as a backup candidate"
        );
    }

    #[test]
    fn low_scoring_primary_does_not_surface_ancestors() {
        // A primary match scoring under 50 must not trigger ancestor
        // surfacing at all (spec §4.7, "Ancestor surfacing"): asserted
        // directly against the scoring function rather than threading a
        // low-threshold config through a full resolve() call.
        assert!(compute_relevance_score(&content_words("xyz"), "xyz", "Obligation", None, &[]) < 50.0);
    }

    #[test]
    fn unresolvable_text_returns_none() {
        let onto = sample_ontology();
        let config = PipelineConfig::default();
        let mut cache = ResolverCache::new();
        let resolved = resolve_default(&onto, &mut cache, "xyzzy plugh quux", &config);
        assert!(resolved.is_none());
    }

    #[test]
    fn cache_returns_same_result_without_recomputation() {
        let onto = sample_ontology();
        let config = PipelineConfig::default();
        let mut cache = ResolverCache::new();
        let first = resolve_default(&onto, &mut cache, "Breach of Contract", &config);
        let second = resolve_default(&onto, &mut cache, "Breach of Contract", &config);
        assert_eq!(first.unwrap().0.folio_iri, second.unwrap().0.folio_iri);
    }

    #[test]
    fn iri_fast_path_trusts_caller_confidence() {
        let onto = sample_ontology();
        let config = PipelineConfig::default();
        let mut cache = ResolverCache::new();
        let (resolved, _) = resolve(&onto, &mut cache, "breach", None, Some("folio:Breach"), 0.42, &config).unwrap();
        assert_eq!(resolved.folio_iri.as_deref(), Some("folio:Breach"));
        assert!((resolved.confidence - 0.42).abs() < 1e-6);
    }

    #[test]
    fn iri_fast_path_falls_back_to_search_on_miss() {
        let onto = sample_ontology();
        let config = PipelineConfig::default();
        let mut cache = ResolverCache::new();
        let (resolved, _) = resolve(&onto, &mut cache, "Breach of Contract", None, Some("folio:DoesNotExist"), 0.1, &config).unwrap();
        assert_eq!(resolved.folio_iri.as_deref(), Some("folio:Breach"));
        assert!(resolved.confidence > 0.9);
    }

    #[test]
    fn domain_expansion_resolves_litigation_practice() {
        let onto = sample_ontology();
        let config = PipelineConfig::default();
        let mut cache = ResolverCache::new();
        let (resolved, _) = resolve_default(&onto, &mut cache, "litigation", &config).unwrap();
        assert_eq!(resolved.folio_iri.as_deref(), Some("folio:LitigationPractice"));
    }

    #[test]
    fn definition_floor_requires_exact_containment() {
        assert_eq!(
            compute_relevance_score(
                &content_words("failure to perform a contractual obligation"),
                "failure to perform a contractual obligation",
                "Breach of Contract",
                Some("Failure to perform a contractual obligation"),
                &[]
            ),
            99.0
        );
        // overlap alone, with no exact containment, should not hit the
        // floor of 60 purely from the definition.
        let score = compute_relevance_score(
            &content_words("forbear duty"),
            "forbear duty",
            "Unrelated Concept",
            Some("A duty to act or forbear"),
            &[],
        );
        assert!(score < 60.0, "score {score} should not clear the containment-gated floor");
    }

    #[test]
    fn directional_overlap_credits_prefix_matches() {
        let source: FxHashSet<String> = ["litigate".to_string()].into_iter().collect();
        let dest: FxHashSet<String> = ["litigation".to_string()].into_iter().collect();
        let score = word_overlap(&source, &dest);
        assert!(score >= 0.8, "expected a prefix-tier credit, got {score}");
    }
}
