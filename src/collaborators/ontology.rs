//! The read-only ontology surface every matching/resolution stage depends
//! on (spec §6, "Ontology contract").
//!
//! Grounded on the contract's field list directly; the reference
//! [`InMemoryOntology`] implementation is built explicitly at startup from a
//! caller-supplied concept list rather than lazily on first access, per the
//! spec §9 design note on replacing lazy singletons with explicit
//! construction — callers loading a production-scale OWL export are
//! expected to populate the same structure once and hand it down.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A single FOLIO class (or, when used from the property-label maps,
/// property) as exposed by the ontology (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub iri: String,
    pub label: String,
    pub preferred_label: String,
    #[serde(default)]
    pub alternative_labels: Vec<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub translations: Vec<String>,
    #[serde(default)]
    pub sub_class_of: Vec<String>,
    #[serde(default)]
    pub parent_class_of: Vec<String>,
    #[serde(default)]
    pub see_also: Vec<String>,
    #[serde(default)]
    pub branches: Vec<String>,

    // Property-only fields; empty for ordinary classes.
    #[serde(default)]
    pub domain_iris: Vec<String>,
    #[serde(default)]
    pub range_iris: Vec<String>,
    #[serde(default)]
    pub inverse_of: Option<String>,
}

impl Concept {
    /// `clean_label`/`clean_alt_labels` from the contract: lowercased,
    /// whitespace-collapsed forms used for case-insensitive joins
    /// throughout reconciliation and the matcher.
    pub fn clean_label(&self) -> String {
        clean(&self.label)
    }

    pub fn clean_alt_labels(&self) -> Vec<String> {
        self.alternative_labels.iter().map(|l| clean(l)).collect()
    }
}

fn clean(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// The label type under which a label-table entry was found (spec §4.4,
/// §4.7: ruler/resolver both distinguish preferred vs. alternative vs.
/// lemma-derived labels when scoring).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelType {
    Preferred,
    Alternative,
    Lemma,
}

#[derive(Debug, Clone)]
pub struct LabelEntry {
    pub iri: String,
    pub label_type: LabelType,
    pub matched_label: String,
}

/// Read-only ontology surface (spec §6, "Ontology contract").
///
/// Not `async_trait` — every method here is expected to be backed by an
/// in-memory index, not network I/O, so a synchronous trait keeps call
/// sites simple; an implementor fronting a remote ontology service can
/// still satisfy this by caching locally, matching the contract's implied
/// read-only, always-available semantics.
pub trait Ontology: Send + Sync {
    fn get_concept(&self, iri: &str) -> Option<&Concept>;

    /// Case-insensitive substring/label search, ranked by the
    /// implementation; returns at most `top_k` results.
    fn search_by_label(&self, text: &str, top_k: usize) -> Vec<&Concept>;

    fn search_by_prefix(&self, prefix: &str) -> Vec<&Concept>;

    fn search_by_definition(&self, text: &str, limit: usize) -> Vec<&Concept>;

    /// `lowercased_label -> label lookup entry`, used by the deterministic
    /// matcher and resolver for O(1) exact-label joins (spec §4.4, §4.7).
    fn get_all_labels(&self) -> &FxHashMap<String, LabelEntry>;

    fn get_all_property_labels(&self) -> &FxHashMap<String, LabelEntry>;

    /// `branch_type -> top-level concepts under it`, capped at `max_depth`
    /// (spec §4.7, ancestor surfacing).
    fn get_folio_branches(&self, max_depth: usize) -> BTreeMap<String, Vec<&Concept>>;

    fn classes(&self) -> Box<dyn Iterator<Item = &Concept> + '_>;

    fn by_iri_hash(&self, iri_hash: &str) -> Option<&Concept>;
}

/// Explicitly constructed, fully in-memory ontology. Sufficient for tests
/// and small deployments (spec: "production-scale ontology loading... is a
/// caller responsibility").
pub struct InMemoryOntology {
    concepts: FxHashMap<String, Concept>,
    properties: FxHashMap<String, Concept>,
    labels: FxHashMap<String, LabelEntry>,
    property_labels: FxHashMap<String, LabelEntry>,
    iri_hashes: FxHashMap<String, String>,
}

impl InMemoryOntology {
    pub fn new(concepts: Vec<Concept>, properties: Vec<Concept>) -> Self {
        let mut labels = FxHashMap::default();
        let mut iri_hashes = FxHashMap::default();
        for concept in &concepts {
            labels.insert(
                clean(&concept.label),
                LabelEntry {
                    iri: concept.iri.clone(),
                    label_type: LabelType::Preferred,
                    matched_label: concept.label.clone(),
                },
            );
            for alt in &concept.alternative_labels {
                labels.entry(clean(alt)).or_insert_with(|| LabelEntry {
                    iri: concept.iri.clone(),
                    label_type: LabelType::Alternative,
                    matched_label: alt.clone(),
                });
            }
            iri_hashes.insert(iri_hash(&concept.iri), concept.iri.clone());
        }

        let mut property_labels = FxHashMap::default();
        for property in &properties {
            property_labels.insert(
                clean(&property.label),
                LabelEntry {
                    iri: property.iri.clone(),
                    label_type: LabelType::Preferred,
                    matched_label: property.label.clone(),
                },
            );
        }

        let concepts = concepts.into_iter().map(|c| (c.iri.clone(), c)).collect();
        let properties = properties.into_iter().map(|p| (p.iri.clone(), p)).collect();

        Self {
            concepts,
            properties,
            labels,
            property_labels,
            iri_hashes,
        }
    }
}

/// Short, stable hash used as a compact concept key (spec §6: "indexing by
/// iri-hash"). Not cryptographic — only collision-resistant enough to key a
/// process-local map.
pub fn iri_hash(iri: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = rustc_hash::FxHasher::default();
    iri.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

impl Ontology for InMemoryOntology {
    fn get_concept(&self, iri: &str) -> Option<&Concept> {
        self.concepts.get(iri)
    }

    fn search_by_label(&self, text: &str, top_k: usize) -> Vec<&Concept> {
        let needle = clean(text);
        let mut matches: Vec<&Concept> = self
            .concepts
            .values()
            .filter(|c| c.clean_label().contains(&needle) || c.clean_alt_labels().iter().any(|l| l.contains(&needle)))
            .collect();
        matches.sort_by(|a, b| a.label.cmp(&b.label));
        matches.truncate(top_k);
        matches
    }

    fn search_by_prefix(&self, prefix: &str) -> Vec<&Concept> {
        let needle = clean(prefix);
        let mut matches: Vec<&Concept> = self
            .concepts
            .values()
            .filter(|c| c.clean_label().starts_with(&needle))
            .collect();
        matches.sort_by(|a, b| a.label.cmp(&b.label));
        matches
    }

    fn search_by_definition(&self, text: &str, limit: usize) -> Vec<&Concept> {
        let needle = clean(text);
        let mut matches: Vec<&Concept> = self
            .concepts
            .values()
            .filter(|c| {
                c.definition
                    .as_ref()
                    .map(|d| clean(d).contains(&needle))
                    .unwrap_or(false)
            })
            .collect();
        matches.sort_by(|a, b| a.label.cmp(&b.label));
        matches.truncate(limit);
        matches
    }

    fn get_all_labels(&self) -> &FxHashMap<String, LabelEntry> {
        &self.labels
    }

    fn get_all_property_labels(&self) -> &FxHashMap<String, LabelEntry> {
        &self.property_labels
    }

    fn get_folio_branches(&self, max_depth: usize) -> BTreeMap<String, Vec<&Concept>> {
        let mut branches: BTreeMap<String, Vec<&Concept>> = BTreeMap::new();
        for concept in self.concepts.values() {
            if concept.sub_class_of.len() > max_depth {
                continue;
            }
            for branch in &concept.branches {
                branches.entry(branch.clone()).or_default().push(concept);
            }
        }
        branches
    }

    fn classes(&self) -> Box<dyn Iterator<Item = &Concept> + '_> {
        Box::new(self.concepts.values())
    }

    fn by_iri_hash(&self, iri_hash: &str) -> Option<&Concept> {
        self.iri_hashes.get(iri_hash).and_then(|iri| self.concepts.get(iri))
    }
}

impl InMemoryOntology {
    pub fn properties(&self) -> impl Iterator<Item = &Concept> {
        self.properties.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InMemoryOntology {
        let concept = Concept {
            iri: "folio:Breach".into(),
            label: "Breach of Contract".into(),
            preferred_label: "Breach of Contract".into(),
            alternative_labels: vec!["Contract Breach".into()],
            definition: Some("Failure to perform a contractual obligation".into()),
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
        InMemoryOntology::new(vec![concept], vec![])
    }

    #[test]
    fn label_lookup_is_case_insensitive() {
        let onto = sample();
        let entry = onto.get_all_labels().get("breach of contract").unwrap();
        assert_eq!(entry.iri, "folio:Breach");
        assert_eq!(entry.label_type, LabelType::Preferred);
    }

    #[test]
    fn alt_labels_are_indexed_too() {
        let onto = sample();
        let entry = onto.get_all_labels().get("contract breach").unwrap();
        assert_eq!(entry.label_type, LabelType::Alternative);
    }

    #[test]
    fn iri_hash_round_trips() {
        let onto = sample();
        let hash = iri_hash("folio:Breach");
        assert_eq!(onto.by_iri_hash(&hash).unwrap().iri, "folio:Breach");
    }
}
