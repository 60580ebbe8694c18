//! Two-phase individual extraction (spec §4.9).
//!
//! Early phase: citation delegation (spec §4.9 Pass 1) plus fourteen
//! regex/NER extractors (Pass 2), collapsed by a source-priority dedup.
//! LLM phase: per-chunk create/link calls merged into the accumulated list.
//!
//! Grounded on `backend/app/services/extraction/individual_extractor.py`
//! and its regex extractor registry (`extractors/*.py`).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::collaborators::citation::{CitationExtractor, CitationType};
use crate::collaborators::llm::LlmClient;
use crate::domain::{Annotation, ClassLink, Chunk, Individual, IndividualKind, IndividualSource, Span};

// ---------------------------------------------------------------------
// Pass 1: citation delegation
// ---------------------------------------------------------------------

/// Run the citation collaborator and translate hits into [`Individual`]s,
/// tagged `Citation`/`Statute`/`Regulation` per the spec's type-to-class map
/// (spec §4.9 Pass 1).
pub fn extract_citations(extractor: &dyn CitationExtractor, text: &str) -> Vec<Individual> {
    extractor
        .extract(text)
        .into_iter()
        .map(|hit| {
            let (kind, label) = match hit.citation_type {
                CitationType::Statute => (IndividualKind::Statute, "Statute"),
                CitationType::Regulation => (IndividualKind::Regulation, "Regulation"),
                CitationType::Caselaw => (IndividualKind::Citation, "Caselaw"),
            };
            let mut individual = Individual::new(
                kind,
                hit.span.clone(),
                hit.normalized.clone().unwrap_or_else(|| hit.span.text.clone()),
                IndividualSource::Eyecite,
                0.97,
            );
            individual.class_link = Some(ClassLink {
                folio_iri: format!("folio:{label}"),
                folio_label: label.to_string(),
                confidence: 0.97,
            });
            individual
        })
        .collect()
}

// ---------------------------------------------------------------------
// Pass 2: fourteen regex/NER extractors
// ---------------------------------------------------------------------

static MONEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s?\d[\d,]*(?:\.\d{2})?(?:\s?(?:million|billion|thousand))?").unwrap());
static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},\s*\d{4}\b|\b\d{1,2}/\d{1,2}/\d{2,4}\b").unwrap()
});
static DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+\s*(?:day|days|month|months|year|years|week|weeks)\b").unwrap());
static PERCENTAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?\s?%").unwrap());
static COURT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:United States|U\.S\.|Supreme|District|Circuit|Appellate|Superior)\s+Court(?:\s+of\s+[A-Z][\w\s]+)?\b").unwrap()
});
static DEFINED_TERM: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\u{201c}([A-Z][\w\s]{1,40})\u{201d}|"([A-Z][\w\s]{1,40})""#).unwrap());
static CONDITION_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:provided that|subject to|in the event that|unless)\b").unwrap());
static CONSTRAINT_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:shall not|must not|may not|prohibited from)\b").unwrap());
static ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+\s+[A-Z][\w]*(?:\s[A-Z][\w]*)*\s(?:Street|St\.|Avenue|Ave\.|Road|Rd\.|Boulevard|Blvd\.|Lane|Ln\.|Drive|Dr\.),?\s*[A-Z][\w]*(?:,\s*[A-Z]{2}\s*\d{5})?").unwrap()
});
static TRADEMARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z][\w]*(?:\u{00ae}|\u{2122})").unwrap());
static COPYRIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\u{00a9}|Copyright)\s*\d{4}\s+[A-Z][\w\s,\.]*").unwrap());
static PERSON_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:Mr\.|Mrs\.|Ms\.|Dr\.)\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?\b").unwrap());
static ORG_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][\w&]*(?:\s+[A-Z][\w&]*)*\s+(?:Inc\.|LLC|Corp\.|Corporation|Ltd\.|Company|L\.P\.)\b").unwrap()
});
static LOCATION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:the\s+)?(?:State|Commonwealth)\s+of\s+[A-Z][\w]*\b").unwrap()
});

struct RegexExtractor {
    pattern: &'static Lazy<Regex>,
    kind: IndividualKind,
    source: IndividualSource,
    confidence: f32,
}

fn regex_extractors() -> Vec<RegexExtractor> {
    vec![
        RegexExtractor { pattern: &MONEY, kind: IndividualKind::MonetaryAmount, source: IndividualSource::Regex, confidence: 0.92 },
        RegexExtractor { pattern: &DATE, kind: IndividualKind::Date, source: IndividualSource::Regex, confidence: 0.90 },
        RegexExtractor { pattern: &DURATION, kind: IndividualKind::Other, source: IndividualSource::Regex, confidence: 0.80 },
        RegexExtractor { pattern: &PERCENTAGE, kind: IndividualKind::Other, source: IndividualSource::Regex, confidence: 0.85 },
        RegexExtractor { pattern: &COURT, kind: IndividualKind::Court, source: IndividualSource::Regex, confidence: 0.88 },
        RegexExtractor { pattern: &DEFINED_TERM, kind: IndividualKind::Other, source: IndividualSource::Regex, confidence: 0.70 },
        RegexExtractor { pattern: &CONDITION_KEYWORD, kind: IndividualKind::Other, source: IndividualSource::Regex, confidence: 0.60 },
        RegexExtractor { pattern: &CONSTRAINT_KEYWORD, kind: IndividualKind::Other, source: IndividualSource::Regex, confidence: 0.60 },
        RegexExtractor { pattern: &ADDRESS, kind: IndividualKind::Other, source: IndividualSource::Regex, confidence: 0.75 },
        RegexExtractor { pattern: &TRADEMARK, kind: IndividualKind::Other, source: IndividualSource::Regex, confidence: 0.65 },
        RegexExtractor { pattern: &COPYRIGHT, kind: IndividualKind::Other, source: IndividualSource::Regex, confidence: 0.70 },
        RegexExtractor { pattern: &PERSON_NAME, kind: IndividualKind::Party, source: IndividualSource::Ner, confidence: 0.75 },
        RegexExtractor { pattern: &ORG_NAME, kind: IndividualKind::Party, source: IndividualSource::Ner, confidence: 0.78 },
        RegexExtractor { pattern: &LOCATION_NAME, kind: IndividualKind::Jurisdiction, source: IndividualSource::Ner, confidence: 0.72 },
    ]
}

/// Run all fourteen regex/NER extractors over the full text (spec §4.9
/// Pass 2). Each returns individuals at its characteristic confidence.
pub fn extract_regex_individuals(text: &str) -> Vec<Individual> {
    let mut out = Vec::new();
    for extractor in regex_extractors() {
        for mat in extractor.pattern.find_iter(text) {
            let span = Span::new(text, mat.start(), mat.end());
            out.push(Individual::new(
                extractor.kind,
                span,
                mat.as_str().to_string(),
                extractor.source,
                extractor.confidence,
            ));
        }
    }
    out
}

// ---------------------------------------------------------------------
// Source-priority dedup (shared by early and LLM phase merges)
// ---------------------------------------------------------------------

fn names_equivalent(a: &str, b: &str) -> bool {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    a == b || a.contains(&b) || b.contains(&a)
}

/// Collapse overlapping or same-named individuals by source priority (spec
/// §4.9: "eyecite(100) > citeurl(95) > regex(80) > spacy_ner(70) >
/// llm(50)"). The survivor absorbs the loser's class_link when it lacks one
/// of its own, and is marked `hybrid` when sources differ.
pub fn dedup_individuals(individuals: Vec<Individual>) -> Vec<Individual> {
    let mut survivors: Vec<Individual> = Vec::new();

    'next: for incoming in individuals {
        for existing in survivors.iter_mut() {
            let overlaps = existing.span.overlaps(&incoming.span);
            let same_name = names_equivalent(&existing.canonical_value, &incoming.canonical_value);
            if !overlaps && !same_name {
                continue;
            }

            let (winner_priority, loser_priority) =
                (existing.source.priority(), incoming.source.priority());

            let merged_source = merged_source(existing.source, incoming.source);
            if winner_priority >= loser_priority {
                merge_links(existing, &incoming);
                existing.source = merged_source;
            } else {
                let mut promoted = incoming.clone();
                merge_links(&mut promoted, existing);
                promoted.source = merged_source;
                *existing = promoted;
            }
            continue 'next;
        }
        survivors.push(incoming);
    }

    survivors
}

fn merge_links(survivor: &mut Individual, loser: &Individual) {
    if survivor.class_link.is_none() {
        survivor.class_link = loser.class_link.clone();
    }
}

/// Sources differ after a merge -> mark `hybrid`; identical -> keep as is
/// (spec §4.9: "if sources differ... marks source = hybrid").
fn merged_source(a: IndividualSource, b: IndividualSource) -> IndividualSource {
    if a == b { a } else { IndividualSource::Hybrid }
}

// ---------------------------------------------------------------------
// LLM phase
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LlmIndividualsResponse {
    #[serde(default)]
    individuals: Vec<LlmIndividualEntry>,
    #[serde(default)]
    links: Vec<LlmLinkEntry>,
}

#[derive(Debug, Deserialize)]
struct LlmIndividualEntry {
    mention_text: String,
    #[serde(default)]
    start: usize,
    #[serde(default)]
    end: usize,
    #[serde(default)]
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct LlmLinkEntry {
    individual_mention: String,
    annotation_id: String,
    #[serde(default)]
    confidence: f32,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "individuals": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "mention_text": { "type": "string" },
                        "start": { "type": "integer" },
                        "end": { "type": "integer" },
                        "confidence": { "type": "number" }
                    },
                    "required": ["mention_text"]
                }
            },
            "links": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "individual_mention": { "type": "string" },
                        "annotation_id": { "type": "string" },
                        "confidence": { "type": "number" }
                    },
                    "required": ["individual_mention", "annotation_id"]
                }
            }
        }
    })
}

/// For each chunk, build a prompt from overlapping class annotations and
/// existing individuals, asking the model to create new individuals or
/// link existing ones to class annotation ids (spec §4.9, LLM phase).
/// Chunk-local offsets are translated back to document offsets.
pub async fn extract_llm_individuals(
    llm: &dyn LlmClient,
    chunks: &[Chunk],
    full_text: &str,
    existing_annotations: &[Annotation],
    existing_individuals: &[Individual],
) -> Vec<Individual> {
    let mut discovered = Vec::new();

    for chunk in chunks {
        let overlapping_annotations: Vec<&Annotation> = existing_annotations
            .iter()
            .filter(|a| a.span.start < chunk.end_offset && chunk.start_offset < a.span.end)
            .collect();
        let overlapping_individuals: Vec<&Individual> = existing_individuals
            .iter()
            .filter(|i| i.span.start < chunk.end_offset && chunk.start_offset < i.span.end)
            .collect();

        let prompt = format!(
            "Text chunk:\n{}\n\nKnown class annotations: {}\nKnown individuals: {}\n\n\
             Identify additional named individuals (parties, dates, amounts, \
             citations) and, where one already overlaps a known class \
             annotation, link it by id instead of recreating it.",
            chunk.text,
            overlapping_annotations
                .iter()
                .map(|a| a.id.clone())
                .collect::<Vec<_>>()
                .join(", "),
            overlapping_individuals
                .iter()
                .map(|i| i.canonical_value.clone())
                .collect::<Vec<_>>()
                .join(", "),
        );

        let Ok(raw) = llm.structured(&prompt, &schema()).await else {
            continue;
        };
        let Ok(response) = serde_json::from_value::<LlmIndividualsResponse>(raw) else {
            continue;
        };

        let mut by_mention: HashMap<String, Individual> = HashMap::new();
        for entry in response.individuals {
            if entry.end <= entry.start || entry.end > chunk.text.len() {
                continue;
            }
            let span = Span::new(full_text, chunk.to_document_offset(entry.start), chunk.to_document_offset(entry.end));
            let individual = Individual::new(
                IndividualKind::Other,
                span,
                entry.mention_text.clone(),
                IndividualSource::Llm,
                entry.confidence,
            );
            by_mention.insert(entry.mention_text.to_lowercase(), individual);
        }

        for link in response.links {
            if let Some(individual) = by_mention.get_mut(&link.individual_mention.to_lowercase()) {
                individual.class_link = Some(ClassLink {
                    folio_iri: link.annotation_id.clone(),
                    folio_label: link.annotation_id,
                    confidence: link.confidence,
                });
            }
        }

        discovered.extend(by_mention.into_values());
    }

    discovered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::citation::RegexCitationExtractor;

    #[test]
    fn money_and_date_extracted() {
        let text = "The payment of $1,250.00 is due by January 5, 2026.";
        let individuals = extract_regex_individuals(text);
        assert!(individuals.iter().any(|i| i.kind == IndividualKind::MonetaryAmount));
        assert!(individuals.iter().any(|i| i.kind == IndividualKind::Date));
    }

    #[test]
    fn dedup_prefers_eyecite_over_llm() {
        let extractor = RegexCitationExtractor;
        let text = "See Smith v. Jones, 123 U.S. 456 (1987).";
        let citations = extract_citations(&extractor, text);
        assert_eq!(citations.len(), 1);

        let span = citations[0].span.clone();
        let llm_duplicate = Individual::new(
            IndividualKind::Citation,
            span,
            "Smith v. Jones, 123 U.S. 456".into(),
            IndividualSource::Llm,
            0.5,
        );

        let merged = dedup_individuals(vec![citations[0].clone(), llm_duplicate]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, IndividualSource::Hybrid);
        assert_eq!(merged[0].canonical_value, citations[0].canonical_value);
    }
}
