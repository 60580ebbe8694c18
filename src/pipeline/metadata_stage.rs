//! Metadata extraction (spec §4.13): five phases running after concept
//! resolution — document-type reuse/classification, a structured context
//! summary built for the model, LLM field extraction, role-hint promotion
//! of confirmed annotations to individuals, and deterministic document
//! fields.
//!
//! Grounded on `backend/app/services/metadata/metadata_extractor.py`.

use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::json;

use crate::collaborators::llm::LlmClient;
use crate::config::PipelineConfig;
use crate::domain::{AnnotationState, ClassLink, DocumentFormat, Individual, IndividualKind, IndividualSource, Job};
use crate::extract::classifier::classify_document_type;

const STAGE_NAME: &str = "metadata_extractor";
const ROLE_HINT_WINDOW: usize = 50;
const MAX_TRIPLES_IN_SUMMARY: usize = 30;
const TOP_CONCEPTS_IN_SUMMARY: usize = 20;

const FIELD_KEYS: &[&str] = &[
    "court",
    "judge",
    "case_number",
    "parties",
    "date_filed",
    "jurisdiction",
    "governing_law",
    "claim_types",
    "author",
    "recipient",
    "addresses",
];

/// Role-hint phrases scanned in the 50 characters preceding a confirmed
/// annotation (spec §4.13 phase 4). Each hint promotes the annotation's
/// span into a new [`Individual`] of the paired kind, e.g. "plaintiff" or
/// "defendant" preceding a party name promotes it as a `Party`.
const ROLE_HINTS: &[(&str, IndividualKind)] = &[
    ("plaintiff", IndividualKind::Party),
    ("defendant", IndividualKind::Party),
    ("petitioner", IndividualKind::Party),
    ("respondent", IndividualKind::Party),
    ("counsel for", IndividualKind::Party),
    ("judge", IndividualKind::Party),
    ("court of", IndividualKind::Court),
    ("dated", IndividualKind::Date),
    ("filed on", IndividualKind::Date),
];

#[derive(Debug, Deserialize)]
struct FieldExtractionResponse {
    #[serde(default)]
    fields: FxHashMap<String, String>,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "fields": {
                "type": "object",
                "additionalProperties": { "type": "string" }
            }
        },
        "required": ["fields"]
    })
}

/// Phase 1: reuse the parallel-phase classifier result if the scratch
/// already carries one (spec §2's "Document-type classifier" stage runs
/// earlier, in the parallel phase); otherwise classify now.
async fn ensure_document_type(llm: &dyn LlmClient, job: &mut Job) {
    if job.scratch.document_type.is_some() {
        return;
    }
    let Some(full_text) = job.canonical_text.as_ref().map(|c| c.full_text.clone()) else {
        return;
    };
    if let Some((document_type, confidence)) = classify_document_type(llm, &full_text).await {
        job.scratch.document_type = Some(document_type);
        job.scratch.document_type_confidence = Some(confidence);
    }
}

/// Phase 2: build a structured context summary for the field-extraction
/// prompt (spec §4.13 phase 2): individuals grouped by kind, low-confidence
/// annotations with their sentence context, up to 30 SPO triples, the top
/// 20 concepts at or above `top_concept_min_confidence`, areas of law, and
/// a header/footer guess from the first and last text elements.
fn build_context_summary(job: &Job, config: &PipelineConfig) -> String {
    let mut sections = Vec::new();

    let mut by_kind: FxHashMap<String, Vec<String>> = FxHashMap::default();
    for individual in &job.individuals {
        by_kind
            .entry(format!("{:?}", individual.kind))
            .or_default()
            .push(individual.canonical_value.clone());
    }
    if !by_kind.is_empty() {
        let mut lines = Vec::new();
        for (kind, values) in &by_kind {
            lines.push(format!("{kind}: {}", values.join(", ")));
        }
        sections.push(format!("Known individuals:\n{}", lines.join("\n")));
    }

    let low_confidence: Vec<String> = job
        .annotations
        .iter()
        .filter(|a| a.concepts.first().is_some_and(|c| c.confidence < 0.5))
        .take(10)
        .map(|a| {
            format!(
                "\"{}\" (context: {})",
                a.span.text,
                a.span.sentence_text.as_deref().unwrap_or("")
            )
        })
        .collect();
    if !low_confidence.is_empty() {
        sections.push(format!("Low-confidence annotations:\n{}", low_confidence.join("\n")));
    }

    if !job.scratch.spo_triples.is_empty() {
        let triples: Vec<String> = job
            .scratch
            .spo_triples
            .iter()
            .take(MAX_TRIPLES_IN_SUMMARY)
            .map(|t| format!("{} {} {}", t.subject_text, t.predicate_text, t.object_text))
            .collect();
        sections.push(format!("Relations:\n{}", triples.join("\n")));
    }

    let mut top_concepts: Vec<&crate::domain::ConceptMatch> = job
        .scratch
        .resolved_concepts
        .iter()
        .filter(|c| c.state != crate::domain::ConceptState::Backup)
        .filter(|c| c.confidence >= config.top_concept_min_confidence)
        .collect();
    top_concepts.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    top_concepts.truncate(TOP_CONCEPTS_IN_SUMMARY);
    if !top_concepts.is_empty() {
        let listing: Vec<String> = top_concepts.iter().map(|c| c.concept_text.clone()).collect();
        sections.push(format!("Top concepts:\n{}", listing.join(", ")));
    }

    if !job.scratch.areas_of_law.is_empty() {
        let listing: Vec<String> = job.scratch.areas_of_law.iter().map(|a| a.name.clone()).collect();
        sections.push(format!("Areas of law:\n{}", listing.join(", ")));
    }

    if let Some(canonical) = &job.canonical_text {
        if let Some(first) = canonical.elements.first() {
            sections.push(format!("Header guess: {}", first.text));
        }
        if let Some(last) = canonical.elements.last() {
            sections.push(format!("Footer guess: {}", last.text));
        }
    }

    sections.join("\n\n")
}

fn prompt_for(summary: &str) -> String {
    format!(
        "Extract the following fields from this legal document context, \
         leaving a field empty if unknown: {}.\n\nContext:\n{summary}",
        FIELD_KEYS.join(", "),
    )
}

/// Phase 3: one structured LLM call populating `job.scratch.extracted_fields`
/// for each key in [`FIELD_KEYS`] the model could determine.
async fn extract_fields(llm: &dyn LlmClient, job: &mut Job, config: &PipelineConfig) {
    let summary = build_context_summary(job, config);
    if summary.trim().is_empty() {
        return;
    }
    let prompt = prompt_for(&summary);
    let Ok(raw) = llm.structured(&prompt, &schema()).await else {
        return;
    };
    let Ok(response) = serde_json::from_value::<FieldExtractionResponse>(raw) else {
        return;
    };
    for (key, value) in response.fields {
        if FIELD_KEYS.contains(&key.as_str()) && !value.is_empty() {
            job.scratch.extracted_fields.insert(key, value);
        }
    }
}

/// Phase 4: scan the 50 characters preceding every confirmed annotation for
/// a role-hint phrase, promoting a match into a new [`Individual`] rather
/// than mutating the annotation itself (spec §4.13 phase 4).
fn promote_role_hinted_annotations(job: &mut Job) {
    let full_text = job
        .canonical_text
        .as_ref()
        .map(|c| c.full_text.clone())
        .unwrap_or_default();

    let mut promoted = Vec::new();
    for annotation in &job.annotations {
        if annotation.state != AnnotationState::Confirmed {
            continue;
        }
        let window_start = annotation.span.start.saturating_sub(ROLE_HINT_WINDOW);
        let Some(preceding) = full_text.get(window_start..annotation.span.start) else {
            continue;
        };
        let preceding_lower = preceding.to_lowercase();

        for (hint, kind) in ROLE_HINTS {
            if preceding_lower.contains(hint) {
                let mut individual = Individual::new(
                    *kind,
                    annotation.span.clone(),
                    annotation.span.text.clone(),
                    IndividualSource::Llm,
                    annotation.concepts.first().map(|c| c.confidence).unwrap_or(0.5),
                );
                if let Some(iri) = annotation.primary_iri() {
                    individual.class_link = Some(ClassLink {
                        folio_iri: iri.to_string(),
                        folio_label: annotation
                            .concepts
                            .first()
                            .and_then(|c| c.folio_label.clone())
                            .unwrap_or_default(),
                        confidence: annotation.concepts.first().map(|c| c.confidence).unwrap_or(0.5),
                    });
                }
                promoted.push(individual);
                break;
            }
        }
    }

    job.individuals.extend(promoted);
}

/// Phase 5: deterministic fields requiring no model call — page count from
/// the highest `TextElement::page` seen, and the document's source format.
fn compute_deterministic_fields(job: &mut Job) {
    let page_count = job
        .canonical_text
        .as_ref()
        .map(|c| c.elements.iter().filter_map(|e| e.page).max().unwrap_or(1))
        .unwrap_or(1);
    job.scratch
        .extracted_fields
        .insert("page_count".to_string(), page_count.to_string());
    job.scratch
        .extracted_fields
        .insert("source_format".to_string(), format_label(job.document.format).to_string());
}

fn format_label(format: DocumentFormat) -> &'static str {
    match format {
        DocumentFormat::PlainText => "plain_text",
        DocumentFormat::Pdf => "pdf",
        DocumentFormat::Html => "html",
        DocumentFormat::Markdown => "markdown",
        DocumentFormat::Word => "word",
        DocumentFormat::Rtf => "rtf",
        DocumentFormat::Email => "email",
    }
}

/// Run all five phases in order, logging one activity entry per phase
/// (spec §4.13).
pub async fn run(llm: &dyn LlmClient, job: &mut Job, config: &PipelineConfig) {
    ensure_document_type(llm, job).await;
    job.scratch.log(STAGE_NAME, "document type resolved");

    extract_fields(llm, job, config).await;
    job.scratch.log(STAGE_NAME, "fields extracted");

    promote_role_hinted_annotations(job);
    job.scratch.log(STAGE_NAME, "role-hinted annotations promoted");

    compute_deterministic_fields(job);
    job.scratch.log(STAGE_NAME, "deterministic fields computed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::llm::NullLlm;
    use crate::domain::{Annotation, ConceptMatch, ConceptSource, DocumentInput, Span};

    fn sample_job() -> Job {
        let text = "The plaintiff alleges breach of contract.";
        let mut job = Job::new(DocumentInput::plain_text(text));
        job.canonical_text = Some(crate::domain::CanonicalText {
            full_text: text.to_string(),
            chunks: Vec::new(),
            elements: Vec::new(),
        });
        let span = Span::new(text, 22, 40); // "breach of contract"
        let mut concept = ConceptMatch::new("breach of contract", 0.9, ConceptSource::Matched);
        concept.folio_iri = Some("folio:Breach".into());
        concept.folio_label = Some("Breach of Contract".into());
        job.annotations
            .push(Annotation::new(span, vec![concept], AnnotationState::Confirmed));
        job
    }

    #[tokio::test]
    async fn run_populates_deterministic_fields() {
        let mut job = sample_job();
        let config = PipelineConfig::default();
        run(&NullLlm, &mut job, &config).await;
        assert_eq!(job.scratch.extracted_fields.get("source_format").map(String::as_str), Some("plain_text"));
        assert_eq!(job.scratch.extracted_fields.get("page_count").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn role_hint_promotes_individual() {
        let mut job = sample_job();
        let config = PipelineConfig::default();
        run(&NullLlm, &mut job, &config).await;
        assert!(job.individuals.iter().any(|i| i.kind == IndividualKind::Party));
    }
}
