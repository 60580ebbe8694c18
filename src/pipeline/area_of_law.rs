//! Final area-of-law classification (spec §4.15): one LLM call aggregating
//! the resolved concepts' branches, extracted metadata fields, and the
//! document-type guess into a ranked list of legal practice areas.
//!
//! Grounded on `backend/app/services/metadata/area_of_law_classifier.py`.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;

use crate::collaborators::llm::LlmClient;
use crate::domain::{AreaOfLaw, Job};

const STAGE_NAME: &str = "area_of_law_classifier";

#[derive(Debug, Deserialize)]
struct AreaOfLawResponse {
    #[serde(default)]
    areas: Vec<AreaEntry>,
}

#[derive(Debug, Deserialize)]
struct AreaEntry {
    name: String,
    #[serde(default)]
    confidence: f32,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "areas": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "confidence": { "type": "number" }
                    },
                    "required": ["name", "confidence"]
                }
            }
        },
        "required": ["areas"]
    })
}

fn prompt_for(job: &Job) -> String {
    let mut branch_counts: HashMap<String, usize> = HashMap::new();
    for concept in &job.scratch.resolved_concepts {
        for branch in &concept.branches {
            *branch_counts.entry(branch.clone()).or_default() += 1;
        }
    }
    let mut branches: Vec<(String, usize)> = branch_counts.into_iter().collect();
    branches.sort_by(|a, b| b.1.cmp(&a.1));
    let branch_listing: Vec<String> = branches.into_iter().map(|(b, n)| format!("{b} ({n})")).collect();

    let fields_listing: Vec<String> = job
        .scratch
        .extracted_fields
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect();

    format!(
        "Classify the area(s) of law this document concerns, ranked by \
         relevance.\n\nDocument type: {}\nConcept branch frequencies: {}\n\
         Extracted fields: {}",
        job.scratch.document_type.as_deref().unwrap_or("unknown"),
        branch_listing.join(", "),
        fields_listing.join(", "),
    )
}

/// Populate `job.scratch.areas_of_law`, ranked by confidence descending
/// (spec §4.15). Leaves the list empty on any LLM failure, matching the
/// pipeline-wide tolerance policy.
pub async fn classify_area_of_law(llm: &dyn LlmClient, job: &mut Job) {
    let prompt = prompt_for(job);
    let Ok(raw) = llm.structured(&prompt, &schema()).await else {
        job.scratch.log(STAGE_NAME, "llm call failed, leaving areas_of_law empty");
        return;
    };
    let Ok(response) = serde_json::from_value::<AreaOfLawResponse>(raw) else {
        job.scratch.log(STAGE_NAME, "llm response did not conform to schema");
        return;
    };

    let mut areas: Vec<AreaOfLaw> = response
        .areas
        .into_iter()
        .map(|e| AreaOfLaw { name: e.name, confidence: e.confidence })
        .collect();
    areas.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));

    job.scratch.areas_of_law = areas;
    job.scratch.log(STAGE_NAME, "areas of law classified");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::llm::NullLlm;
    use crate::domain::DocumentInput;

    #[tokio::test]
    async fn null_llm_leaves_areas_empty() {
        let mut job = Job::new(DocumentInput::plain_text("text"));
        classify_area_of_law(&NullLlm, &mut job).await;
        assert!(job.scratch.areas_of_law.is_empty());
    }
}
