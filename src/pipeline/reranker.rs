//! Whole-document reranking (spec §4.12): a single LLM call over the first
//! 3000 characters of normalized text plus the resolved concept list, used
//! to nudge confidences toward the document's overall context. Runs once
//! per job, after resolution, before metadata extraction.
//!
//! Grounded on `backend/app/services/concept/reranker.py`.

use serde::Deserialize;
use serde_json::json;

use crate::collaborators::llm::LlmClient;
use crate::domain::ConceptMatch;

const PREVIEW_CHARS: usize = 3000;
const PIPELINE_WEIGHT: f32 = 0.50;
const RERANK_WEIGHT: f32 = 0.50;

#[derive(Debug, Deserialize)]
struct RerankResponse {
    #[serde(default)]
    adjustments: Vec<RerankEntry>,
}

#[derive(Debug, Deserialize)]
struct RerankEntry {
    concept_text: String,
    confidence: f32,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "adjustments": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "concept_text": { "type": "string" },
                        "confidence": { "type": "number" }
                    },
                    "required": ["concept_text", "confidence"]
                }
            }
        },
        "required": ["adjustments"]
    })
}

fn prompt_for(preview: &str, concepts: &[ConceptMatch]) -> String {
    let listing: Vec<String> = concepts
        .iter()
        .map(|c| format!("- {} (current confidence {:.2})", c.concept_text, c.confidence))
        .collect();
    format!(
        "Given this document excerpt:\n\n{preview}\n\nRe-assess your confidence \
         in each of the following candidate concepts in context:\n{}",
        listing.join("\n")
    )
}

/// Strip a leading ```json fence some providers wrap structured output in
/// before the caller's JSON parser ever sees it (spec §4.12: "must tolerate
/// a leading fenced-code-block"). `LlmClient::structured` implementations
/// are expected to do this themselves, but the reranker defends again here
/// since it is the one stage spec §8 explicitly calls out for it.
fn strip_json_fence(raw: &serde_json::Value) -> serde_json::Value {
    if let serde_json::Value::String(s) = raw {
        let trimmed = s
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        if let Ok(parsed) = serde_json::from_str(trimmed) {
            return parsed;
        }
    }
    raw.clone()
}

/// Run the single whole-document rerank call and blend each named concept's
/// confidence 50/50 with the model's reassessment (spec §4.12). Concepts
/// the model doesn't mention, or any failure path, leave confidences
/// unchanged.
pub async fn rerank(llm: &dyn LlmClient, full_text: &str, mut concepts: Vec<ConceptMatch>) -> Vec<ConceptMatch> {
    if concepts.is_empty() {
        return concepts;
    }

    let preview: String = full_text.chars().take(PREVIEW_CHARS).collect();
    let prompt = prompt_for(&preview, &concepts);

    let Ok(raw) = llm.structured(&prompt, &schema()).await else {
        return concepts;
    };
    let normalized = strip_json_fence(&raw);
    let Ok(response) = serde_json::from_value::<RerankResponse>(normalized) else {
        return concepts;
    };

    for adjustment in response.adjustments {
        if let Some(concept) = concepts
            .iter_mut()
            .find(|c| c.concept_text.eq_ignore_ascii_case(&adjustment.concept_text))
        {
            concept.confidence = concept.confidence * PIPELINE_WEIGHT + adjustment.confidence * RERANK_WEIGHT;
        }
    }

    concepts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::llm::NullLlm;
    use crate::domain::ConceptSource;

    #[tokio::test]
    async fn empty_concept_list_short_circuits() {
        let reranked = rerank(&NullLlm, "some text", Vec::new()).await;
        assert!(reranked.is_empty());
    }

    #[tokio::test]
    async fn null_llm_leaves_confidences_unchanged() {
        let concept = ConceptMatch::new("breach", 0.8, ConceptSource::Matched);
        let reranked = rerank(&NullLlm, "some text", vec![concept.clone()]).await;
        assert_eq!(reranked[0].confidence, concept.confidence);
    }

    #[test]
    fn strips_json_fence_before_parsing() {
        let fenced = serde_json::Value::String("```json\n{\"adjustments\": []}\n```".to_string());
        let parsed = strip_json_fence(&fenced);
        assert!(parsed.is_object());
    }
}
