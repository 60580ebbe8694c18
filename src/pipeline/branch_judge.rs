//! Branch disambiguation (spec §4.11): for resolved concepts that carry no
//! branch (the ontology's polyhierarchy left it ambiguous, or an ancestor
//! walk produced none), ask the model to pick the most likely FOLIO branch
//! from the catalog and blend its answer with the pipeline's own
//! confidence.
//!
//! Grounded on `backend/app/services/concept/branch_judge.py`.

use serde::Deserialize;
use serde_json::json;

use crate::collaborators::llm::LlmClient;
use crate::domain::ConceptMatch;

/// Blend weights from spec §4.11: "70% pipeline confidence, 30% judge
/// confidence".
const PIPELINE_WEIGHT: f32 = 0.70;
const JUDGE_WEIGHT: f32 = 0.30;

#[derive(Debug, Deserialize)]
struct JudgeResponse {
    branch: String,
    #[serde(default)]
    confidence: f32,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "branch": { "type": "string" },
            "confidence": { "type": "number" }
        },
        "required": ["branch", "confidence"]
    })
}

fn prompt_for(concept: &ConceptMatch, branch_catalog: &[String]) -> String {
    format!(
        "Which FOLIO branch does the concept \"{}\" (definition: {}) belong \
         to? Candidates: {}.",
        concept.concept_text,
        concept.folio_definition.as_deref().unwrap_or("unknown"),
        branch_catalog.join(", "),
    )
}

/// Dispatch one judge call per unbranched concept concurrently, blending
/// each response's confidence with the concept's existing confidence (spec
/// §4.11). Concepts that already carry a branch, or whose judge call fails,
/// are returned unchanged.
pub async fn judge_branches(llm: &dyn LlmClient, concepts: Vec<ConceptMatch>, branch_catalog: &[String]) -> Vec<ConceptMatch> {
    let futures = concepts.into_iter().map(|concept| async move {
        if !concept.branches.is_empty() || branch_catalog.is_empty() {
            return concept;
        }
        judge_one(llm, concept, branch_catalog).await
    });

    futures_util::future::join_all(futures).await
}

async fn judge_one(llm: &dyn LlmClient, mut concept: ConceptMatch, branch_catalog: &[String]) -> ConceptMatch {
    let prompt = prompt_for(&concept, branch_catalog);
    let Ok(raw) = llm.structured(&prompt, &schema()).await else {
        return concept;
    };
    let Ok(response) = serde_json::from_value::<JudgeResponse>(raw) else {
        return concept;
    };
    if response.branch.is_empty() {
        return concept;
    }

    concept.branches.push(response.branch);
    concept.confidence = concept.confidence * PIPELINE_WEIGHT + response.confidence * JUDGE_WEIGHT;
    concept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::llm::NullLlm;
    use crate::domain::ConceptSource;

    #[tokio::test]
    async fn already_branched_concepts_are_left_untouched() {
        let mut concept = ConceptMatch::new("breach", 0.8, ConceptSource::Matched);
        concept.branches.push("Contracts".into());
        let judged = judge_branches(&NullLlm, vec![concept.clone()], &["Contracts".into()]).await;
        assert_eq!(judged[0].branches, concept.branches);
        assert_eq!(judged[0].confidence, concept.confidence);
    }

    #[tokio::test]
    async fn null_llm_leaves_unbranched_concept_unbranched() {
        let concept = ConceptMatch::new("mystery term", 0.5, ConceptSource::Matched);
        let judged = judge_branches(&NullLlm, vec![concept], &["Contracts".into(), "Litigation".into()]).await;
        assert!(judged[0].branches.is_empty());
    }
}
