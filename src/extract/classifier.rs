//! Document-type classifier (spec §2: "Document-type classifier" parallel
//! stage; spec §4.13 phase 1 reuses its result). Classifies from the first
//! 500 characters of normalized text via a structured LLM call.
//!
//! Grounded on `backend/app/services/metadata/document_classifier.py`.

use serde::Deserialize;
use serde_json::json;

use crate::collaborators::llm::LlmClient;

const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct ClassificationResponse {
    document_type: String,
    #[serde(default)]
    confidence: f32,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "document_type": { "type": "string" },
            "confidence": { "type": "number" }
        },
        "required": ["document_type", "confidence"]
    })
}

/// Classify the document's type from its opening text (spec §4.13 phase 1:
/// "classify from the first 500 chars via LLM"). Returns `None` on any LLM
/// failure, matching the pipeline-wide tolerance policy (spec §5, §7).
pub async fn classify_document_type(llm: &dyn LlmClient, full_text: &str) -> Option<(String, f32)> {
    let preview: String = full_text.chars().take(PREVIEW_CHARS).collect();
    if preview.trim().is_empty() {
        return None;
    }
    let prompt = format!(
        "Classify the legal document type (e.g. contract, nda, pleading, \
         statute, memo, email) from this excerpt:\n\n{preview}"
    );
    let raw = llm.structured(&prompt, &schema()).await.ok()?;
    let response: ClassificationResponse = serde_json::from_value(raw).ok()?;
    Some((response.document_type, response.confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::llm::NullLlm;

    #[tokio::test]
    async fn null_llm_yields_none() {
        assert!(classify_document_type(&NullLlm, "Some contract text").await.is_none());
    }

    #[tokio::test]
    async fn empty_text_yields_none() {
        assert!(classify_document_type(&NullLlm, "   ").await.is_none());
    }
}
