//! Post-completion quality cross-check (spec §4.16): the final
//! post-parallel stage, comparing the document's self-identified type
//! (extracted as a metadata field, e.g. a title block reading "LEASE
//! AGREEMENT") against the pipeline's own inferred `document_type`, and
//! recording any discrepancy.
//!
//! Grounded on `backend/app/services/metadata/quality_checker.py`.

use serde::Deserialize;
use serde_json::json;

use crate::collaborators::llm::LlmClient;
use crate::domain::{Job, QualityReport};

const STAGE_NAME: &str = "quality_checker";

#[derive(Debug, Deserialize)]
struct QualityResponse {
    matches: bool,
    #[serde(default)]
    discrepancy_note: Option<String>,
}

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "matches": { "type": "boolean" },
            "discrepancy_note": { "type": "string" }
        },
        "required": ["matches"]
    })
}

fn prompt_for(self_identified: &str, inferred: &str) -> String {
    format!(
        "A document appears to self-identify as \"{self_identified}\" but the \
         enrichment pipeline inferred its type as \"{inferred}\". Do these \
         describe the same kind of document? Note any discrepancy."
    )
}

/// Compare `scratch.self_identified_type` (when present) against
/// `scratch.document_type`, producing a [`QualityReport`] and appending an
/// activity entry either way (spec §4.16). Skipped entirely when no
/// self-identified type was extracted — there is nothing to cross-check.
pub async fn check_quality(llm: &dyn LlmClient, job: &mut Job) {
    let (Some(self_identified), Some(inferred)) =
        (job.scratch.self_identified_type.clone(), job.scratch.document_type.clone())
    else {
        return;
    };

    if self_identified.eq_ignore_ascii_case(&inferred) {
        job.scratch.quality_report = Some(QualityReport {
            matches: true,
            self_identified_type: Some(self_identified),
            inferred_type: Some(inferred),
            discrepancy_note: None,
        });
        job.scratch.log(STAGE_NAME, "self-identified and inferred types match exactly");
        return;
    }

    let prompt = prompt_for(&self_identified, &inferred);
    let report = match llm.structured(&prompt, &schema()).await {
        Ok(raw) => match serde_json::from_value::<QualityResponse>(raw) {
            Ok(response) => QualityReport {
                matches: response.matches,
                self_identified_type: Some(self_identified),
                inferred_type: Some(inferred),
                discrepancy_note: response.discrepancy_note,
            },
            Err(_) => QualityReport {
                matches: false,
                self_identified_type: Some(self_identified),
                inferred_type: Some(inferred),
                discrepancy_note: Some("quality check response did not conform to schema".into()),
            },
        },
        Err(_) => QualityReport {
            matches: false,
            self_identified_type: Some(self_identified),
            inferred_type: Some(inferred),
            discrepancy_note: Some("quality check llm call failed".into()),
        },
    };

    job.scratch.log(STAGE_NAME, format!("quality check complete: matches={}", report.matches));
    job.scratch.quality_report = Some(report);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::llm::NullLlm;
    use crate::domain::DocumentInput;

    #[tokio::test]
    async fn skipped_when_no_self_identified_type() {
        let mut job = Job::new(DocumentInput::plain_text("text"));
        job.scratch.document_type = Some("contract".into());
        check_quality(&NullLlm, &mut job).await;
        assert!(job.scratch.quality_report.is_none());
    }

    #[tokio::test]
    async fn exact_match_short_circuits_llm_call() {
        let mut job = Job::new(DocumentInput::plain_text("text"));
        job.scratch.self_identified_type = Some("Lease Agreement".into());
        job.scratch.document_type = Some("lease agreement".into());
        check_quality(&NullLlm, &mut job).await;
        assert!(job.scratch.quality_report.as_ref().unwrap().matches);
    }

    #[tokio::test]
    async fn mismatch_triggers_llm_cross_check() {
        let mut job = Job::new(DocumentInput::plain_text("text"));
        job.scratch.self_identified_type = Some("Lease Agreement".into());
        job.scratch.document_type = Some("nda".into());
        check_quality(&NullLlm, &mut job).await;
        let report = job.scratch.quality_report.as_ref().unwrap();
        assert!(!report.matches);
    }
}
