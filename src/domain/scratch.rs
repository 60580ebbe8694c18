//! Typed replacement for the original's free-form per-job metadata dict.
//!
//! The Python original threads a single mutable `dict[str, Any]` through
//! every stage (`state["ruler_concepts"]`, `state["spo_triples"]`, ...).
//! Per spec §9's design note ("from dynamic typing to statically typed
//! variants"), each well-known key gets its own named, typed field here;
//! anything a caller-supplied stage wants to stash that isn't one of these
//! keys lands in `extra`, mirroring how the original's `_`-prefixed keys were
//! excluded from the externally visible job result.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::concept::ConceptMatch;

/// One subject-verb-object triple discovered by the dependency stage (spec
/// §4.14).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoTriple {
    pub subject_text: String,
    pub predicate_text: String,
    pub object_text: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_individual_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_individual_id: Option<String>,
}

/// A ranked area-of-law classification (spec §4.15).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaOfLaw {
    pub name: String,
    pub confidence: f32,
}

/// Result of the final self-identified-vs-inferred type cross-check (spec
/// §4.16).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub matches: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_identified_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inferred_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discrepancy_note: Option<String>,
}

/// A single entry in the activity log surfaced by the event stream (spec
/// §6, `activity` event).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub stage: String,
    pub message: String,
}

/// Per-job scratch metadata threaded between stages.
///
/// Private ingestion-only slots (`raw_text`, `text_elements`) exist solely to
/// hand data from ingestion to normalization; nothing downstream of
/// normalization should read them, matching the original's pattern of
/// popping its equivalent dict keys once consumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineScratch {
    #[serde(default)]
    pub ruler_concepts: Vec<ConceptMatch>,
    #[serde(default)]
    pub llm_concepts: Vec<ConceptMatch>,
    #[serde(default)]
    pub reconciled_concepts: Vec<ConceptMatch>,
    #[serde(default)]
    pub resolved_concepts: Vec<ConceptMatch>,
    #[serde(default)]
    pub spo_triples: Vec<SpoTriple>,
    #[serde(default)]
    pub areas_of_law: Vec<AreaOfLaw>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_identified_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type_confidence: Option<f32>,
    #[serde(default)]
    pub extracted_fields: FxHashMap<String, String>,
    #[serde(default)]
    pub activity_log: Vec<ActivityEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_report: Option<QualityReport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub text_elements_consumed: bool,

    /// Escape hatch for caller-supplied stages that need to stash something
    /// not modeled above. Never read by any stage shipped in this crate.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, Value>,
}

impl PipelineScratch {
    pub fn log(&mut self, stage: impl Into<String>, message: impl Into<String>) {
        self.activity_log.push(ActivityEntry {
            stage: stage.into(),
            message: message.into(),
        });
    }

    /// Take the raw text staged by ingestion, consuming it. Returns an
    /// empty string (never an error) if ingestion never staged anything,
    /// matching the original's tolerant `dict.pop(key, "")`.
    pub fn take_raw_text(&mut self) -> String {
        self.raw_text.take().unwrap_or_default()
    }
}
