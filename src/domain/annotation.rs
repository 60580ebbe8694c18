//! Annotations and their append-only lineage trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::concept::{ConceptMatch, ConceptState};
use super::span::Span;

/// Appended by every stage that touches an annotation (spec §3).
///
/// Mirrors `StageEvent` in the original (`app/models/annotation.py`) and the
/// teacher's `ErrorEvent` (`channels/errors.rs`) in shape: a scope (here,
/// the stage name), an action, free-form detail, and a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub stage: String,
    pub action: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl StageEvent {
    pub fn new(stage: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            action: action.into(),
            detail: String::new(),
            confidence: None,
            timestamp: Utc::now(),
            reasoning: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationState {
    Preliminary,
    Confirmed,
    Rejected,
}

impl From<ConceptState> for AnnotationState {
    fn from(value: ConceptState) -> Self {
        match value {
            ConceptState::Preliminary | ConceptState::Backup => AnnotationState::Preliminary,
            ConceptState::Confirmed => AnnotationState::Confirmed,
            ConceptState::Rejected => AnnotationState::Rejected,
        }
    }
}

/// User or reviewer feedback attached to an annotation (collected by the
/// external feedback store; carried here only as the shape the core
/// persists alongside an annotation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A stable-identified span linked to one or more concepts (spec §3).
///
/// Invariant: `id` is generated once and never changes. Stages that want
/// to change an annotation's concepts, state, or enrichment must mutate
/// this struct in place (see [`Annotation::upgrade`]) rather than
/// constructing a fresh one, or the progressive event stream (spec §6)
/// will see a spurious add+remove instead of an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub span: Span,
    /// Index 0 is the primary concept; the rest are backup candidates
    /// (spec §3).
    pub concepts: Vec<ConceptMatch>,
    pub state: AnnotationState,
    #[serde(default)]
    pub lineage: Vec<StageEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissed_at: Option<DateTime<Utc>>,
}

impl Annotation {
    /// Create a brand-new annotation with a freshly generated id.
    pub fn new(span: Span, concepts: Vec<ConceptMatch>, state: AnnotationState) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            span,
            concepts,
            state,
            lineage: Vec::new(),
            feedback: None,
            dismissed_at: None,
        }
    }

    /// Append a lineage event recording a stage's touch. Lineage is
    /// append-only (spec §8: "`len(lineage)` is monotonically
    /// non-decreasing").
    pub fn record(&mut self, stage: &str, action: &str, detail: impl Into<String>) {
        self.lineage
            .push(StageEvent::new(stage, action).with_detail(detail));
    }

    /// Replace this annotation's concepts and state in place, preserving
    /// `id` and extending (never truncating) lineage. This is the only
    /// sanctioned way to "upgrade" a preliminary annotation to confirmed
    /// (spec §4.8, "Merging with existing annotations").
    pub fn upgrade(
        &mut self,
        concepts: Vec<ConceptMatch>,
        state: AnnotationState,
        upstream_lineage: impl IntoIterator<Item = StageEvent>,
    ) {
        self.concepts = concepts;
        self.state = state;
        self.lineage.extend(upstream_lineage);
    }

    pub fn primary_iri(&self) -> Option<&str> {
        self.concepts.first().and_then(|c| c.folio_iri.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::concept::ConceptSource;

    #[test]
    fn upgrade_preserves_id_and_extends_lineage() {
        let full = "breach of contract";
        let span = Span::new(full, 0, full.len());
        let mut ann = Annotation::new(
            span,
            vec![ConceptMatch::new("breach of contract", 0.5, ConceptSource::Llm)],
            AnnotationState::Preliminary,
        );
        let original_id = ann.id.clone();
        ann.record("llm_concept_identifier", "preliminary", "seen");
        let len_before = ann.lineage.len();

        ann.upgrade(
            vec![ConceptMatch::new("breach of contract", 0.95, ConceptSource::Matched)],
            AnnotationState::Confirmed,
            vec![StageEvent::new("resolver", "resolved")],
        );

        assert_eq!(ann.id, original_id);
        assert_eq!(ann.state, AnnotationState::Confirmed);
        assert!(ann.lineage.len() > len_before);
    }
}
