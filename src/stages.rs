//! Concrete [`Stage`] implementations wiring the pure algorithm modules
//! (`matcher`, `extract`, `pipeline`) into the orchestrator (spec §4).
//!
//! Each stage is a thin adapter: it reads whatever the job already carries,
//! calls into the already-tested pure function or collaborator, and writes
//! the result back onto the job. Stages that need a built-once collaborator
//! (an [`EntityRuler`], a [`PropertyMatcher`]) hold it behind an `Arc` handed
//! in at construction, per spec §9's "explicit construction instead of
//! lazy singletons".

use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::citation::CitationExtractor;
use crate::collaborators::ingestion::IngesterRegistry;
use crate::collaborators::llm::LlmClient;
use crate::collaborators::ontology::Ontology;
use crate::config::PipelineConfig;
use crate::domain::{ConceptMatch, ConceptState, Job, TextElement};
use crate::extract::{classifier, concept_identifier, individuals, properties};
use crate::matcher::entity_ruler::{self, EntityRuler};
use crate::matcher::property_matcher::PropertyMatcher;
use crate::matcher::string_matcher::{self, IndexedLabel, StringMatcher};
use crate::normalize;
use crate::orchestrator::stage::{Phase, Stage, StageContext, StageError};
use crate::pipeline::{area_of_law, branch_judge, dependency, metadata_stage, quality_checker, reconciler, resolver};

type Result<T> = std::result::Result<T, StageError>;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "of", "to", "in", "on", "at", "by", "for", "with",
    "is", "are", "was", "were", "be", "been", "being", "it", "this", "that",
];

fn branch_catalog(ontology: &dyn Ontology) -> Vec<String> {
    ontology.get_folio_branches(1).keys().cloned().collect()
}

fn full_text(job: &Job) -> Result<String> {
    job.canonical_text
        .as_ref()
        .map(|c| c.full_text.clone())
        .ok_or(StageError::MissingInput { stage: "pipeline", what: "canonical_text" })
}

/// Pre-parallel: delegates to the format-indexed [`IngesterRegistry`],
/// stashing raw text and structural elements in `job.scratch` for
/// [`NormalizeStage`] to consume (spec §4.2).
pub struct IngestStage {
    pub registry: Arc<IngesterRegistry>,
}

#[async_trait]
impl Stage for IngestStage {
    fn name(&self) -> &'static str {
        "ingestion"
    }

    fn phase(&self) -> Phase {
        Phase::PreParallel
    }

    async fn execute(&self, mut job: Job, ctx: &StageContext) -> Result<Job> {
        let ingested = self.registry.ingest(&job.document).await.map_err(|err| StageError::Collaborator {
            stage: ctx.stage_name,
            collaborator: "ingester",
            message: err.to_string(),
        })?;
        job.scratch.raw_text = Some(ingested.text);
        let elements = serde_json::to_value(&ingested.elements).unwrap_or(serde_json::Value::Null);
        job.scratch.extra.insert("_text_elements".to_string(), elements);
        job.scratch.log(self.name(), "ingested document");
        Ok(job)
    }
}

/// Pre-parallel: whitespace collapse, legal-aware sentence splitting, and
/// sentence-bounded chunking (spec §4.3).
pub struct NormalizeStage {
    pub config: PipelineConfig,
}

#[async_trait]
impl Stage for NormalizeStage {
    fn name(&self) -> &'static str {
        "normalization"
    }

    fn phase(&self) -> Phase {
        Phase::PreParallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let raw_text = job.scratch.take_raw_text();
        let elements: Vec<TextElement> = job
            .scratch
            .extra
            .remove("_text_elements")
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        job.canonical_text = Some(normalize::normalize(&raw_text, elements, &self.config));
        job.scratch.log(self.name(), "normalized and chunked");
        Ok(job)
    }
}

/// Parallel: document-type classification from a preview of the full text
/// (spec §2: "Document-type classifier").
pub struct ClassifierStage {
    pub llm: Arc<dyn LlmClient>,
}

#[async_trait]
impl Stage for ClassifierStage {
    fn name(&self) -> &'static str {
        "document_type_classifier"
    }

    fn phase(&self) -> Phase {
        Phase::Parallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let text = full_text(&job)?;
        if let Some((document_type, confidence)) = classifier::classify_document_type(self.llm.as_ref(), &text).await
        {
            job.scratch.document_type = Some(document_type);
            job.scratch.document_type_confidence = Some(confidence);
        }
        job.scratch.log(self.name(), "document type classified");
        Ok(job)
    }
}

/// Parallel: the deterministic label matcher (spec §4.4). Holds a
/// pre-built [`EntityRuler`] so the automaton is constructed once at
/// startup, not per job.
pub struct EntityRulerStage {
    pub ruler: Arc<EntityRuler>,
}

#[async_trait]
impl Stage for EntityRulerStage {
    fn name(&self) -> &'static str {
        "entity_ruler"
    }

    fn phase(&self) -> Phase {
        Phase::Parallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let text = full_text(&job)?;
        let hits = self.ruler.scan(&text);
        let concepts = entity_ruler::hits_to_concepts(&hits).into_iter().map(|(_, c)| c).collect();
        job.scratch.ruler_concepts = concepts;
        job.scratch.log(self.name(), "ran deterministic label matcher");
        Ok(job)
    }
}

/// Parallel: LLM concept identification plus preliminary annotation
/// materialization (spec §4.5).
pub struct ConceptIdentifierStage {
    pub llm: Arc<dyn LlmClient>,
    pub ontology: Arc<dyn Ontology>,
}

#[async_trait]
impl Stage for ConceptIdentifierStage {
    fn name(&self) -> &'static str {
        "llm_concept_identifier"
    }

    fn phase(&self) -> Phase {
        Phase::Parallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let canonical = job
            .canonical_text
            .clone()
            .ok_or(StageError::MissingInput { stage: self.name(), what: "canonical_text" })?;
        let catalog = branch_catalog(self.ontology.as_ref());
        let concepts = concept_identifier::identify_concepts(self.llm.as_ref(), &canonical.chunks, &catalog).await;

        let property_labels: std::collections::HashMap<String, ()> =
            self.ontology.get_all_property_labels().keys().map(|k| (k.clone(), ())).collect();
        let concepts = concept_identifier::suppress_property_text(concepts, &property_labels);

        let preliminary =
            concept_identifier::build_preliminary_annotations(&canonical.full_text, &canonical.chunks, &concepts);

        job.annotations.extend(preliminary);
        job.scratch.llm_concepts = concepts;
        job.scratch.log(self.name(), "ran llm concept identifier");
        Ok(job)
    }
}

/// Parallel: the no-LLM citation + regex pass of the individual extractor
/// (spec §4.9, "Early phase (no LLM)").
pub struct EarlyIndividualStage {
    pub citation_extractor: Arc<dyn CitationExtractor>,
}

#[async_trait]
impl Stage for EarlyIndividualStage {
    fn name(&self) -> &'static str {
        "early_individual_extractor"
    }

    fn phase(&self) -> Phase {
        Phase::Parallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let text = full_text(&job)?;
        let mut found = individuals::extract_citations(self.citation_extractor.as_ref(), &text);
        found.extend(individuals::extract_regex_individuals(&text));
        job.individuals = individuals::dedup_individuals(found);
        job.scratch.log(self.name(), "ran early individual extractor");
        Ok(job)
    }
}

/// Parallel: the Aho-Corasick property-label pass (spec §4.10, early
/// phase). Holds a pre-built [`PropertyMatcher`].
pub struct EarlyPropertyStage {
    pub matcher: Arc<PropertyMatcher>,
}

#[async_trait]
impl Stage for EarlyPropertyStage {
    fn name(&self) -> &'static str {
        "early_property_matcher"
    }

    fn phase(&self) -> Phase {
        Phase::Parallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let text = full_text(&job)?;
        job.properties = self.matcher.scan(&text);
        job.scratch.log(self.name(), "ran early property matcher");
        Ok(job)
    }
}

/// Post-parallel: three-source reconciliation of ruler vs. LLM concepts,
/// syncing preliminary annotation state (spec §4.6).
pub struct ReconcilerStage {
    pub config: PipelineConfig,
}

#[async_trait]
impl Stage for ReconcilerStage {
    fn name(&self) -> &'static str {
        "reconciler"
    }

    fn phase(&self) -> Phase {
        Phase::PostParallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let ruler = std::mem::take(&mut job.scratch.ruler_concepts);
        let llm = std::mem::take(&mut job.scratch.llm_concepts);
        let reconciled = reconciler::reconcile(ruler, llm, &self.config);
        reconciler::sync_annotation_states(&mut job.annotations, &reconciled);
        job.scratch.reconciled_concepts = reconciled.into_iter().map(|(_, c)| c).collect();
        job.scratch.log(self.name(), "reconciled concept sets");
        Ok(job)
    }
}

/// Post-parallel: maps each reconciled concept to an ontology entry via the
/// seven-strategy resolver (spec §4.7).
pub struct ResolverStage {
    pub ontology: Arc<dyn Ontology>,
    pub config: PipelineConfig,
}

#[async_trait]
impl Stage for ResolverStage {
    fn name(&self) -> &'static str {
        "resolver"
    }

    fn phase(&self) -> Phase {
        Phase::PostParallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let reconciled = std::mem::take(&mut job.scratch.reconciled_concepts);
        let mut cache = resolver::ResolverCache::new();
        let mut resolved = Vec::with_capacity(reconciled.len());

        for concept in reconciled {
            let branch_hint = concept.branches.first().map(String::as_str);
            let iri = concept.folio_iri.as_deref();
            match resolver::resolve(
                self.ontology.as_ref(),
                &mut cache,
                &concept.concept_text,
                branch_hint,
                iri,
                concept.confidence,
                &self.config,
            ) {
                Some((mut matched, backups)) => {
                    matched.concept_text = concept.concept_text.clone();
                    matched.confidence = matched.confidence.max(concept.confidence);
                    resolved.push(matched);
                    for mut backup in backups {
                        backup.concept_text = concept.concept_text.clone();
                        resolved.push(backup);
                    }
                }
                None => resolved.push(concept),
            }
        }

        job.scratch.resolved_concepts = resolved;
        job.scratch.log(self.name(), "resolved concepts against ontology");
        Ok(job)
    }
}

fn indexed_labels(resolved: &[ConceptMatch]) -> Vec<IndexedLabel> {
    let mut out = Vec::new();
    for concept in resolved {
        if concept.folio_iri.is_none() {
            continue;
        }
        if string_matcher::is_safe_label(&concept.concept_text, STOP_WORDS) {
            out.push(IndexedLabel { label: concept.concept_text.clone(), concept: concept.clone() });
        }
        if let Some(label) = &concept.folio_label {
            if string_matcher::is_safe_label(label, STOP_WORDS) {
                out.push(IndexedLabel { label: label.clone(), concept: concept.clone() });
            }
        }
        for alt in concept.folio_alt_labels.iter().flatten() {
            if string_matcher::is_safe_label(alt, STOP_WORDS) {
                out.push(IndexedLabel { label: alt.clone(), concept: concept.clone() });
            }
        }
    }
    out
}

/// Post-parallel: the post-resolution Aho-Corasick string matcher,
/// upgrading preliminary annotations to confirmed (spec §4.8).
pub struct StringMatcherStage;

#[async_trait]
impl Stage for StringMatcherStage {
    fn name(&self) -> &'static str {
        "string_matcher"
    }

    fn phase(&self) -> Phase {
        Phase::PostParallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let text = full_text(&job)?;
        let labels = indexed_labels(&job.scratch.resolved_concepts);
        if labels.is_empty() {
            job.scratch.log(self.name(), "no resolved labels to match");
            return Ok(job);
        }
        let matcher = StringMatcher::build(labels);
        let accepted_spans = matcher.matches(&text);

        let accepted = accepted_spans
            .into_iter()
            .map(|(start, end, matched_text)| {
                let span = crate::domain::Span::new(&text, start, end);
                let concepts = matcher.concepts_for(&matched_text).to_vec();
                (span, concepts)
            })
            .collect();

        let result = string_matcher::merge_matches(std::mem::take(&mut job.annotations), accepted);
        job.annotations = result.annotations;
        job.scratch.log(self.name(), "upgraded annotations via string matcher");
        Ok(job)
    }
}

/// Post-parallel: LLM-discovered individuals plus the final
/// source-priority dedup pass (spec §4.9, LLM phase and dedup).
pub struct IndividualLlmStage {
    pub llm: Arc<dyn LlmClient>,
}

#[async_trait]
impl Stage for IndividualLlmStage {
    fn name(&self) -> &'static str {
        "llm_individual_extractor"
    }

    fn phase(&self) -> Phase {
        Phase::PostParallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let canonical = job
            .canonical_text
            .clone()
            .ok_or(StageError::MissingInput { stage: self.name(), what: "canonical_text" })?;
        let discovered = individuals::extract_llm_individuals(
            self.llm.as_ref(),
            &canonical.chunks,
            &canonical.full_text,
            &job.annotations,
            &job.individuals,
        )
        .await;
        let mut all = std::mem::take(&mut job.individuals);
        all.extend(discovered);
        job.individuals = individuals::dedup_individuals(all);
        job.scratch.log(self.name(), "ran llm individual extractor and deduped");
        Ok(job)
    }
}

/// Post-parallel: the LLM property-relation pass plus merge against the
/// early string-match pass (spec §4.10, LLM phase).
pub struct PropertyLlmStage {
    pub llm: Arc<dyn LlmClient>,
}

#[async_trait]
impl Stage for PropertyLlmStage {
    fn name(&self) -> &'static str {
        "llm_property_extractor"
    }

    fn phase(&self) -> Phase {
        Phase::PostParallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let canonical = job
            .canonical_text
            .clone()
            .ok_or(StageError::MissingInput { stage: self.name(), what: "canonical_text" })?;
        let discovered =
            properties::identify_properties(self.llm.as_ref(), &canonical.chunks, &canonical.full_text).await;
        job.properties = properties::merge_properties(std::mem::take(&mut job.properties), discovered);
        job.scratch.log(self.name(), "ran llm property extractor");
        Ok(job)
    }
}

/// Post-parallel: LLM branch disambiguation for concepts lacking a branch
/// assignment (spec §4.11... actually §4.7's branch judge, component table
/// row "Branch judge").
pub struct BranchJudgeStage {
    pub llm: Arc<dyn LlmClient>,
    pub ontology: Arc<dyn Ontology>,
}

#[async_trait]
impl Stage for BranchJudgeStage {
    fn name(&self) -> &'static str {
        "branch_judge"
    }

    fn phase(&self) -> Phase {
        Phase::PostParallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let catalog = branch_catalog(self.ontology.as_ref());
        let concepts = std::mem::take(&mut job.scratch.resolved_concepts);
        // Backup candidates ride along in `resolved_concepts` (spec §4.7)
        // purely so the string matcher can surface them under their
        // primary's label; judging is a primary-concept concern only, so
        // backups are set aside and reappended untouched.
        let (primaries, backups): (Vec<_>, Vec<_>) =
            concepts.into_iter().partition(|c| c.state != ConceptState::Backup);
        let mut judged = branch_judge::judge_branches(self.llm.as_ref(), primaries, &catalog).await;
        judged.extend(backups);
        job.scratch.resolved_concepts = judged;
        job.scratch.log(self.name(), "judged unbranched concepts");
        Ok(job)
    }
}

/// Post-parallel: single-batch whole-document reranking of resolved
/// concepts (spec §4.12... component table "Contextual reranker").
pub struct RerankerStage {
    pub llm: Arc<dyn LlmClient>,
}

#[async_trait]
impl Stage for RerankerStage {
    fn name(&self) -> &'static str {
        "contextual_reranker"
    }

    fn phase(&self) -> Phase {
        Phase::PostParallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let text = full_text(&job)?;
        let concepts = std::mem::take(&mut job.scratch.resolved_concepts);
        let (primaries, backups): (Vec<_>, Vec<_>) =
            concepts.into_iter().partition(|c| c.state != ConceptState::Backup);
        let mut reranked = crate::pipeline::reranker::rerank(self.llm.as_ref(), &text, primaries).await;
        reranked.extend(backups);
        job.scratch.resolved_concepts = reranked;
        job.scratch.log(self.name(), "reranked concepts against document context");
        Ok(job)
    }
}

/// Post-parallel: the five-phase metadata extractor (spec §4.13).
pub struct MetadataStage {
    pub llm: Arc<dyn LlmClient>,
    pub config: PipelineConfig,
}

#[async_trait]
impl Stage for MetadataStage {
    fn name(&self) -> &'static str {
        "metadata_extractor"
    }

    fn phase(&self) -> Phase {
        Phase::PostParallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        metadata_stage::run(self.llm.as_ref(), &mut job, &self.config).await;
        Ok(job)
    }
}

/// Post-parallel: heuristic SVO extraction cross-linked with individuals
/// (spec §4.14).
pub struct DependencyStage;

#[async_trait]
impl Stage for DependencyStage {
    fn name(&self) -> &'static str {
        "dependency_extractor"
    }

    fn phase(&self) -> Phase {
        Phase::PostParallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        let text = full_text(&job)?;
        job.scratch.spo_triples = dependency::extract_triples(&text, &job.individuals);
        job.scratch.log(self.name(), "extracted subject-verb-object triples");
        Ok(job)
    }
}

/// Post-parallel: final area-of-law classification (spec §4.15).
pub struct AreaOfLawStage {
    pub llm: Arc<dyn LlmClient>,
}

#[async_trait]
impl Stage for AreaOfLawStage {
    fn name(&self) -> &'static str {
        "area_of_law_classifier"
    }

    fn phase(&self) -> Phase {
        Phase::PostParallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        area_of_law::classify_area_of_law(self.llm.as_ref(), &mut job).await;
        Ok(job)
    }
}

/// Post-parallel: the final self-identified-vs-inferred quality cross-check
/// (spec §4.16).
pub struct QualityCheckerStage {
    pub llm: Arc<dyn LlmClient>,
}

#[async_trait]
impl Stage for QualityCheckerStage {
    fn name(&self) -> &'static str {
        "quality_checker"
    }

    fn phase(&self) -> Phase {
        Phase::PostParallel
    }

    async fn execute(&self, mut job: Job, _ctx: &StageContext) -> Result<Job> {
        quality_checker::check_quality(self.llm.as_ref(), &mut job).await;
        Ok(job)
    }
}
