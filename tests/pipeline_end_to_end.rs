//! End-to-end tests driving the full orchestrator built by
//! [`folio_enrich_core::build_orchestrator`] against a small in-memory
//! ontology, `NullLlm`, and an `InMemoryJobStore`.

use std::sync::Arc;

use folio_enrich_core::collaborators::job_store::{InMemoryJobStore, JobStore};
use folio_enrich_core::collaborators::llm::{FailingLlm, NullLlm};
use folio_enrich_core::collaborators::ontology::{Concept, InMemoryOntology};
use folio_enrich_core::domain::{ConceptSource, DocumentInput, Job, JobStatus};
use folio_enrich_core::{build_orchestrator, PipelineDeps};

fn concept(iri: &str, label: &str, branch: &str) -> Concept {
    Concept {
        iri: iri.into(),
        label: label.into(),
        preferred_label: label.into(),
        alternative_labels: vec![],
        definition: Some(format!("{label} definition")),
        examples: vec![],
        translations: vec![],
        sub_class_of: vec![],
        parent_class_of: vec![],
        see_also: vec![],
        branches: vec![branch.into()],
        domain_iris: vec![],
        range_iris: vec![],
        inverse_of: None,
    }
}

fn sample_ontology() -> Arc<InMemoryOntology> {
    Arc::new(InMemoryOntology::new(
        vec![
            concept("folio:BreachOfContract", "Breach of Contract", "Litigation"),
            concept("folio:Lease", "Lease Agreement", "RealProperty"),
        ],
        vec![],
    ))
}

fn build_deps() -> PipelineDeps {
    let ontology = sample_ontology();
    let job_store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    PipelineDeps::new(ontology, Arc::new(NullLlm), job_store)
}

#[tokio::test]
async fn plain_text_document_runs_to_completion() {
    let deps = build_deps();
    let job_store = Arc::clone(&deps.job_store);
    let orchestrator = build_orchestrator(deps);

    let document = DocumentInput::plain_text(
        "This agreement concerns a breach of contract between the parties. \
         The lease agreement was signed on January 1, 2020.",
    );
    let job = Job::new(document);
    let job_id = job.id.clone();

    let finished = orchestrator.run(job).await;

    assert_eq!(finished.status, JobStatus::Completed);
    assert!(finished.canonical_text.is_some(), "normalization must populate canonical_text");
    assert!(!finished.scratch.activity_log.is_empty(), "every stage should log activity");

    let persisted = job_store
        .load(&job_id)
        .await
        .unwrap()
        .expect("orchestrator persists the job after completion");
    assert_eq!(persisted.status, JobStatus::Completed);
}

#[tokio::test]
async fn string_matcher_upgrades_label_matches_to_confirmed_annotations() {
    let deps = build_deps();
    let orchestrator = build_orchestrator(deps);

    let document = DocumentInput::plain_text(
        "The tenant alleges a breach of contract under the lease agreement.",
    );
    let job = Job::new(document);
    let finished = orchestrator.run(job).await;

    assert_eq!(finished.status, JobStatus::Completed);
    let labels: Vec<String> = finished
        .annotations
        .iter()
        .filter_map(|a| a.concepts.first().and_then(|c| c.folio_label.clone()))
        .collect();
    assert!(
        labels.iter().any(|l| l.eq_ignore_ascii_case("breach of contract"))
            || labels.iter().any(|l| l.eq_ignore_ascii_case("lease agreement")),
        "expected at least one confirmed label match, got {labels:?}"
    );
}

#[tokio::test]
async fn citation_extraction_produces_individuals() {
    let deps = build_deps();
    let orchestrator = build_orchestrator(deps);

    let document = DocumentInput::plain_text(
        "This claim arises under 42 U.S.C. § 1983 and was decided in Smith v. Jones, 123 F.3d 456 (9th Cir. 1999).",
    );
    let job = Job::new(document);
    let finished = orchestrator.run(job).await;

    assert_eq!(finished.status, JobStatus::Completed);
    assert!(
        !finished.individuals.is_empty(),
        "citation extractor should find at least one individual in a document with statutory/case citations"
    );
}

#[tokio::test]
async fn empty_document_still_completes() {
    let deps = build_deps();
    let orchestrator = build_orchestrator(deps);

    let job = Job::new(DocumentInput::plain_text(""));
    let finished = orchestrator.run(job).await;

    assert_eq!(finished.status, JobStatus::Completed);
    assert!(finished.annotations.is_empty());
    assert!(finished.individuals.is_empty());
}

#[tokio::test]
async fn rerunning_orchestrator_on_same_job_id_is_idempotent_in_store() {
    let deps = build_deps();
    let job_store = Arc::clone(&deps.job_store);
    let orchestrator = build_orchestrator(deps);

    let job = Job::new(DocumentInput::plain_text("Breach of contract claim."));
    let job_id = job.id.clone();

    let first = orchestrator.run(job).await;
    assert_eq!(first.status, JobStatus::Completed);

    let second = orchestrator.run(first.clone()).await;
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.id, job_id);

    let persisted = job_store.load(&job_id).await.unwrap().unwrap();
    assert_eq!(persisted.status, JobStatus::Completed);
}

/// Spec §8, end-to-end scenario 4 ("LLM failure tolerance"): every LLM call
/// errors, the job must still reach `completed`, and every surviving
/// annotation must have come from the label matcher alone.
#[tokio::test]
async fn llm_failures_do_not_fail_the_job() {
    let ontology = sample_ontology();
    let job_store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let deps = PipelineDeps::new(ontology, Arc::new(FailingLlm), job_store);
    let orchestrator = build_orchestrator(deps);

    let document = DocumentInput::plain_text(
        "The tenant alleges a breach of contract under the lease agreement.",
    );
    let job = Job::new(document);
    let finished = orchestrator.run(job).await;

    assert_eq!(finished.status, JobStatus::Completed);
    assert!(
        finished
            .annotations
            .iter()
            .flat_map(|a| a.concepts.iter())
            .all(|c| c.source != ConceptSource::Llm),
        "with every LLM call failing, no concept should carry an llm source"
    );
}
