//! Exercises [`folio_enrich_core::event_stream::watch_job`] end to end
//! against a running orchestrator and an `InMemoryJobStore`, verifying the
//! stream observes the job transition to `completed` and ends with exactly
//! one `complete` event.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;

use folio_enrich_core::collaborators::job_store::{InMemoryJobStore, JobStore};
use folio_enrich_core::collaborators::llm::NullLlm;
use folio_enrich_core::collaborators::ontology::InMemoryOntology;
use folio_enrich_core::domain::{DocumentInput, Job};
use folio_enrich_core::event_stream::{watch_job, EnrichmentEvent};
use folio_enrich_core::{build_orchestrator, PipelineDeps};

#[tokio::test]
async fn watch_job_terminates_with_a_single_complete_event() {
    let ontology = Arc::new(InMemoryOntology::new(vec![], vec![]));
    let job_store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let deps = PipelineDeps::new(ontology, Arc::new(NullLlm), Arc::clone(&job_store));
    let orchestrator = build_orchestrator(deps);

    let job = Job::new(DocumentInput::plain_text("A short contract dispute notice."));
    let job_id = job.id.clone();
    job_store.save(&job).await.unwrap();

    let run_store = Arc::clone(&job_store);
    tokio::spawn(async move {
        let orchestrator = orchestrator;
        let _ = orchestrator.run(job).await;
        let _ = run_store;
    });

    let events: Vec<EnrichmentEvent> =
        watch_job(job_store.as_ref(), job_id.clone(), Duration::from_millis(10))
            .take(200)
            .collect()
            .await;

    let complete_events = events
        .iter()
        .filter(|e| matches!(e, EnrichmentEvent::Complete { .. }))
        .count();
    assert_eq!(complete_events, 1, "stream must emit exactly one complete event");

    let last = events.last().expect("stream yielded at least one event");
    assert!(
        matches!(last, EnrichmentEvent::Complete { .. }),
        "complete must be the final event"
    );
}

#[tokio::test]
async fn watch_job_reports_error_for_unknown_job_id() {
    let job_store = InMemoryJobStore::new();
    let events: Vec<EnrichmentEvent> =
        watch_job(&job_store, "does-not-exist".to_string(), Duration::from_millis(10))
            .collect()
            .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], EnrichmentEvent::Error { .. }));
}
