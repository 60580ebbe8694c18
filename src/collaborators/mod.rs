//! External collaborator contracts (spec §6): everything this crate treats
//! as a read-only or side-effecting dependency rather than part of the
//! pipeline core itself — ingesters, the ontology lookup, LLM adapters, the
//! citation library, and the job store.

pub mod citation;
pub mod ingestion;
pub mod job_store;
pub mod llm;
pub mod ontology;
