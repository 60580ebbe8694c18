//! Multi-pass extractors: document classification, LLM concept
//! identification, and the two-phase individual/property extractors (spec
//! §4.5, §4.9, §4.10).

pub mod classifier;
pub mod concept_identifier;
pub mod individuals;
pub mod properties;
