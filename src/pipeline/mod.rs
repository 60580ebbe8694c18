//! The post-matching enrichment pipeline: reconciliation, ontology
//! resolution, branch disambiguation, whole-document reranking, metadata
//! extraction, dependency (SPO) extraction, area-of-law classification, and
//! the final quality cross-check (spec §4.6-§4.7, §4.11-§4.16).

pub mod area_of_law;
pub mod branch_judge;
pub mod dependency;
pub mod metadata_stage;
pub mod quality_checker;
pub mod reconciler;
pub mod reranker;
pub mod resolver;
