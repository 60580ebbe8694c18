//! Pipeline configuration.
//!
//! Mirrors `backend/app/config.py` in the original implementation, but
//! constructed explicitly and passed down rather than read from a global
//! settings singleton (spec §9: "from singletons with lazy init to explicit
//! construction"). [`PipelineConfig::from_env`] loads `dotenvy`-style
//! environment overrides the way the teacher's `runtimes` module loads
//! runtime configuration, but the defaults alone are enough to run the
//! pipeline in tests.

use std::env;
use std::time::Duration;

/// Tunable knobs for the enrichment pipeline.
///
/// Every field here corresponds to an "empirical knob" the spec explicitly
/// calls out as configuration rather than invariant (spec §9, Open
/// Questions): the ruler-only confidence floor, chunk sizing, and the
/// resolver's acceptance threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Maximum characters per chunk before normalization splits the text.
    pub max_chunk_chars: usize,
    /// Maximum combined length of tail sentences carried into the next chunk.
    pub chunk_overlap_chars: usize,
    /// Ruler-only concepts below this confidence are dropped during
    /// reconciliation (spec §4.6).
    pub ruler_only_min_confidence: f32,
    /// Resolver candidates scoring below this (0-100) are dropped (spec
    /// §4.7).
    pub resolver_score_threshold: f32,
    /// Maximum ancestor hops the resolver will surface for a high-scoring
    /// hit (spec §4.7, "Ancestor surfacing").
    pub resolver_max_ancestor_hops: u32,
    /// Poll interval used by the progressive event stream (spec §6).
    pub sse_poll_interval: Duration,
    /// Number of days a completed/failed job is retained before
    /// `cleanup_expired` removes it (spec §6, job store contract).
    pub job_retention_days: i64,
    /// Process-wide cap on concurrently running jobs (spec §5,
    /// "Backpressure").
    pub max_concurrent_jobs: usize,
    /// Minimum confidence for a concept to be surfaced in the metadata
    /// stage's "top concepts" summary (spec §4.13 phase 2).
    pub top_concept_min_confidence: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 3000,
            chunk_overlap_chars: 200,
            ruler_only_min_confidence: 0.60,
            resolver_score_threshold: 30.0,
            resolver_max_ancestor_hops: 3,
            sse_poll_interval: Duration::from_millis(500),
            job_retention_days: 30,
            max_concurrent_jobs: 4,
            top_concept_min_confidence: 0.80,
        }
    }
}

impl PipelineConfig {
    /// Build the default configuration, then apply `FOLIO_ENRICH_*`
    /// environment overrides where present. Unset or unparseable variables
    /// fall back to the default silently, matching the original's
    /// `pydantic-settings` behavior of tolerating a sparse environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Some(v) = env_usize("FOLIO_ENRICH_MAX_CHUNK_CHARS") {
            cfg.max_chunk_chars = v;
        }
        if let Some(v) = env_usize("FOLIO_ENRICH_CHUNK_OVERLAP_CHARS") {
            cfg.chunk_overlap_chars = v;
        }
        if let Some(v) = env_f32("FOLIO_ENRICH_RULER_ONLY_MIN_CONFIDENCE") {
            cfg.ruler_only_min_confidence = v;
        }
        if let Some(v) = env_f32("FOLIO_ENRICH_RESOLVER_SCORE_THRESHOLD") {
            cfg.resolver_score_threshold = v;
        }
        if let Some(v) = env_usize("FOLIO_ENRICH_MAX_CONCURRENT_JOBS") {
            cfg.max_concurrent_jobs = v;
        }
        if let Some(v) = env_usize("FOLIO_ENRICH_SSE_POLL_MS") {
            cfg.sse_poll_interval = Duration::from_millis(v as u64);
        }

        cfg
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_f32(key: &str) -> Option<f32> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_knobs() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.ruler_only_min_confidence, 0.60);
        assert_eq!(cfg.max_chunk_chars, 3000);
    }
}
