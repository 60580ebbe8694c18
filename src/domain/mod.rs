//! Core domain types shared across every stage and collaborator.

pub mod annotation;
pub mod chunk;
pub mod concept;
pub mod document;
pub mod individual;
pub mod job;
pub mod property;
pub mod scratch;
pub mod span;

pub use annotation::{Annotation, AnnotationState, Feedback, StageEvent};
pub use chunk::{CanonicalText, Chunk, Sentence};
pub use concept::{ConceptMatch, ConceptSource, ConceptState, MatchType};
pub use document::{DocumentFormat, DocumentInput, TextElement, TextElementType};
pub use individual::{ClassLink, Individual, IndividualKind, IndividualSource};
pub use job::{Job, JobResult, JobStatus};
pub use property::{PropertyAnnotation, PropertySource};
pub use scratch::{ActivityEntry, AreaOfLaw, PipelineScratch, QualityReport, SpoTriple};
pub use span::Span;
