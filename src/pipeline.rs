//! Keyword and citation assembly stages.
//!
//! Data flow: profile → category → fetch → facts → dedup → renumber → format →
//! narrative → citations.

pub mod category;
pub mod citations;
pub mod dedup;
pub mod facts;
pub mod fetch;
pub mod format;
pub(crate) mod markers;
pub mod model;
pub mod narrative;
pub mod orchestrator;
pub mod progress;
pub mod renumber;

pub use category::{NormalizedCategories, Profile, normalize_profile};
pub use citations::{
    FootnoteCitation, GroupedNarrative, group_citations, group_summaries, render_source_messages,
};
pub use model::{AssembledDataset, Citation, KeywordRecord};
pub use narrative::{Narrative, NarrativeError, NarrativeGenerator};
pub use orchestrator::{AssembledDigest, DigestPipeline, DigestReport, PipelineSettings};
