//! Seam to the narrative (LLM) service.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input handed to the narrative service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrativeRequest<'a> {
    pub formatted: &'a str,
    pub profile: &'a super::category::Profile,
    pub period: &'a str,
}

/// Narrative as returned by the service, still carrying `[k:i]` markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub concise_summary: String,
    #[serde(default)]
    pub long_summary: String,
}

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("narrative request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("narrative service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("narrative response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("narrative response has neither a concise nor a long summary")]
    Empty,
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, request: &NarrativeRequest<'_>) -> Result<Narrative, NarrativeError>;
}
