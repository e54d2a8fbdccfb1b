pub(crate) mod citations;
pub(crate) mod digest;
pub(crate) mod health;
pub(crate) mod metrics;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::app::AppState;

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/v1/digests/assemble", post(digest::assemble))
        .route("/v1/digests", post(digest::generate))
        .route("/v1/citations/group", post(citations::group))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use axum::Router;

    use crate::app::{ComponentRegistry, build_router};
    use crate::observability::Telemetry;
    use crate::pipeline::facts::{FactSource, FactsPayload};
    use crate::pipeline::fetch::KeywordSource;
    use crate::pipeline::model::{Citation, KeywordRecord, SortKind};
    use crate::pipeline::narrative::{Narrative, NarrativeError, NarrativeGenerator, NarrativeRequest};
    use crate::pipeline::{DigestPipeline, PipelineSettings};

    struct FixedKeywords;

    #[async_trait]
    impl KeywordSource for FixedKeywords {
        async fn fetch_keywords(
            &self,
            _period: &str,
            category: &str,
            sort: SortKind,
        ) -> Result<Vec<KeywordRecord>> {
            if category == "ai" && sort == SortKind::Trending {
                Ok(vec![KeywordRecord {
                    trending: Some(true),
                    count: Some(3),
                    ..KeywordRecord::tracked("Claude")
                }])
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct FixedFacts;

    #[async_trait]
    impl FactSource for FixedFacts {
        async fn fetch_facts(&self, keyword: &str, _period: &str) -> Result<FactsPayload> {
            Ok(FactsPayload {
                summary: format!("{keyword} news [1][2]"),
                citations: vec![
                    Citation::new("1", format!("https://{keyword}/a")),
                    Citation::new("2", format!("https://{keyword}/b")),
                ],
                ..FactsPayload::default()
            })
        }
    }

    struct FixedNarrative(Result<&'static str, ()>);

    #[async_trait]
    impl NarrativeGenerator for FixedNarrative {
        async fn generate(&self, _request: &NarrativeRequest<'_>) -> Result<Narrative, NarrativeError> {
            match self.0 {
                Ok(text) => Ok(Narrative {
                    title: "Digest".to_string(),
                    concise_summary: text.to_string(),
                    long_summary: text.to_string(),
                }),
                Err(()) => Err(NarrativeError::Status {
                    status: 500,
                    body: "boom".to_string(),
                }),
            }
        }
    }

    fn registry(narrative: Option<Arc<dyn NarrativeGenerator>>) -> ComponentRegistry {
        let telemetry = Telemetry::without_tracing().expect("telemetry");
        let pipeline = DigestPipeline::builder(PipelineSettings::default())
            .with_keyword_source(Arc::new(FixedKeywords))
            .with_fact_source(Arc::new(FixedFacts))
            .with_metrics(telemetry.metrics_handle())
            .build()
            .expect("pipeline builds");
        ComponentRegistry::from_parts(telemetry, pipeline, narrative)
    }

    pub(crate) fn router() -> Router {
        build_router(registry(None))
    }

    pub(crate) fn router_with_narrative(outcome: Result<&'static str, ()>) -> Router {
        build_router(registry(Some(Arc::new(FixedNarrative(outcome)))))
    }
}
