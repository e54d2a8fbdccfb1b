use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::{
    api,
    clients::{NarrativeClient, TrendApiClient},
    config::Config,
    observability::Telemetry,
    pipeline::{DigestPipeline, NarrativeGenerator},
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

pub struct ComponentRegistry {
    telemetry: Telemetry,
    pipeline: Arc<DigestPipeline>,
    narrative: Option<Arc<dyn NarrativeGenerator>>,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn pipeline(&self) -> &DigestPipeline {
        &self.registry.pipeline
    }

    pub(crate) fn narrative(&self) -> Option<Arc<dyn NarrativeGenerator>> {
        self.registry.narrative.clone()
    }
}

impl ComponentRegistry {
    /// 構成情報と依存をまとめて初期化し、アプリケーションの共有レジストリを構築する。
    ///
    /// # Errors
    /// Telemetry の初期化や HTTP クライアント構築が失敗した場合はエラーを返す。
    pub fn build(config: &Config) -> Result<Self> {
        let telemetry = Telemetry::new()?;

        let trend_api = Arc::new(
            TrendApiClient::new(config.trend_api()).context("failed to build trend API client")?,
        );
        let mut builder = DigestPipeline::builder(config.pipeline_settings())
            .with_keyword_source(Arc::clone(&trend_api) as _)
            .with_fact_source(trend_api as _)
            .with_metrics(telemetry.metrics_handle());
        if config.progress_reports_enabled() {
            builder = builder.with_log_progress();
        }
        let pipeline = Arc::new(builder.build()?);

        let narrative = match config.narrative_base_url() {
            Some(base_url) => {
                let client = NarrativeClient::new(
                    base_url,
                    config.narrative_connect_timeout(),
                    config.narrative_timeout(),
                )?;
                Some(Arc::new(client) as Arc<dyn NarrativeGenerator>)
            }
            None => {
                info!("NARRATIVE_BASE_URL not set; narrative generation disabled");
                None
            }
        };

        Ok(Self {
            telemetry,
            pipeline,
            narrative,
        })
    }

    /// 既に構築済みの部品からレジストリを組み立てる（テストや組み込み用途）。
    #[must_use]
    pub fn from_parts(
        telemetry: Telemetry,
        pipeline: DigestPipeline,
        narrative: Option<Arc<dyn NarrativeGenerator>>,
    ) -> Self {
        Self {
            telemetry,
            pipeline: Arc::new(pipeline),
            narrative,
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> &DigestPipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn narrative_enabled(&self) -> bool {
        self.narrative.is_some()
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
}
