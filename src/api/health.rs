use axum::{Json, extract::State};
use serde::Serialize;

use crate::app::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct HealthReport {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl HealthReport {
    fn ready(narrative_enabled: bool) -> Self {
        Self {
            status: "ready",
            detail: (!narrative_enabled).then(|| "narrative service not configured".to_string()),
        }
    }
}

/// 上流サービスへの疎通確認は行わない。
pub(crate) async fn ready(State(state): State<AppState>) -> Json<HealthReport> {
    state.telemetry().record_ready_probe();
    Json(HealthReport::ready(state.narrative().is_some()))
}

pub(crate) async fn live(State(state): State<AppState>) -> Json<HealthReport> {
    state.telemetry().record_live_probe();
    Json(HealthReport {
        status: "live",
        detail: None,
    })
}
