use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::{error, info};

use super::ErrorResponse;
use crate::app::AppState;
use crate::pipeline::Profile;

#[derive(Debug, Deserialize)]
pub(crate) struct DigestRequest {
    profile: Profile,
    #[serde(default)]
    time_period_override: Option<String>,
}

pub(crate) async fn assemble(
    State(state): State<AppState>,
    Json(payload): Json<DigestRequest>,
) -> impl IntoResponse {
    let digest = state
        .pipeline()
        .assemble(&payload.profile, payload.time_period_override.as_deref())
        .await;
    (StatusCode::OK, Json(digest)).into_response()
}

pub(crate) async fn generate(
    State(state): State<AppState>,
    Json(payload): Json<DigestRequest>,
) -> impl IntoResponse {
    let Some(generator) = state.narrative() else {
        let body = Json(ErrorResponse {
            error: "narrative service is not configured".into(),
        });
        return (StatusCode::SERVICE_UNAVAILABLE, body).into_response();
    };

    match state
        .pipeline()
        .run(
            &payload.profile,
            payload.time_period_override.as_deref(),
            generator.as_ref(),
        )
        .await
    {
        Ok(report) => {
            info!(run_id = %report.run_id, footnotes = report.long.citations.len(), "digest generated");
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(err) => {
            error!(error = %err, "digest generation failed");
            let body = Json(ErrorResponse {
                error: err.to_string(),
            });
            (StatusCode::BAD_GATEWAY, body).into_response()
        }
    }
}
