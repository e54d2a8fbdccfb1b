use axum::{Json, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::pipeline::citations::{
    DEFAULT_SOURCES_PER_MESSAGE, GroupedNarrative, group_summaries, render_source_messages,
};
use crate::pipeline::model::AssembledDataset;

#[derive(Debug, Deserialize)]
pub(crate) struct GroupRequest {
    dataset: AssembledDataset,
    #[serde(default)]
    concise: String,
    #[serde(default)]
    long: String,
    #[serde(default)]
    sources_per_message: Option<usize>,
}

#[derive(Debug, Serialize)]
struct GroupResponse {
    concise: GroupedNarrative,
    long: GroupedNarrative,
    sources: Vec<String>,
    total_citations: usize,
}

/// 生成済みの narrative に含まれる `[k:i]` マーカーを番号付きデータセットで解決する。
pub(crate) async fn group(Json(payload): Json<GroupRequest>) -> impl IntoResponse {
    let (concise, long) = group_summaries(&payload.concise, &payload.long, &payload.dataset);
    let per_message = payload
        .sources_per_message
        .unwrap_or(DEFAULT_SOURCES_PER_MESSAGE);
    let sources = render_source_messages(&long.citations, per_message);

    Json(GroupResponse {
        total_citations: payload.dataset.total_citations(),
        concise,
        long,
        sources,
    })
}
