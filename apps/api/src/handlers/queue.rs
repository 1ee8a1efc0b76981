use axum::Json;
use axum::extract::State;

use crate::dto::QueueStatsResponse;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn queue_stats_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<QueueStatsResponse>> {
    let stats = state.jobs.queue_stats().await?;
    Ok(Json(stats.into()))
}
