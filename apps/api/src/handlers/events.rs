use axum::Json;
use axum::extract::{Query, State};

use crate::dto::{PushEventResponse, RecentQuery};
use crate::error::ApiResult;
use crate::state::AppState;

/// Lists the latest received push events, newest first.
pub async fn recent_events_handler(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Json<Vec<PushEventResponse>>> {
    let events = state.events.list_recent(query.bounded_limit()).await?;

    Ok(Json(events.into_iter().map(PushEventResponse::from).collect()))
}
