use axum::Json;
use axum::extract::{Query, State};

use crate::dto::{ClaimResultResponse, RecentQuery};
use crate::error::ApiResult;
use crate::state::AppState;

/// Lists the latest recorded claim outcomes, newest first.
pub async fn recent_claims_handler(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Json<Vec<ClaimResultResponse>>> {
    let results = state.results.list_recent(query.bounded_limit()).await?;

    Ok(Json(
        results.into_iter().map(ClaimResultResponse::from).collect(),
    ))
}
