//! Group membership inspection.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{GroupDto, GroupListResponse};
use crate::app_state::AppState;

/// `GET /groups`: List broadcast groups and their member counts.
#[utoipa::path(
    get,
    path = "/api/v1/groups",
    tag = "Groups",
    summary = "List broadcast groups",
    description = "Returns every non-empty group with its current number of member connections.",
    responses(
        (status = 200, description = "Group list", body = GroupListResponse),
    )
)]
pub async fn list_groups(State(state): State<AppState>) -> impl IntoResponse {
    let data: Vec<GroupDto> = state
        .registry
        .groups()
        .await
        .into_iter()
        .map(GroupDto::from)
        .collect();
    let total_connections = state.registry.connection_count().await;
    Json(GroupListResponse {
        data,
        total_connections,
    })
}

/// Group routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/groups", get(list_groups))
}
