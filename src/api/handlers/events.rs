//! Post-commit change hook for an external mutation service.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{PublishEventRequest, PublishEventResponse};
use crate::app_state::AppState;
use crate::domain::{ChangeEvent, Subject};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::PublishError;
use crate::ws::gatekeeper::bearer_from_headers;

/// `POST /events`: Queue a committed change for broadcast.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] without a valid bearer token,
/// [`GatewayError::InvalidRequest`] for a malformed body, and
/// [`GatewayError::BroadcastUnavailable`] when the handoff queue is full or
/// the dispatcher has stopped.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Publish a change notification",
    description = "Called by the mutation layer after a create, update, or delete commits. The envelope is queued and fanned out to every member of the target group; the response does not wait for delivery.",
    request_body = PublishEventRequest,
    responses(
        (status = 202, description = "Change queued for broadcast", body = PublishEventResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 503, description = "Broadcast pipeline saturated or stopped", body = ErrorResponse),
    )
)]
pub async fn publish_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<PublishEventRequest>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let token = bearer_from_headers(&headers)
        .ok_or_else(|| GatewayError::Unauthorized("bearer token required".to_string()))?;
    let subject = state
        .validator
        .validate(token)
        .map_err(|e| GatewayError::Unauthorized(e.to_string()))?;
    if subject == Subject::Anonymous {
        return Err(GatewayError::Unauthorized("unknown subject".to_string()));
    }

    let Json(req) = body.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    let group: Arc<str> = match req.group.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Arc::from(name),
        Some(_) => return Err(GatewayError::InvalidRequest("group must not be blank".to_string())),
        None => Arc::from(state.publisher.default_group()),
    };

    state
        .publisher
        .try_publish(Arc::clone(&group), ChangeEvent::new(req.action, req.data))
        .map_err(|e| match e {
            PublishError::Serialization(msg) => GatewayError::InvalidRequest(msg),
            other => GatewayError::BroadcastUnavailable(other.to_string()),
        })?;

    tracing::debug!(group = &*group, action = %req.action, %subject, "change accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(PublishEventResponse {
            accepted: true,
            group: group.to_string(),
            action: req.action,
        }),
    ))
}

/// Event routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(publish_event))
}
