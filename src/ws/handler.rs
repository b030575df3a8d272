//! Axum WebSocket upgrade handler.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::ORIGIN;
use axum::response::{IntoResponse, Response};

use super::gatekeeper::{Admission, extract_token};
use super::session::run_session;
use crate::app_state::AppState;
use crate::error::GatewayError;

/// `GET /ws/products/`: Authenticate the handshake, then upgrade.
///
/// A handshake from an origin outside the configured allow-list, or an
/// unauthenticated one under [`crate::config::AuthPolicy::Reject`], gets
/// `403 Forbidden` with error code 2003 and no session is started.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let origin = headers.get(ORIGIN).and_then(|value| value.to_str().ok());
    if !state.gatekeeper.origin_allowed(origin) {
        tracing::info!(origin, "rejected stream handshake from foreign origin");
        return GatewayError::Forbidden.into_response();
    }

    let token = extract_token(&params, &headers);
    match state.gatekeeper.admit(token) {
        Admission::Reject => {
            tracing::info!(
                token_present = token.is_some(),
                "rejected unauthenticated stream handshake"
            );
            GatewayError::Forbidden.into_response()
        }
        Admission::Accept(subject) => {
            let registry = Arc::clone(&state.registry);
            let settings = state.session_settings.clone();
            ws.on_upgrade(move |socket| run_session(socket, subject, registry, settings))
        }
    }
}
