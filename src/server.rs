//! Router composition and serving.

use std::future::Future;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Upper bound on a REST request. Streaming sessions are not affected:
/// they run after the upgrade response has been sent.
pub const REST_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the full application router: REST endpoints plus the streaming
/// endpoint at `ws_path`.
pub fn build_app(state: AppState, ws_path: &str) -> Router {
    Router::new()
        .merge(api::build_router().layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REST_REQUEST_TIMEOUT,
        )))
        .route(ws_path, get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serves `app` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns the I/O error that stopped the accept loop.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
