//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; the health check lives
//! at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "product-feed-gateway",
        description = "Authenticated WebSocket broadcast of product changes."
    ),
    paths(
        handlers::events::publish_event,
        handlers::groups::list_groups,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::PublishEventRequest,
        dto::PublishEventResponse,
        dto::GroupDto,
        dto::GroupListResponse,
        handlers::system::HealthResponse,
        crate::domain::ChangeAction,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Events", description = "Post-commit change notifications"),
        (name = "Groups", description = "Broadcast group membership"),
        (name = "System", description = "Service status"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
