//! DTOs for the post-commit change hook.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ChangeAction;

/// Request body for `POST /api/v1/events`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishEventRequest {
    /// Mutation kind.
    pub action: ChangeAction,
    /// Serialized entity snapshot, relayed verbatim to subscribers.
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    /// Target group. Defaults to the gateway's broadcast group.
    #[serde(default)]
    pub group: Option<String>,
}

/// Response body for `POST /api/v1/events` (202 Accepted).
#[derive(Debug, Serialize, ToSchema)]
pub struct PublishEventResponse {
    /// Always `true`; the change is queued, not yet delivered.
    pub accepted: bool,
    /// Group the change was queued for.
    pub group: String,
    /// Mutation kind echoed from the request.
    pub action: ChangeAction,
}
