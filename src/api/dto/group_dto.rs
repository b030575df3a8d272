//! DTOs for group membership inspection.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::GroupSummary;

/// One broadcast group and its current size.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupDto {
    /// Group name.
    pub name: String,
    /// Number of live member connections.
    pub members: usize,
}

impl From<GroupSummary> for GroupDto {
    fn from(summary: GroupSummary) -> Self {
        Self {
            name: summary.name,
            members: summary.members,
        }
    }
}

/// Response body for `GET /api/v1/groups`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupListResponse {
    /// Non-empty groups, sorted by name.
    pub data: Vec<GroupDto>,
    /// Distinct connections across all groups.
    pub total_connections: usize,
}
