//! Data Transfer Objects for REST request/response serialization.

pub mod event_dto;
pub mod group_dto;

pub use event_dto::*;
pub use group_dto::*;
