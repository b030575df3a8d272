//! Change notifications broadcast after entity mutations.
//!
//! A [`ChangeEvent`] is the immutable `{action, data}` envelope that the
//! mutation layer hands to the [`crate::service::ChangePublisher`]. The
//! `data` member is an already-serialized entity snapshot and is never
//! inspected here.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Frame;

/// Kind of mutation that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// A new entity was committed.
    Create,
    /// An existing entity was modified.
    Update,
    /// An entity was removed. The snapshot is its last state.
    Delete,
}

impl ChangeAction {
    /// Returns the wire name of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope fanned out to every member of a group.
///
/// Events are fire-and-forget: they are not persisted, retried, or
/// deduplicated, and the registry drops them once a fan-out pass completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// Mutation kind.
    pub action: ChangeAction,
    /// Serialized entity snapshot, passed through untouched.
    pub data: serde_json::Value,
}

impl ChangeEvent {
    /// Creates a new envelope.
    #[must_use]
    pub const fn new(action: ChangeAction, data: serde_json::Value) -> Self {
        Self { action, data }
    }

    /// Serializes the envelope into a shareable text frame.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if the snapshot cannot
    /// be rendered as JSON text.
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Arc::from)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn action_wire_names() {
        assert_eq!(ChangeAction::Create.as_str(), "create");
        assert_eq!(ChangeAction::Update.to_string(), "update");
        assert_eq!(ChangeAction::Delete.as_str(), "delete");
    }

    #[test]
    fn frame_has_action_and_data_only() {
        let event = ChangeEvent::new(
            ChangeAction::Create,
            serde_json::json!({"id": 7, "name": "Lamp", "price": "19.99"}),
        );
        let Ok(frame) = event.to_frame() else {
            panic!("serialization failed");
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&frame) else {
            panic!("frame is not JSON");
        };
        assert_eq!(
            value,
            serde_json::json!({
                "action": "create",
                "data": {"id": 7, "name": "Lamp", "price": "19.99"}
            })
        );
    }

    #[test]
    fn action_parses_from_lowercase() {
        let parsed: Result<ChangeAction, _> = serde_json::from_str("\"delete\"");
        assert_eq!(parsed.ok(), Some(ChangeAction::Delete));
        let bad: Result<ChangeAction, _> = serde_json::from_str("\"Delete\"");
        assert!(bad.is_err());
    }
}
