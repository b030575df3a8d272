//! Domain layer: identities, change envelopes, and the group registry.
//!
//! This module contains the broadcast model: connection identity and
//! handles, the resolved [`Subject`] of a connection, the [`ChangeEvent`]
//! envelope, and the [`GroupRegistry`] that fans frames out to members.

pub mod change_event;
pub mod connection;
pub mod connection_id;
pub mod group_registry;
pub mod subject;

pub use change_event::{ChangeAction, ChangeEvent};
pub use connection::{ConnectionHandle, DeliveryError, Frame, Liveness};
pub use connection_id::ConnectionId;
pub use group_registry::{GroupRegistry, GroupSummary, PublishOutcome};
pub use subject::Subject;
