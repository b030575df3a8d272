//! Service layer: the bridge from committed mutations to broadcast.
//!
//! [`ChangePublisher`] is called synchronously by the mutation layer and
//! hands envelopes to a [`Dispatcher`] task that drives the
//! [`super::domain::GroupRegistry`].

pub mod change_publisher;

pub use change_publisher::{ChangePublisher, CommitHook, Dispatcher, PublishError, channel};
