//! Post-commit change publishing.
//!
//! The mutation layer calls [`ChangePublisher::publish_change`] right after
//! a create, update, or delete commits. The call only enqueues the envelope
//! on a bounded handoff queue and returns; a single [`Dispatcher`] task
//! drains the queue, serializes each envelope once, and fans it out through
//! the [`GroupRegistry`]. Because there is one dispatcher, every member
//! sees events in the order they were enqueued.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{ChangeAction, ChangeEvent, GroupRegistry};

/// Why a change could not be handed off for broadcast.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// The snapshot could not be serialized.
    #[error("snapshot serialization failed: {0}")]
    Serialization(String),
    /// The handoff queue is at capacity.
    #[error("publish queue full")]
    QueueFull,
    /// The dispatcher task has stopped.
    #[error("dispatcher stopped")]
    DispatcherStopped,
}

/// Hook invoked by the mutation layer after every successful commit.
///
/// Implementations must return promptly and must never fail the mutation.
pub trait CommitHook: Send + Sync {
    /// Reports a committed change of `snapshot` (the entity after the
    /// mutation, or before removal for deletes).
    fn after_commit(&self, action: ChangeAction, snapshot: serde_json::Value);
}

/// One queued fan-out request.
#[derive(Debug)]
struct Dispatch {
    group: Arc<str>,
    event: ChangeEvent,
}

/// Cloneable, synchronous front end of the broadcast pipeline.
#[derive(Debug, Clone)]
pub struct ChangePublisher {
    tx: mpsc::Sender<Dispatch>,
    default_group: Arc<str>,
}

/// Background consumer of the handoff queue.
#[derive(Debug)]
pub struct Dispatcher {
    rx: mpsc::Receiver<Dispatch>,
    registry: Arc<GroupRegistry>,
}

/// Creates a connected publisher/dispatcher pair.
///
/// `default_group` is the group targeted by
/// [`ChangePublisher::publish_change`]; `capacity` bounds the number of
/// envelopes waiting for the dispatcher.
#[must_use]
pub fn channel(
    registry: Arc<GroupRegistry>,
    default_group: &str,
    capacity: usize,
) -> (ChangePublisher, Dispatcher) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ChangePublisher {
            tx,
            default_group: Arc::from(default_group),
        },
        Dispatcher { rx, registry },
    )
}

impl ChangePublisher {
    /// Returns the group targeted by [`ChangePublisher::publish_change`].
    #[must_use]
    pub fn default_group(&self) -> &str {
        &self.default_group
    }

    /// Publishes a change to the default group, logging and dropping it on
    /// failure. Never blocks and never reports failure to the caller.
    pub fn publish_change<T: Serialize + ?Sized>(&self, action: ChangeAction, snapshot: &T) {
        let group = Arc::clone(&self.default_group);
        if let Err(err) = self.publish_change_to(group, action, snapshot) {
            tracing::warn!(%action, error = %err, "dropping change notification");
        }
    }

    /// Serializes `snapshot` and enqueues it for `group`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Serialization`] if the snapshot cannot be
    /// represented as JSON, otherwise the errors of
    /// [`ChangePublisher::try_publish`].
    pub fn publish_change_to<T: Serialize + ?Sized>(
        &self,
        group: Arc<str>,
        action: ChangeAction,
        snapshot: &T,
    ) -> Result<(), PublishError> {
        let data = serde_json::to_value(snapshot)
            .map_err(|e| PublishError::Serialization(e.to_string()))?;
        self.try_publish(group, ChangeEvent::new(action, data))
    }

    /// Enqueues an already-built envelope for `group` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::QueueFull`] when the dispatcher is behind by
    /// the full queue capacity and [`PublishError::DispatcherStopped`] when
    /// it is no longer running.
    pub fn try_publish(&self, group: Arc<str>, event: ChangeEvent) -> Result<(), PublishError> {
        self.tx
            .try_send(Dispatch { group, event })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => PublishError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => PublishError::DispatcherStopped,
            })
    }
}

impl CommitHook for ChangePublisher {
    fn after_commit(&self, action: ChangeAction, snapshot: serde_json::Value) {
        self.publish_change(action, &snapshot);
    }
}

impl Dispatcher {
    /// Drains the queue until every [`ChangePublisher`] clone is dropped.
    pub async fn run(mut self) {
        while let Some(Dispatch { group, event }) = self.rx.recv().await {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::warn!(action = %event.action, error = %err, "failed to serialize change event");
                    continue;
                }
            };
            let outcome = self.registry.publish(&group, &frame).await;
            tracing::debug!(
                group = &*group,
                action = %event.action,
                delivered = outcome.delivered,
                evicted = outcome.evicted.len(),
                "change broadcast"
            );
        }
        tracing::info!("change dispatcher stopped");
    }

    /// Spawns [`Dispatcher::run`] on the current runtime.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde::ser::Error as _;

    use super::*;
    use crate::domain::{ConnectionHandle, ConnectionId, Subject};

    const GROUP: &str = "products";

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn publish_from_sync_context_does_not_need_a_runtime() {
        let registry = Arc::new(GroupRegistry::new());
        let (publisher, _dispatcher) = channel(registry, GROUP, 4);
        publisher.publish_change(ChangeAction::Create, &serde_json::json!({"id": 1}));
        assert_eq!(
            publisher.try_publish(
                Arc::from(GROUP),
                ChangeEvent::new(ChangeAction::Update, serde_json::json!({"id": 1}))
            ),
            Ok(())
        );
    }

    #[test]
    fn full_queue_is_reported_not_awaited() {
        let registry = Arc::new(GroupRegistry::new());
        let (publisher, _dispatcher) = channel(registry, GROUP, 1);
        let event = ChangeEvent::new(ChangeAction::Delete, serde_json::json!({"id": 3}));
        assert_eq!(publisher.try_publish(Arc::from(GROUP), event.clone()), Ok(()));
        assert_eq!(
            publisher.try_publish(Arc::from(GROUP), event),
            Err(PublishError::QueueFull)
        );
    }

    #[test]
    fn stopped_dispatcher_is_reported() {
        let registry = Arc::new(GroupRegistry::new());
        let (publisher, dispatcher) = channel(registry, GROUP, 4);
        drop(dispatcher);
        let result = publisher.publish_change_to(
            Arc::from(GROUP),
            ChangeAction::Create,
            &serde_json::json!({}),
        );
        assert_eq!(result, Err(PublishError::DispatcherStopped));
        // The fire-and-forget entry point swallows the failure.
        publisher.publish_change(ChangeAction::Create, &serde_json::json!({}));
    }

    #[test]
    fn serialization_failure_is_isolated() {
        let registry = Arc::new(GroupRegistry::new());
        let (publisher, _dispatcher) = channel(registry, GROUP, 4);
        let result =
            publisher.publish_change_to(Arc::from(GROUP), ChangeAction::Update, &Unserializable);
        assert!(matches!(result, Err(PublishError::Serialization(_))));
        publisher.publish_change(ChangeAction::Update, &Unserializable);
    }

    #[test]
    fn dispatcher_fans_out_in_order() {
        tokio_test::block_on(async {
            let registry = Arc::new(GroupRegistry::new());
            let (handle, mut rx) =
                ConnectionHandle::new(ConnectionId::new(), Subject::authenticated("1"), 16);
            registry.join(GROUP, handle).await;

            let (publisher, dispatcher) = channel(Arc::clone(&registry), GROUP, 16);
            publisher.publish_change(ChangeAction::Create, &serde_json::json!({"id": 1}));
            publisher.after_commit(ChangeAction::Update, serde_json::json!({"id": 1, "name": "x"}));
            publisher.publish_change(ChangeAction::Delete, &serde_json::json!({"id": 1}));
            drop(publisher);
            dispatcher.run().await;

            let mut actions = Vec::new();
            while let Ok(frame) = rx.try_recv() {
                let Ok(value) = serde_json::from_str::<serde_json::Value>(&frame) else {
                    panic!("frame is not JSON");
                };
                let action = value.get("action").and_then(serde_json::Value::as_str);
                actions.push(action.unwrap_or_default().to_string());
            }
            assert_eq!(actions, vec!["create", "update", "delete"]);
        });
    }

    #[tokio::test]
    async fn publish_to_empty_group_is_silent() {
        let registry = Arc::new(GroupRegistry::new());
        let (publisher, dispatcher) = channel(Arc::clone(&registry), GROUP, 4);
        let task = dispatcher.spawn();
        publisher.publish_change(ChangeAction::Create, &serde_json::json!({"id": 9}));
        drop(publisher);
        assert!(task.await.is_ok());
        assert_eq!(registry.group_count().await, 0);
    }
}
