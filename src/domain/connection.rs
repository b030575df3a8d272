//! Deliverable connection handles referenced by group membership.
//!
//! A [`ConnectionHandle`] is the registry's view of a live connection: an
//! identifier, the resolved [`Subject`], and the sending half of a bounded
//! outbound queue drained by the owning Session. The Session keeps the
//! receiving half and never holds a sender itself, so once every handle
//! has been removed from the registry the queue closes and the Session's
//! relay loop ends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use super::{ConnectionId, Subject};

/// Serialized text frame shared between all recipients of one event.
pub type Frame = Arc<str>;

/// Reason a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The bounded outbound queue is at capacity.
    #[error("outbound queue full")]
    QueueFull,
    /// The Session dropped its receiver or was marked closed.
    #[error("connection closed")]
    Closed,
}

/// Shared liveness flag for one connection.
///
/// Cleared exactly once, either by the Session on teardown or by the
/// registry on eviction. Handles whose flag is cleared are skipped by
/// every subsequent publish.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Returns `true` until [`Liveness::mark_closed`] is called.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clears the flag. Returns `true` if this call performed the transition.
    pub fn mark_closed(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Registry-side handle to a live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    subject: Subject,
    tx: mpsc::Sender<Frame>,
    liveness: Liveness,
}

impl ConnectionHandle {
    /// Creates a handle with a bounded outbound queue of `capacity` frames.
    ///
    /// Returns the handle and the receiving half of its queue. A capacity
    /// of zero is raised to one.
    #[must_use]
    pub fn new(
        id: ConnectionId,
        subject: Subject,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id,
            subject,
            tx,
            liveness: Liveness::new(),
        };
        (handle, rx)
    }

    /// Returns the connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the subject attached by the gatekeeper.
    #[must_use]
    pub const fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Returns a clone of the shared liveness flag.
    #[must_use]
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Returns `true` while the connection has not been torn down.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive() && !self.tx.is_closed()
    }

    /// Queues a frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::QueueFull`] when the queue is at capacity
    /// and [`DeliveryError::Closed`] when the connection is gone.
    pub fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError> {
        if !self.liveness.is_alive() {
            return Err(DeliveryError::Closed);
        }
        self.tx.try_send(Arc::clone(frame)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn frame(text: &str) -> Frame {
        Arc::from(text)
    }

    #[tokio::test]
    async fn deliver_queues_frame() {
        let (handle, mut rx) = ConnectionHandle::new(ConnectionId::new(), Subject::Anonymous, 4);
        assert_eq!(handle.deliver(&frame("hello")), Ok(()));
        let Some(received) = rx.recv().await else {
            panic!("expected a frame");
        };
        assert_eq!(&*received, "hello");
    }

    #[test]
    fn full_queue_is_reported() {
        let (handle, _rx) = ConnectionHandle::new(ConnectionId::new(), Subject::Anonymous, 1);
        assert_eq!(handle.deliver(&frame("a")), Ok(()));
        assert_eq!(handle.deliver(&frame("b")), Err(DeliveryError::QueueFull));
    }

    #[test]
    fn dropped_receiver_is_closed() {
        let (handle, rx) = ConnectionHandle::new(ConnectionId::new(), Subject::Anonymous, 4);
        drop(rx);
        assert!(!handle.is_alive());
        assert_eq!(handle.deliver(&frame("a")), Err(DeliveryError::Closed));
    }

    #[test]
    fn mark_closed_stops_delivery_and_transitions_once() {
        let (handle, _rx) = ConnectionHandle::new(ConnectionId::new(), Subject::Anonymous, 4);
        let liveness = handle.liveness();
        assert!(liveness.mark_closed());
        assert!(!liveness.mark_closed());
        assert!(!handle.is_alive());
        assert_eq!(handle.deliver(&frame("a")), Err(DeliveryError::Closed));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let (handle, _rx) = ConnectionHandle::new(ConnectionId::new(), Subject::Anonymous, 0);
        assert_eq!(handle.deliver(&frame("a")), Ok(()));
    }
}
