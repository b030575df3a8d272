//! Per-connection session: group membership lifecycle and outbound relay.
//!
//! A session moves through `Connecting → Joined → Closed`. Joining
//! registers a [`ConnectionHandle`] with the [`GroupRegistry`]; closing
//! clears the connection's liveness flag and leaves the group exactly once,
//! before the socket is dropped. The relay loop never processes
//! application data from the peer: inbound traffic only tells us the peer
//! is alive or gone.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval};

use super::messages::ControlFrame;
use crate::config::GatewayConfig;
use crate::domain::{ConnectionHandle, ConnectionId, Frame, GroupRegistry, Liveness, Subject};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport accepted, not yet a member of any group.
    Connecting,
    /// Member of its group and relaying frames.
    Joined,
    /// Torn down. Terminal.
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame or the stream ended.
    PeerClosed,
    /// Reading from the transport failed.
    TransportError,
    /// A write to the peer failed.
    WriteFailed,
    /// A write to the peer did not finish within the write timeout.
    WriteTimedOut,
    /// The registry evicted the connection (queue overflow).
    Evicted,
    /// The peer stopped answering heartbeats.
    Idle,
}

impl CloseReason {
    /// Returns a short label for logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::TransportError => "transport_error",
            Self::WriteFailed => "write_failed",
            Self::WriteTimedOut => "write_timed_out",
            Self::Evicted => "evicted",
            Self::Idle => "idle",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by every session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Group joined on start.
    pub group: Arc<str>,
    /// Capacity of the per-connection outbound queue.
    pub outbound_capacity: usize,
    /// Upper bound on one socket write.
    pub write_timeout: Duration,
    /// Heartbeat interval; `None` disables pings and idle detection.
    pub ping_interval: Option<Duration>,
    /// Whether to send the `connection_established` frame after joining.
    pub send_confirmation: bool,
}

impl SessionSettings {
    /// Derives session settings from the gateway configuration.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            group: Arc::from(config.broadcast_group.as_str()),
            outbound_capacity: config.outbound_queue_capacity,
            write_timeout: config.write_timeout,
            ping_interval: config.ping_interval,
            send_confirmation: true,
        }
    }
}

/// Membership controller for one connection.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    subject: Subject,
    group: Arc<str>,
    outbound_capacity: usize,
    registry: Arc<GroupRegistry>,
    liveness: Option<Liveness>,
    state: SessionState,
}

impl Session {
    /// Creates a session in the `Connecting` state.
    #[must_use]
    pub fn new(subject: Subject, registry: Arc<GroupRegistry>, settings: &SessionSettings) -> Self {
        Self {
            id: ConnectionId::new(),
            subject,
            group: Arc::clone(&settings.group),
            outbound_capacity: settings.outbound_capacity,
            registry,
            liveness: None,
            state: SessionState::Connecting,
        }
    }

    /// Returns the connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the attached subject.
    #[must_use]
    pub const fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` while joined and not evicted.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state == SessionState::Joined
            && self.liveness.as_ref().is_some_and(Liveness::is_alive)
    }

    /// `Connecting → Joined`: registers with the group and returns the
    /// receiving end of the outbound queue.
    ///
    /// Returns `None` if the session is not in the `Connecting` state.
    pub async fn start(&mut self) -> Option<mpsc::Receiver<Frame>> {
        if self.state != SessionState::Connecting {
            return None;
        }
        let (handle, rx) =
            ConnectionHandle::new(self.id, self.subject.clone(), self.outbound_capacity);
        self.liveness = Some(handle.liveness());
        self.registry.join(&self.group, handle).await;
        self.state = SessionState::Joined;
        Some(rx)
    }

    /// `→ Closed`: leaves the group exactly once.
    ///
    /// Returns `true` if this call left the group; later calls are no-ops.
    pub async fn close(&mut self) -> bool {
        let was_joined = self.state == SessionState::Joined;
        self.state = SessionState::Closed;
        if !was_joined {
            return false;
        }
        if let Some(liveness) = &self.liveness {
            liveness.mark_closed();
        }
        self.registry.leave(&self.group, self.id).await;
        true
    }
}

/// Drives one accepted WebSocket until it closes.
///
/// Joins the configured group, optionally confirms the join to the peer,
/// relays queued frames, and on exit leaves the group before the socket
/// is dropped.
pub async fn run_session(
    socket: WebSocket,
    subject: Subject,
    registry: Arc<GroupRegistry>,
    settings: SessionSettings,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut session = Session::new(subject, registry, &settings);
    let Some(mut outbound) = session.start().await else {
        return;
    };
    tracing::info!(
        conn_id = %session.id(),
        subject = %session.subject(),
        group = &*settings.group,
        "session joined"
    );

    let reason = match send_confirmation(&mut ws_tx, &settings).await {
        Ok(()) => relay(&mut ws_tx, &mut ws_rx, &mut outbound, &session, &settings).await,
        Err(reason) => reason,
    };

    session.close().await;
    drop(outbound);

    if !matches!(reason, CloseReason::PeerClosed | CloseReason::TransportError) {
        let _ = tokio::time::timeout(settings.write_timeout, ws_tx.send(Message::Close(None))).await;
    }
    tracing::info!(conn_id = %session.id(), %reason, "session closed");
}

/// Sends the join confirmation when enabled.
async fn send_confirmation<S>(sink: &mut S, settings: &SessionSettings) -> Result<(), CloseReason>
where
    S: Sink<Message> + Unpin,
{
    if !settings.send_confirmation {
        return Ok(());
    }
    match ControlFrame::connection_established().to_text() {
        Ok(text) => write(sink, Message::text(text), settings.write_timeout).await,
        Err(err) => {
            tracing::warn!(error = %err, "failed to render confirmation frame");
            Ok(())
        }
    }
}

/// Relays outbound frames and watches the transport until the session
/// must close.
async fn relay<S, R, E>(
    sink: &mut S,
    stream: &mut R,
    outbound: &mut mpsc::Receiver<Frame>,
    session: &Session,
    settings: &SessionSettings,
) -> CloseReason
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    // An interval too large to schedule disables the heartbeat.
    let mut heartbeat = settings.ping_interval.and_then(|period| {
        let first = Instant::now().checked_add(period)?;
        Some(tokio::time::interval_at(first, period))
    });
    let idle_limit = heartbeat
        .as_ref()
        .and_then(|interval| interval.period().checked_mul(2));
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => return CloseReason::PeerClosed,
                Some(Ok(_)) => last_seen = Instant::now(),
                Some(Err(err)) => {
                    tracing::debug!(conn_id = %session.id(), error = %err, "transport read failed");
                    return CloseReason::TransportError;
                }
            },
            frame = outbound.recv() => match frame {
                Some(frame) if session.is_live() => {
                    if let Err(reason) = write(sink, Message::text(&*frame), settings.write_timeout).await {
                        return reason;
                    }
                }
                _ => return CloseReason::Evicted,
            },
            () = tick(&mut heartbeat) => {
                if idle_limit.is_some_and(|limit| last_seen.elapsed() > limit) {
                    return CloseReason::Idle;
                }
                if let Err(reason) = write(sink, Message::Ping(Bytes::new()), settings.write_timeout).await {
                    return reason;
                }
            }
        }
    }
}

/// Writes one message under a timeout.
async fn write<S>(sink: &mut S, message: Message, timeout: Duration) -> Result<(), CloseReason>
where
    S: Sink<Message> + Unpin,
{
    match tokio::time::timeout(timeout, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(CloseReason::WriteFailed),
        Err(_) => Err(CloseReason::WriteTimedOut),
    }
}

/// Waits for the next heartbeat, or forever when heartbeats are disabled.
async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
