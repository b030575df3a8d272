//! WebSocket layer: handshake authentication, sessions, control frames.
//!
//! The streaming endpoint (default `/ws/products/`) is a pure broadcast
//! sink: after the handshake the server only pushes frames.

pub mod gatekeeper;
pub mod handler;
pub mod messages;
pub mod session;
