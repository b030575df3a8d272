//! # product-feed-gateway
//!
//! Real-time broadcast gateway for product changes.
//!
//! Clients open a WebSocket, authenticate with a bearer token, join the
//! `products` group, and receive a `{action, data}` frame whenever a
//! product is created, updated, or deleted elsewhere in the system. The
//! mutation layer reports changes through a synchronous post-commit hook
//! and never waits on peer I/O.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)          Mutation layer
//!     │                             │
//!     ├── Gatekeeper (ws/)          ├── ChangePublisher (service/)
//!     │     └── CredentialValidator │     │ bounded handoff
//!     │         (auth/)             │     └── Dispatcher task
//!     │                             │
//!     ├── Session (ws/) ◄────────── GroupRegistry (domain/)
//!     │     per-connection queue
//!     │
//!     └── REST: /health, /api/v1/groups, /api/v1/events (api/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod ws;
