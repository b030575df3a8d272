//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::{CredentialValidator, IdentityStore, StaticIdentityStore, TrustSignedClaims};
use crate::config::GatewayConfig;
use crate::domain::GroupRegistry;
use crate::service::{self, ChangePublisher, Dispatcher};
use crate::ws::gatekeeper::Gatekeeper;
use crate::ws::session::SessionSettings;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Group membership shared by sessions and the dispatcher.
    pub registry: Arc<GroupRegistry>,
    /// Entry point for post-commit change notifications.
    pub publisher: ChangePublisher,
    /// Bearer token validator, also used by the REST hook.
    pub validator: Arc<CredentialValidator>,
    /// Handshake admission for streaming connections.
    pub gatekeeper: Gatekeeper,
    /// Settings handed to every new session.
    pub session_settings: SessionSettings,
}

impl AppState {
    /// Wires the broadcast stack from configuration.
    ///
    /// Returns the state together with the [`Dispatcher`] that must be
    /// spawned for published changes to reach any session.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> (Self, Dispatcher) {
        let identities: Arc<dyn IdentityStore> = match &config.known_subjects {
            Some(ids) => Arc::new(StaticIdentityStore::new(ids.iter().cloned())),
            None => Arc::new(TrustSignedClaims),
        };
        let validator = Arc::new(
            CredentialValidator::with_secret(config.jwt_secret.as_bytes(), identities)
                .with_leeway(config.jwt_leeway_secs),
        );
        let registry = Arc::new(GroupRegistry::new());
        let (publisher, dispatcher) = service::channel(
            Arc::clone(&registry),
            &config.broadcast_group,
            config.publish_queue_capacity,
        );

        let state = Self {
            registry,
            publisher,
            gatekeeper: Gatekeeper::new(Arc::clone(&validator), config.auth_policy)
                .with_allowed_origins(config.allowed_origins.clone()),
            validator,
            session_settings: SessionSettings::from_config(config),
        };
        (state, dispatcher)
    }
}
