//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Everything except `JWT_SECRET` has a
//! default.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Largest accepted `WS_PING_INTERVAL_SECS` (one day).
pub const MAX_PING_INTERVAL_SECS: u64 = 86_400;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}

/// What the gatekeeper does with a handshake whose subject is not
/// authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPolicy {
    /// Refuse the upgrade with `403 Forbidden`; no session is created.
    #[default]
    Reject,
    /// Upgrade anyway and let the session join as [`crate::domain::Subject::Anonymous`].
    AllowAnonymous,
}

impl FromStr for AuthPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "anonymous" | "allow_anonymous" | "allow-anonymous" => Ok(Self::AllowAnonymous),
            _ => Err(()),
        }
    }
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8000`).
    pub listen_addr: SocketAddr,

    /// HMAC secret used to verify bearer tokens.
    pub jwt_secret: String,

    /// Clock leeway in seconds applied to token expiry.
    pub jwt_leeway_secs: u64,

    /// Path of the streaming endpoint.
    pub ws_path: String,

    /// Handling of unauthenticated handshakes.
    pub auth_policy: AuthPolicy,

    /// Group every session joins and every change is published to.
    pub broadcast_group: String,

    /// Capacity of each connection's outbound frame queue.
    pub outbound_queue_capacity: usize,

    /// Upper bound on a single socket write.
    pub write_timeout: Duration,

    /// Interval between heartbeat pings; `None` disables them.
    pub ping_interval: Option<Duration>,

    /// Capacity of the publisher-to-dispatcher handoff queue.
    pub publish_queue_capacity: usize,

    /// Identifiers the identity store resolves. `None` trusts every
    /// correctly signed identifier.
    pub known_subjects: Option<Vec<String>>,

    /// `Origin` values accepted on the streaming handshake. `None` accepts
    /// any origin.
    pub allowed_origins: Option<Vec<String>>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("listen_addr", &self.listen_addr)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_leeway_secs", &self.jwt_leeway_secs)
            .field("ws_path", &self.ws_path)
            .field("auth_policy", &self.auth_policy)
            .field("broadcast_group", &self.broadcast_group)
            .field("outbound_queue_capacity", &self.outbound_queue_capacity)
            .field("write_timeout", &self.write_timeout)
            .field("ping_interval", &self.ping_interval)
            .field("publish_queue_capacity", &self.publish_queue_capacity)
            .field("known_subjects", &self.known_subjects)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

impl GatewayConfig {
    /// Builds a configuration with default settings and the given secret.
    #[must_use]
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            jwt_secret: jwt_secret.into(),
            jwt_leeway_secs: 0,
            ws_path: "/ws/products/".to_string(),
            auth_policy: AuthPolicy::Reject,
            broadcast_group: "products".to_string(),
            outbound_queue_capacity: 256,
            write_timeout: Duration::from_secs(10),
            ping_interval: Some(Duration::from_secs(30)),
            publish_queue_capacity: 10_000,
            known_subjects: None,
            allowed_origins: None,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `JWT_SECRET` is unset and
    /// [`ConfigError::Invalid`] if `LISTEN_ADDR` or `WS_AUTH_POLICY` cannot
    /// be parsed, or `WS_PING_INTERVAL_SECS` exceeds
    /// [`MAX_PING_INTERVAL_SECS`].
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`GatewayConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let mut config = Self::with_secret(jwt_secret);

        if let Some(addr) = lookup("LISTEN_ADDR") {
            config.listen_addr = addr.parse().map_err(|_| ConfigError::Invalid {
                key: "LISTEN_ADDR",
                value: addr.clone(),
            })?;
        }

        if let Some(policy) = lookup("WS_AUTH_POLICY") {
            config.auth_policy = policy.parse().map_err(|()| ConfigError::Invalid {
                key: "WS_AUTH_POLICY",
                value: policy.clone(),
            })?;
        }

        if let Some(path) = lookup("WS_PATH").filter(|p| p.starts_with('/')) {
            config.ws_path = path;
        }
        if let Some(group) = lookup("BROADCAST_GROUP").filter(|g| !g.is_empty()) {
            config.broadcast_group = group;
        }

        config.jwt_leeway_secs = parse_or(&lookup, "JWT_LEEWAY_SECS", config.jwt_leeway_secs);
        config.outbound_queue_capacity = parse_or(
            &lookup,
            "WS_OUTBOUND_QUEUE_CAPACITY",
            config.outbound_queue_capacity,
        )
        .max(1);
        config.write_timeout =
            Duration::from_secs(parse_or(&lookup, "WS_WRITE_TIMEOUT_SECS", 10).max(1));
        config.ping_interval = match parse_or(&lookup, "WS_PING_INTERVAL_SECS", 30) {
            0 => None,
            secs if secs > MAX_PING_INTERVAL_SECS => {
                return Err(ConfigError::Invalid {
                    key: "WS_PING_INTERVAL_SECS",
                    value: secs.to_string(),
                });
            }
            secs => Some(Duration::from_secs(secs)),
        };
        config.publish_queue_capacity =
            parse_or(&lookup, "PUBLISH_QUEUE_CAPACITY", config.publish_queue_capacity).max(1);

        config.known_subjects = lookup("KNOWN_SUBJECTS").map(|list| split_list(&list));
        config.allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|list| split_list(&list))
            .filter(|origins| !origins.is_empty());

        Ok(config)
    }
}

/// Splits a comma-separated list, dropping blank entries.
fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
