//! Handshake-time authentication for streaming connections.
//!
//! The [`Gatekeeper`] runs before the WebSocket upgrade is accepted. It
//! checks the `Origin` header against the configured allow-list, pulls the
//! bearer token out of the handshake, resolves a [`Subject`] through the
//! [`CredentialValidator`], and applies the configured [`AuthPolicy`].
//! Credential errors never propagate past this point.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use crate::auth::CredentialValidator;
use crate::config::AuthPolicy;
use crate::domain::Subject;

/// Name of the query parameter carrying the bearer token.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Outcome of a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Hand the connection to a session with this subject.
    Accept(Subject),
    /// Refuse the upgrade.
    Reject,
}

/// Applies credential validation and the admission policy to handshakes.
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    validator: Arc<CredentialValidator>,
    policy: AuthPolicy,
    allowed_origins: Option<Arc<[String]>>,
}

impl Gatekeeper {
    /// Creates a gatekeeper.
    #[must_use]
    pub const fn new(validator: Arc<CredentialValidator>, policy: AuthPolicy) -> Self {
        Self {
            validator,
            policy,
            allowed_origins: None,
        }
    }

    /// Restricts handshakes to the given origins. `None` accepts any.
    ///
    /// Entries are either `*`, a full origin such as
    /// `https://shop.example.com`, a bare host (`shop.example.com`), or a
    /// leading-dot domain (`.example.com`) matching the domain and every
    /// subdomain.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Option<Vec<String>>) -> Self {
        self.allowed_origins = origins.map(Arc::from);
        self
    }

    /// Returns `true` if a handshake carrying `origin` may proceed.
    ///
    /// Without an allow-list every handshake passes. With one, a missing
    /// `Origin` header only passes when the list contains `*`.
    #[must_use]
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        let Some(allowed) = &self.allowed_origins else {
            return true;
        };
        if allowed.iter().any(|entry| entry == "*") {
            return true;
        }
        let Some(origin) = origin.map(|o| o.trim().trim_end_matches('/')) else {
            return false;
        };
        let host = origin_host(origin);
        allowed.iter().any(|entry| {
            if entry.contains("://") {
                entry.trim_end_matches('/').eq_ignore_ascii_case(origin)
            } else if let Some(domain) = entry.strip_prefix('.') {
                host.is_some_and(|h| {
                    let h = h.to_ascii_lowercase();
                    let domain = domain.to_ascii_lowercase();
                    h == domain || h.ends_with(&format!(".{domain}"))
                })
            } else {
                host.is_some_and(|h| h.eq_ignore_ascii_case(entry))
            }
        })
    }

    /// Returns the configured policy.
    #[must_use]
    pub const fn policy(&self) -> AuthPolicy {
        self.policy
    }

    /// Resolves the subject for an optional token.
    ///
    /// An absent token short-circuits to [`Subject::Anonymous`] without
    /// consulting the validator; rejected credentials are demoted to
    /// anonymous.
    #[must_use]
    pub fn resolve(&self, token: Option<&str>) -> Subject {
        let Some(token) = token else {
            return Subject::Anonymous;
        };
        match self.validator.validate(token) {
            Ok(subject) => subject,
            Err(err) => {
                tracing::debug!(error = %err, "credential rejected");
                Subject::Anonymous
            }
        }
    }

    /// Decides whether a handshake may proceed.
    #[must_use]
    pub fn admit(&self, token: Option<&str>) -> Admission {
        let subject = self.resolve(token);
        match self.policy {
            AuthPolicy::Reject if !subject.is_authenticated() => Admission::Reject,
            AuthPolicy::Reject | AuthPolicy::AllowAnonymous => Admission::Accept(subject),
        }
    }
}

/// Returns the host of a serialized origin (`scheme://host[:port]`).
fn origin_host(origin: &str) -> Option<&str> {
    let (_, authority) = origin.split_once("://")?;
    let authority = authority.split('/').next().unwrap_or(authority);
    let host = if authority.starts_with('[') {
        authority.split_once(']').map_or(authority, |(h, _)| h).trim_start_matches('[')
    } else {
        authority
            .rsplit_once(':')
            .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
            .map_or(authority, |(h, _)| h)
    };
    (!host.is_empty()).then_some(host)
}

/// Extracts the bearer token from the handshake.
///
/// The `token` query parameter wins over an `Authorization: Bearer`
/// header. Blank values count as absent.
#[must_use]
pub fn extract_token<'a>(
    query: &'a HashMap<String, String>,
    headers: &'a HeaderMap,
) -> Option<&'a str> {
    if let Some(token) = query
        .get(TOKEN_QUERY_PARAM)
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
    {
        return Some(token);
    }
    bearer_from_headers(headers)
}

/// Extracts the token from an `Authorization: Bearer` header.
#[must_use]
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
