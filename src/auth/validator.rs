//! Bearer credential validation for streaming connections.
//!
//! Tokens are HS256 JWTs carrying a `user_id` claim and an `exp` expiry.
//! When a `token_type` claim is present it must be `"access"`, so refresh
//! tokens cannot be used to open a stream.
//!
//! ```json
//! {
//!   "token_type": "access",
//!   "exp": 1735689600,
//!   "jti": "8c2d7e0f",
//!   "user_id": 42
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use super::identity::IdentityStore;
use crate::domain::Subject;

/// Expected value of the `token_type` claim.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Why a presented credential could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// No token, or an empty one.
    #[error("no credential presented")]
    Missing,
    /// The token could not be decoded or is missing required claims.
    #[error("malformed credential: {0}")]
    Malformed(String),
    /// The `exp` claim is in the past.
    #[error("credential expired")]
    Expired,
    /// The signature does not match the configured key.
    #[error("credential signature is invalid")]
    InvalidSignature,
    /// The token is not an access token.
    #[error("unexpected token type: {0}")]
    WrongTokenType(String),
}

/// Subject identifier as carried in the token. Issuers emit either the
/// numeric primary key or a string identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserIdClaim {
    /// Numeric identifier.
    Number(u64),
    /// String identifier.
    Text(String),
}

impl fmt::Display for UserIdClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject identifier.
    pub user_id: UserIdClaim,
    /// Expiration time (Unix timestamp).
    pub exp: u64,
    /// Token kind; `"access"` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Unique token identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Stateless validator turning bearer tokens into [`Subject`]s.
///
/// Safe to share between connections; every call is independent.
pub struct CredentialValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    identities: Arc<dyn IdentityStore>,
}

impl fmt::Debug for CredentialValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialValidator")
            .field("algorithms", &self.validation.algorithms)
            .field("leeway", &self.validation.leeway)
            .field("identities", &self.identities)
            .finish_non_exhaustive()
    }
}

impl CredentialValidator {
    /// Creates a validator for HS256 tokens signed with `secret`.
    #[must_use]
    pub fn with_secret(secret: &[u8], identities: Arc<dyn IdentityStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            identities,
        }
    }

    /// Sets the clock leeway, in seconds, applied to `exp`.
    #[must_use]
    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.validation.leeway = secs;
        self
    }

    /// Verifies the token and resolves its subject.
    ///
    /// A verified token whose identifier is unknown to the identity store
    /// yields [`Subject::Anonymous`]; that is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] for empty, malformed, expired, badly
    /// signed, or non-access tokens.
    pub fn validate(&self, token: &str) -> Result<Subject, CredentialError> {
        let claims = self.verify(token)?;
        let user_id = claims.user_id.to_string();
        Ok(match self.identities.resolve(&user_id) {
            Some(id) => Subject::Authenticated(id),
            None => {
                tracing::debug!(user_id, "credential subject did not resolve");
                Subject::Anonymous
            }
        })
    }

    /// Decodes and verifies the token, returning its claims.
    ///
    /// # Errors
    ///
    /// See [`CredentialValidator::validate`].
    pub fn verify(&self, token: &str) -> Result<AccessClaims, CredentialError> {
        let token = strip_bearer(token.trim_start()).trim();
        if token.is_empty() {
            return Err(CredentialError::Missing);
        }

        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => CredentialError::Expired,
                ErrorKind::InvalidSignature => CredentialError::InvalidSignature,
                _ => CredentialError::Malformed(e.to_string()),
            })?;

        match data.claims.token_type.as_deref() {
            None | Some(ACCESS_TOKEN_TYPE) => Ok(data.claims),
            Some(other) => Err(CredentialError::WrongTokenType(other.to_string())),
        }
    }
}

/// Strips an optional `Bearer ` scheme prefix.
fn strip_bearer(token: &str) -> &str {
    token
        .strip_prefix("Bearer ")
        .or_else(|| token.strip_prefix("bearer "))
        .unwrap_or(token)
}
