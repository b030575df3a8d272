//! Identity resolution collaborators.
//!
//! The validator proves that a token was issued by us and has not expired;
//! an [`IdentityStore`] then decides whether the embedded identifier still
//! names a known principal. Stores are injected into the
//! [`super::CredentialValidator`] at construction.

use std::collections::HashSet;
use std::fmt;

/// Resolves a verified subject identifier to a known principal.
pub trait IdentityStore: Send + Sync + fmt::Debug {
    /// Returns the canonical identifier, or `None` if the principal is
    /// unknown. Unknown principals are treated as anonymous, not as errors.
    fn resolve(&self, user_id: &str) -> Option<String>;
}

/// Accepts every identifier carried by a correctly signed token.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustSignedClaims;

impl IdentityStore for TrustSignedClaims {
    fn resolve(&self, user_id: &str) -> Option<String> {
        (!user_id.is_empty()).then(|| user_id.to_string())
    }
}

/// Fixed allow-list of known identifiers.
#[derive(Debug, Default, Clone)]
pub struct StaticIdentityStore {
    known: HashSet<String>,
}

impl StaticIdentityStore {
    /// Builds a store from an iterator of identifiers.
    #[must_use]
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of known identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Returns `true` if the store knows no identifiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

impl IdentityStore for StaticIdentityStore {
    fn resolve(&self, user_id: &str) -> Option<String> {
        self.known.get(user_id).cloned()
    }
}
