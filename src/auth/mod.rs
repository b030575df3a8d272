//! Credential validation: bearer tokens to [`crate::domain::Subject`]s.

pub mod identity;
pub mod validator;

pub use identity::{IdentityStore, StaticIdentityStore, TrustSignedClaims};
pub use validator::{AccessClaims, CredentialError, CredentialValidator, UserIdClaim};
