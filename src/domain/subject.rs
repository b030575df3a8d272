//! Resolved identity of a connecting principal.

use std::fmt;

use serde::Serialize;

/// Identity attached to a connection after credential validation.
///
/// [`Subject::Anonymous`] is a distinct value and never compares equal to
/// any authenticated identifier, including an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Subject {
    /// A principal whose credential verified and whose identifier resolved.
    Authenticated(String),
    /// No credential, an unusable credential, or an unknown identifier.
    Anonymous,
}

impl Subject {
    /// Builds an authenticated subject from an identifier.
    #[must_use]
    pub fn authenticated(id: impl Into<String>) -> Self {
        Self::Authenticated(id.into())
    }

    /// Returns `true` for [`Subject::Authenticated`].
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Returns the identifier of an authenticated subject.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Authenticated(id) => Some(id),
            Self::Anonymous => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(id) => write!(f, "user:{id}"),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}
