//! Cart ownership and persistence namespaces.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of every local storage key.
const STORAGE_KEY_PREFIX: &str = "mercado-cart";

/// The authenticated identity, as reported by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Backend user id.
    pub id: Option<String>,
    /// Email, used as the owner key when the id is missing.
    pub email: Option<String>,
}

impl Identity {
    /// An identity with a user id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            email: None,
        }
    }

    /// The cart owner key for this identity: id, then email, then `unknown`.
    #[must_use]
    pub fn owner_key(&self) -> CartOwnerKey {
        let id = self
            .id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.email.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("unknown");
        CartOwnerKey::User(id.to_string())
    }
}

/// Selects the persistence namespace of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CartOwnerKey {
    /// Unauthenticated session.
    Guest,
    /// Authenticated user, by stable identifier.
    User(String),
}

impl CartOwnerKey {
    /// Owner key for an optional identity.
    #[must_use]
    pub fn for_identity(identity: Option<&Identity>) -> Self {
        identity.map_or(Self::Guest, Identity::owner_key)
    }

    /// Local storage key (`mercado-cart-guest`, `mercado-cart-{id}`).
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Guest => format!("{STORAGE_KEY_PREFIX}-guest"),
            Self::User(id) => format!("{STORAGE_KEY_PREFIX}-{id}"),
        }
    }

    /// The id used in remote cart URLs, if authenticated.
    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Self::Guest => None,
            Self::User(id) => Some(id),
        }
    }

    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }
}

impl fmt::Display for CartOwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => f.write_str("guest"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}
