//! Identity of the acting user and the collaborator that supplies it.
//!
//! The engine never authenticates anyone; the surrounding API layer resolves
//! the caller and hands the engine an [`Identity`]. An [`IdentityProvider`]
//! supplies the implicit author for operations that do not take an explicit
//! identity (comments, attachments, variable writes).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The acting user: id plus group/role memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub roles: HashSet<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: HashSet::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Actor used for engine-internal mutations such as deadline firing.
    pub fn system() -> Self {
        Self::new("system")
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Collaborator supplying the current actor's identity.
pub trait IdentityProvider: Send + Sync {
    fn identity(&self) -> Identity;
}

/// Fixed-identity provider for single-actor contexts and tests.
#[derive(Debug, Clone)]
pub struct StaticIdentityProvider {
    identity: Identity,
}

impl StaticIdentityProvider {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn identity(&self) -> Identity {
        self.identity.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_roles() {
        let identity = Identity::new("alice").with_roles(["hr", "managers"]);
        assert!(identity.has_role("hr"));
        assert!(!identity.has_role("finance"));
    }

    #[test]
    fn test_static_provider_returns_configured_identity() {
        let provider = StaticIdentityProvider::new(Identity::new("alice"));
        assert_eq!(provider.identity().user_id, "alice");
    }
}
