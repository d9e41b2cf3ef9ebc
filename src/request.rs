use std::collections::BTreeSet;

use crate::policy::Role;

/// Metadata about an incoming request.
///
/// Filled in by the hosting HTTP layer. The principal is `None` when the
/// container could not authenticate the caller.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    /// Unique identifier for this request
    pub request_id: String,
    /// HTTP method, as received
    pub method: String,
    /// Request path, as received
    pub path: String,
    /// Authenticated principal, if any
    pub principal: Option<Principal>,
}

/// An authenticated caller together with the roles the container assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Login name
    pub name: String,
    /// Role set, read-only for the duration of the request
    pub roles: BTreeSet<Role>,
}

impl Principal {
    /// Creates a principal holding the given roles.
    pub fn new(name: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            name: name.into(),
            roles: roles.into_iter().collect(),
        }
    }

    /// Returns true if the principal holds `role`.
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}
