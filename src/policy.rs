//! Role requirements and the operation → roles table.
//!
//! The table is resolved once when the service starts and is read-only
//! afterwards. Authorization is a plain set intersection between the roles an
//! operation accepts and the roles the hosting environment attached to the
//! principal.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A role identifier as assigned by the hosting environment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Administrators of the account service.
    pub const SERVICE_ADMIN: Role = Role(Cow::Borrowed("service-admin"));
    /// Owners of an individual account.
    pub const ACCOUNT_OWNER: Role = Role(Cow::Borrowed("account-owner"));

    /// Creates a role from any name.
    pub fn new(name: impl Into<String>) -> Self {
        Role(Cow::Owned(name.into()))
    }

    /// Returns the role name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operations exposed by the account manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Register a new user account.
    CreateAccount,
    /// Remove an existing user account.
    DeleteAccount,
    /// Look up the accounts of a user.
    RetrieveAccount,
}

impl Operation {
    /// All operations, in table order.
    pub const ALL: [Operation; 3] = [
        Operation::CreateAccount,
        Operation::DeleteAccount,
        Operation::RetrieveAccount,
    ];

    /// Stable identifier used in configuration and log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateAccount => "create-account",
            Operation::DeleteAccount => "delete-account",
            Operation::RetrieveAccount => "retrieve-account",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::Configuration(format!("unknown operation '{}'", s)))
    }
}

/// The ordered set of roles allowed to invoke one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequirement {
    /// The guarded operation
    pub operation: Operation,
    /// Acceptable roles, checked in order
    pub roles: Vec<Role>,
}

impl RoleRequirement {
    /// Creates a requirement, dropping duplicate roles while keeping order.
    pub fn new(operation: Operation, roles: impl IntoIterator<Item = Role>) -> Self {
        let mut ordered: Vec<Role> = Vec::new();
        for role in roles {
            if !ordered.contains(&role) {
                ordered.push(role);
            }
        }
        Self {
            operation,
            roles: ordered,
        }
    }
}

/// Result of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The principal holds the contained role, which the operation accepts.
    Allow(Role),
    /// No role matched; carries the status to report.
    Deny(StatusCode),
}

impl Decision {
    /// Returns true for [`Decision::Allow`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// Checks whether `principal_roles` intersects the requirement.
///
/// Roles are tried in the requirement's order; the first role the principal
/// holds is reported. A denial is always `403 Forbidden`, including when the
/// requirement belongs to a different operation.
pub fn authorize(
    operation: Operation,
    required: &RoleRequirement,
    principal_roles: &BTreeSet<Role>,
) -> Decision {
    if operation != required.operation {
        tracing::debug!(
            operation = %operation,
            requirement = %required.operation,
            "Role requirement does not belong to the operation"
        );
        return Decision::Deny(StatusCode::FORBIDDEN);
    }

    match required
        .roles
        .iter()
        .find(|role| principal_roles.contains(*role))
    {
        Some(role) => Decision::Allow(role.clone()),
        None => Decision::Deny(StatusCode::FORBIDDEN),
    }
}

/// Static mapping from operation to its role requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTable {
    requirements: BTreeMap<Operation, RoleRequirement>,
}

impl AccessTable {
    /// The deployment defaults: account owners and administrators may look
    /// accounts up, only administrators may create or delete them.
    pub fn defaults() -> Self {
        let requirements = [
            RoleRequirement::new(
                Operation::RetrieveAccount,
                [Role::ACCOUNT_OWNER, Role::SERVICE_ADMIN],
            ),
            RoleRequirement::new(Operation::CreateAccount, [Role::SERVICE_ADMIN]),
            RoleRequirement::new(Operation::DeleteAccount, [Role::SERVICE_ADMIN]),
        ]
        .into_iter()
        .map(|req| (req.operation, req))
        .collect();

        Self { requirements }
    }

    /// Resolves the table from the defaults plus configured overrides.
    ///
    /// Resolution is a pure function of its input: resolving the same
    /// overrides twice yields equal tables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when an override lists no roles.
    pub fn resolve(overrides: &[RoleRequirement]) -> Result<Self, Error> {
        let mut table = Self::defaults();

        for req in overrides {
            if req.roles.is_empty() {
                return Err(Error::Configuration(format!(
                    "operation '{}' must accept at least one role",
                    req.operation
                )));
            }
            let normalized = RoleRequirement::new(req.operation, req.roles.iter().cloned());
            table.requirements.insert(req.operation, normalized);
        }

        Ok(table)
    }

    /// Returns the requirement for an operation.
    pub fn requirement(&self, operation: Operation) -> Option<&RoleRequirement> {
        self.requirements.get(&operation)
    }

    /// Iterates over all requirements in operation order.
    pub fn iter(&self) -> impl Iterator<Item = &RoleRequirement> {
        self.requirements.values()
    }
}

impl Default for AccessTable {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[Role]) -> BTreeSet<Role> {
        names.iter().cloned().collect()
    }

    #[test]
    fn admin_requirement_denies_plain_user() {
        let req = RoleRequirement::new(Operation::DeleteAccount, [Role::new("admin")]);

        let denied = authorize(
            Operation::DeleteAccount,
            &req,
            &roles(&[Role::new("user")]),
        );
        assert_eq!(denied, Decision::Deny(StatusCode::FORBIDDEN));

        let allowed = authorize(
            Operation::DeleteAccount,
            &req,
            &roles(&[Role::new("admin")]),
        );
        assert_eq!(allowed, Decision::Allow(Role::new("admin")));
    }

    #[test]
    fn first_matching_role_in_requirement_order_wins() {
        let table = AccessTable::defaults();
        let req = table.requirement(Operation::RetrieveAccount).unwrap();

        let decision = authorize(
            Operation::RetrieveAccount,
            req,
            &roles(&[Role::SERVICE_ADMIN, Role::ACCOUNT_OWNER]),
        );
        assert_eq!(decision, Decision::Allow(Role::ACCOUNT_OWNER));
    }

    #[test]
    fn requirement_for_another_operation_is_denied() {
        let requirement = RoleRequirement::new(Operation::RetrieveAccount, [Role::ACCOUNT_OWNER]);
        let held = BTreeSet::from([Role::ACCOUNT_OWNER]);

        assert_eq!(
            authorize(Operation::DeleteAccount, &requirement, &held),
            Decision::Deny(StatusCode::FORBIDDEN)
        );
        assert!(authorize(Operation::RetrieveAccount, &requirement, &held).is_allowed());
    }

    #[test]
    fn empty_principal_roles_are_denied() {
        let table = AccessTable::defaults();
        for req in table.iter() {
            assert!(!authorize(req.operation, req, &BTreeSet::new()).is_allowed());
        }
    }

    #[test]
    fn defaults_cover_every_operation() {
        let table = AccessTable::defaults();
        for op in Operation::ALL {
            assert!(table.requirement(op).is_some(), "missing {}", op);
        }
        assert_eq!(
            table.requirement(Operation::CreateAccount).unwrap().roles,
            vec![Role::SERVICE_ADMIN]
        );
    }

    #[test]
    fn resolving_twice_yields_same_table() {
        let overrides = vec![RoleRequirement::new(
            Operation::RetrieveAccount,
            [Role::new("auditor"), Role::SERVICE_ADMIN],
        )];

        let first = AccessTable::resolve(&overrides).unwrap();
        let second = AccessTable::resolve(&overrides).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first.requirement(Operation::RetrieveAccount).unwrap().roles,
            vec![Role::new("auditor"), Role::SERVICE_ADMIN]
        );
    }

    #[test]
    fn override_without_roles_is_rejected() {
        let overrides = vec![RoleRequirement {
            operation: Operation::DeleteAccount,
            roles: vec![],
        }];
        assert!(matches!(
            AccessTable::resolve(&overrides),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn requirement_deduplicates_roles() {
        let req = RoleRequirement::new(
            Operation::CreateAccount,
            [Role::SERVICE_ADMIN, Role::SERVICE_ADMIN],
        );
        assert_eq!(req.roles.len(), 1);
    }

    #[test]
    fn operation_ids_round_trip_through_from_str() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!("drop-tables".parse::<Operation>().is_err());
    }
}
