use std::marker::PhantomData;

use crate::error::{Violation, ViolationKind};
use crate::logging::RequestLog;
use crate::policy::{authorize, Decision, Operation, Role, RoleRequirement};
use crate::request::{Principal, RequestMeta};
use crate::state::{Authed, Authorized, Unauthed};

/// Execution context for one inbound request.
///
/// `Ctx<S>` is generic over its authentication/authorization state:
/// - `Ctx<Unauthed>`: request line only, no principal
/// - `Ctx<Authed>`: has a principal, roles not yet checked
/// - `Ctx<Authorized>`: principal holds a role accepted by one operation
///
/// # Type-State Progression
///
/// ```text
/// Ctx<Unauthed> --authenticate--> Ctx<Authed> --authorize--> Ctx<Authorized>
/// ```
///
/// Only `Ctx<Authorized>` can open a unit of work with the
/// [`TransactionManager`](crate::TransactionManager).
///
/// # Construction
///
/// `Ctx` cannot be constructed by user code. Use [`AccessGate`](crate::AccessGate)
/// to obtain a `Ctx<Authorized>`, or [`extract_authed`](crate::web::extract_authed)
/// for a `Ctx<Authed>` from a request adapter.
///
/// # Examples
///
/// ```
/// use account_core::{AccessGate, AccessTable, Operation, Principal, RequestMeta, Role};
///
/// let meta = RequestMeta {
///     request_id: "req-123".to_string(),
///     method: "GET".to_string(),
///     path: "/users/johndoe/accounts".to_string(),
///     principal: Some(Principal::new("admin", [Role::SERVICE_ADMIN])),
/// };
///
/// let ctx = AccessGate::new(AccessTable::defaults())
///     .admit(meta, Operation::RetrieveAccount)
///     .expect("admin may retrieve accounts");
///
/// assert_eq!(ctx.granted_role(), &Role::SERVICE_ADMIN);
/// ```
#[derive(Debug, Clone)]
pub struct Ctx<S = Authorized> {
    request_id: String,
    method: String,
    path: String,
    principal: Option<Principal>,
    grant: Option<(Operation, Role)>,
    _state: PhantomData<S>,
}

// ============================================================================
// Shared methods (available on all states)
// ============================================================================

impl<S> Ctx<S> {
    /// Returns the request ID for this context.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the HTTP method of the request.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the principal if present.
    ///
    /// Always `Some` for `Ctx<Authed>` and `Ctx<Authorized>`.
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Returns a logger bound to this request.
    pub fn log(&self) -> RequestLog<'_> {
        RequestLog::new(
            &self.request_id,
            self.principal.as_ref().map(|p| p.name.as_str()),
            &self.method,
            &self.path,
        )
    }
}

// ============================================================================
// Ctx<Unauthed> - Initial state
// ============================================================================

impl Ctx<Unauthed> {
    /// Creates a new unauthenticated context.
    ///
    /// This is `pub(crate)` so only code within account-core can create it.
    pub(crate) fn new_unauthed(
        request_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            path: path.into(),
            principal: None,
            grant: None,
            _state: PhantomData,
        }
    }

    /// Creates an unauthenticated context from request metadata, returning
    /// the principal separately.
    pub(crate) fn from_meta(meta: RequestMeta) -> (Self, Option<Principal>) {
        let ctx = Self::new_unauthed(meta.request_id, meta.method, meta.path);
        (ctx, meta.principal)
    }

    /// Authenticates the context with the principal the container supplied.
    ///
    /// # Errors
    ///
    /// Returns a [`ViolationKind::Unauthenticated`] violation (401) if the
    /// principal is `None`.
    pub fn authenticate(self, principal: Option<Principal>) -> Result<Ctx<Authed>, Violation> {
        match principal {
            Some(p) => Ok(Ctx {
                request_id: self.request_id,
                method: self.method,
                path: self.path,
                principal: Some(p),
                grant: None,
                _state: PhantomData,
            }),
            None => Err(Violation::new(
                ViolationKind::Unauthenticated,
                "Authentication required: principal not provided",
            )),
        }
    }
}

// ============================================================================
// Ctx<Authed> - Authenticated but not authorized
// ============================================================================

impl Ctx<Authed> {
    /// Returns the authenticated principal.
    pub fn authed_principal(&self) -> &Principal {
        // Invariant: every Ctx<Authed> is built by `authenticate` with Some.
        match &self.principal {
            Some(p) => p,
            None => unreachable!("Ctx<Authed> always carries a principal"),
        }
    }

    /// Checks the principal's roles against `required`.
    ///
    /// This is `pub(crate)`; callers go through [`AccessGate`](crate::AccessGate),
    /// which looks the requirement up in the resolved table.
    pub(crate) fn authorize(
        self,
        required: &RoleRequirement,
    ) -> Result<Ctx<Authorized>, Violation> {
        let operation = required.operation;
        match authorize(operation, required, &self.authed_principal().roles) {
            Decision::Allow(role) => Ok(Ctx {
                request_id: self.request_id,
                method: self.method,
                path: self.path,
                principal: self.principal,
                grant: Some((operation, role)),
                _state: PhantomData,
            }),
            Decision::Deny(_) => Err(Violation::new(
                ViolationKind::Forbidden {
                    operation: operation.as_str(),
                },
                format!(
                    "principal '{}' holds none of the roles accepted by '{}'",
                    self.authed_principal().name,
                    operation
                ),
            )),
        }
    }
}

// ============================================================================
// Ctx<Authorized> - Role check passed for one operation
// ============================================================================

impl Ctx<Authorized> {
    fn grant(&self) -> &(Operation, Role) {
        // Invariant: every Ctx<Authorized> is built by `Ctx<Authed>::authorize`.
        match &self.grant {
            Some(grant) => grant,
            None => unreachable!("Ctx<Authorized> always carries a grant"),
        }
    }

    /// The operation this context was authorized for.
    pub fn operation(&self) -> Operation {
        self.grant().0
    }

    /// The first role in the requirement's order that the principal holds.
    pub fn granted_role(&self) -> &Role {
        &self.grant().1
    }

    /// Name of the authorized principal.
    pub fn principal_name(&self) -> &str {
        self.principal.as_ref().map(|p| p.name.as_str()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Principal {
        Principal::new("admin", [Role::SERVICE_ADMIN])
    }

    #[test]
    fn unauthed_ctx_has_no_principal() {
        let ctx = Ctx::new_unauthed("req-unauth", "GET", "/");
        assert_eq!(ctx.request_id(), "req-unauth");
        assert!(ctx.principal().is_none());
        assert_eq!(ctx.log().user(), "<no name>");
    }

    #[test]
    fn authenticate_with_principal_succeeds() {
        let ctx = Ctx::new_unauthed("req-auth", "POST", "/users");
        let authed = ctx.authenticate(Some(admin())).expect("should authenticate");

        assert_eq!(authed.request_id(), "req-auth");
        assert_eq!(authed.authed_principal().name, "admin");
        assert_eq!(authed.log().user(), "admin");
    }

    #[test]
    fn authenticate_without_principal_fails() {
        let ctx = Ctx::new_unauthed("req-auth-fail", "GET", "/");
        let err = ctx.authenticate(None).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Unauthenticated);
        assert_eq!(err.kind.status(), 401);
    }

    #[test]
    fn authorize_records_operation_and_role() {
        let authed = Ctx::new_unauthed("req-authz", "DELETE", "/users/x")
            .authenticate(Some(admin()))
            .unwrap();
        let required = RoleRequirement::new(Operation::DeleteAccount, [Role::SERVICE_ADMIN]);

        let ctx = authed.authorize(&required).unwrap();

        assert_eq!(ctx.operation(), Operation::DeleteAccount);
        assert_eq!(ctx.granted_role(), &Role::SERVICE_ADMIN);
        assert_eq!(ctx.principal_name(), "admin");
        assert_eq!(ctx.method(), "DELETE");
    }

    #[test]
    fn authorize_without_matching_role_is_forbidden() {
        let authed = Ctx::new_unauthed("req-403", "POST", "/users")
            .authenticate(Some(Principal::new("johndoe", [Role::ACCOUNT_OWNER])))
            .unwrap();
        let required = RoleRequirement::new(Operation::CreateAccount, [Role::SERVICE_ADMIN]);

        let err = authed.authorize(&required).unwrap_err();
        assert_eq!(
            err.kind,
            ViolationKind::Forbidden {
                operation: "create-account"
            }
        );
        assert_eq!(err.kind.status(), 403);
        assert!(err.message.contains("johndoe"));
    }
}
