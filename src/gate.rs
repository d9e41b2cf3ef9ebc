use crate::{
    context::Ctx,
    error::{Violation, ViolationKind},
    policy::{AccessTable, Operation},
    request::RequestMeta,
    state::{Authed, Authorized},
};

/// The access-filter gate.
///
/// `AccessGate` is the only way to obtain a `Ctx<Authorized>`. It owns the
/// operation → roles table resolved at startup and never mutates it.
///
/// # Examples
///
/// ```
/// use account_core::{AccessGate, AccessTable, Operation, Principal, RequestMeta, Role};
///
/// let gate = AccessGate::new(AccessTable::defaults());
/// let meta = RequestMeta {
///     request_id: "req-7".to_string(),
///     method: "POST".to_string(),
///     path: "/users".to_string(),
///     principal: Some(Principal::new("johndoe", [Role::ACCOUNT_OWNER])),
/// };
///
/// let denied = gate.admit(meta, Operation::CreateAccount).unwrap_err();
/// assert_eq!(denied.kind.status(), 403);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    table: AccessTable,
}

impl AccessGate {
    /// Creates a gate over a resolved table.
    pub fn new(table: AccessTable) -> Self {
        Self { table }
    }

    /// Returns the table this gate enforces.
    pub fn table(&self) -> &AccessTable {
        &self.table
    }

    /// Authenticates and authorizes a request in one step.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` (401) if the request carries no principal
    /// - `Forbidden` (403) if the principal holds none of the operation's roles
    pub fn admit(&self, meta: RequestMeta, operation: Operation) -> Result<Ctx<Authorized>, Violation> {
        let (ctx, principal) = Ctx::from_meta(meta);
        let authed = ctx.authenticate(principal)?;
        self.authorize(authed, operation)
    }

    /// Authorizes an already-authenticated context for `operation`.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` (403) when the principal's roles do not intersect
    /// the operation's requirement, including when the table has no entry
    /// for the operation.
    pub fn authorize(&self, ctx: Ctx<Authed>, operation: Operation) -> Result<Ctx<Authorized>, Violation> {
        let required = self.table.requirement(operation).ok_or_else(|| {
            Violation::new(
                ViolationKind::Forbidden {
                    operation: operation.as_str(),
                },
                format!("no role requirement configured for '{}'", operation),
            )
        })?;

        let result = ctx.authorize(required);
        if let Err(violation) = &result {
            tracing::debug!(operation = %operation, "Access denied: {}", violation.message);
        }
        result
    }
}
