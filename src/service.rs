//! The account manager request pipeline.
//!
//! ```text
//! RequestAdapter
//!   ↓ extract_authed          401 without a principal
//!   ↓ AccessGate::authorize   403 without a matching role
//!   ↓ TransactionManager::begin
//!   ↓ handler (create / delete / retrieve)
//!       create reads a customer fulfillment instead of a plain
//!       registration when the body is FULFILLMENT_CONTENT_TYPE
//!   ↓ TransactionManager::complete
//! ServiceResponse
//! ```

use http::StatusCode;

use crate::account::{Fulfillment, Registration, Schema, StoredUser, FULFILLMENT_CONTENT_TYPE};
use crate::config::ServiceConfig;
use crate::context::Ctx;
use crate::credential::CredentialDeriver;
use crate::error::{Error, Violation};
use crate::gate::AccessGate;
use crate::policy::Operation;
use crate::sanitizer::{AccountNameSanitizer, Sanitizer};
use crate::store::AccountSession;
use crate::tainted::Tainted;
use crate::transaction::{Outcome, SessionFactory, TransactionManager, UnitOfWork};
use crate::web::{extract_authed, RequestAdapter, TaintedInputs};

/// Path parameter naming the addressed user.
pub const USERNAME_PARAM: &str = "username";

/// What the hosting HTTP layer should send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    /// Response status
    pub status: StatusCode,
    /// Reason phrase; never contains credentials
    pub reason: String,
    /// Plain-text body, if any
    pub body: Option<String>,
}

impl ServiceResponse {
    fn success(status: StatusCode, body: Option<String>) -> Self {
        Self {
            status,
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        }
    }

    fn failure(error: &Error, debug_errors: bool) -> Self {
        Self {
            status: error.status(),
            reason: error.reason(debug_errors),
            body: None,
        }
    }
}

/// Handles account manager operations over a persistence provider.
///
/// One instance serves all requests; each call to [`handle`](Self::handle)
/// runs in its own unit of work.
///
/// # Examples
///
/// ```
/// use account_core::web::RequestAdapter;
/// use account_core::{AccountService, MemoryStore, Operation, Principal, Role, ServiceConfig};
///
/// let store = MemoryStore::new();
/// let service = AccountService::new(store.clone(), &ServiceConfig::default()).unwrap();
///
/// let mut request = RequestAdapter::new("req-1", "GET", "/users/johndoe/accounts");
/// request.set_principal(Some(Principal::new("johndoe", [Role::ACCOUNT_OWNER])));
/// request.add_path_param("username", "johndoe");
///
/// let response = service.handle(&request, Operation::RetrieveAccount);
/// assert_eq!(response.status, 200);
/// assert_eq!(
///     response.body.as_deref(),
///     Some("[SEC: johndoe] Retrieve accounts for User johndoe")
/// );
/// ```
#[derive(Debug)]
pub struct AccountService<F> {
    gate: AccessGate,
    transactions: TransactionManager<F>,
    deriver: CredentialDeriver,
    schema: Schema,
    debug_errors: bool,
}

impl<F> AccountService<F>
where
    F: SessionFactory,
    F::Session: AccountSession,
{
    /// Builds the service, resolving the access table once.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the access overrides are invalid.
    pub fn new(factory: F, config: &ServiceConfig) -> Result<Self, Error> {
        Ok(Self {
            gate: AccessGate::new(config.access_table()?),
            transactions: TransactionManager::new(factory, config.begin_failure),
            deriver: CredentialDeriver,
            schema: config.schema,
            debug_errors: config.debug_errors,
        })
    }

    /// The access gate in use.
    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// The persistence mapping in use.
    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Runs one request through the pipeline.
    ///
    /// Every failure is mapped to exactly one status. Any unit of work begun
    /// here is committed or rolled back before this returns.
    pub fn handle(&self, request: &RequestAdapter, operation: Operation) -> ServiceResponse {
        let extraction = match extract_authed(request) {
            Ok(extraction) => extraction,
            Err(violation) => return self.reject(request.request_id(), operation, violation),
        };

        let ctx = match self.gate.authorize(extraction.context, operation) {
            Ok(ctx) => ctx,
            Err(violation) => return self.reject(request.request_id(), operation, violation),
        };

        let mut uow = match self.transactions.begin(&ctx) {
            Ok(uow) => uow,
            Err(e) => return self.fail(&ctx, e),
        };

        let mut inputs = extraction.inputs;
        let result = match operation {
            Operation::CreateAccount => self.create(&ctx, &mut uow, &mut inputs),
            Operation::DeleteAccount => self.delete(&ctx, &mut uow, &inputs),
            Operation::RetrieveAccount => self.retrieve(&ctx, &inputs),
        };

        let (outcome, response) = match result {
            Ok(response) => (
                Outcome::with_reason(response.status, response.reason.clone()),
                response,
            ),
            Err(e) => {
                let response = self.fail(&ctx, e);
                (
                    Outcome::with_reason(response.status, response.reason.clone()),
                    response,
                )
            }
        };

        match self.transactions.complete(&mut uow, &outcome, &ctx) {
            Ok(_) => response,
            Err(e) => self.fail(&ctx, e),
        }
    }

    fn reject(&self, request_id: &str, operation: Operation, violation: Violation) -> ServiceResponse {
        tracing::warn!(
            request_id = %request_id,
            operation = %operation,
            "Request rejected: {}",
            violation
        );
        ServiceResponse::failure(&Error::Violation(violation), self.debug_errors)
    }

    fn fail(&self, ctx: &Ctx, error: Error) -> ServiceResponse {
        let log = ctx.log();
        if error.is_client_error() {
            log.warn(format_args!("{}", error));
        } else {
            log.error(format_args!("{}", error));
        }
        ServiceResponse::failure(&error, self.debug_errors)
    }

    fn create(
        &self,
        ctx: &Ctx,
        uow: &mut UnitOfWork<F::Session>,
        inputs: &mut TaintedInputs,
    ) -> Result<ServiceResponse, Error> {
        let document = inputs.take_body().ok_or_else(|| {
            Error::InvalidArgument(
                "User registration JSON representation was not correctly deserialized.".into(),
            )
        })?;

        let username = if is_fulfillment(inputs) {
            let fulfillment = Fulfillment::from_json(document)?;
            let account_id = self.create_user(uow, fulfillment.registration())?;

            let session = uow.session()?;
            for controller in fulfillment.controllers() {
                session
                    .insert_controller(self.schema, account_id, controller)
                    .map_err(|e| Error::Persistence(format!("Account creation FAILED: {}", e)))?;
            }
            ctx.log().debug(format_args!(
                "Added {} {} for account {}",
                fulfillment.controllers().len(),
                self.schema.controller_entity_name(),
                account_id
            ));

            fulfillment.registration().username().to_string()
        } else {
            let registration = Registration::from_json(document)?;
            self.create_user(uow, &registration)?;
            registration.username().to_string()
        };

        ctx.log().info(format_args!(
            "CREATE ACCOUNT: [Service admin: '{}'] created new account for user '{}'.",
            ctx.principal_name(),
            username
        ));

        Ok(ServiceResponse::success(StatusCode::NO_CONTENT, None))
    }

    /// Creates the account and its user, returning the account id.
    fn create_user(
        &self,
        uow: &mut UnitOfWork<F::Session>,
        registration: &Registration,
    ) -> Result<u64, Error> {
        let session = uow.session()?;

        let taken = session
            .user_exists(self.schema, registration.username())
            .map_err(|e| Error::Persistence(format!("Error in checking duplicate usernames: {}", e)))?;
        if taken {
            return Err(Error::Conflict(format!(
                "User '{}' already exists.",
                registration.username()
            )));
        }

        let credential = self
            .deriver
            .derive(registration.credentials(), registration.username())?;

        let account_id = session
            .create_account()
            .map_err(|e| Error::Persistence(format!("Account creation FAILED: {}", e)))?;

        session
            .insert_user(StoredUser {
                account_id,
                username: registration.username().to_string(),
                email: registration.email().map(str::to_string),
                credential,
                schema: self.schema,
            })
            .map_err(|e| match e {
                Error::Conflict(_) => e,
                other => Error::Persistence(format!("Account creation FAILED: {}", other)),
            })?;

        Ok(account_id)
    }

    fn delete(
        &self,
        ctx: &Ctx,
        uow: &mut UnitOfWork<F::Session>,
        inputs: &TaintedInputs,
    ) -> Result<ServiceResponse, Error> {
        let username = addressed_user(inputs)?;
        let session = uow.session()?;

        let removed = session
            .remove_user(self.schema, &username)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        if !removed {
            return Err(Error::NotFound("Username was not found.".into()));
        }

        ctx.log().debug(format_args!(
            "Removed {} '{}'",
            self.schema.entity_name(),
            username
        ));

        Ok(ServiceResponse::success(StatusCode::NO_CONTENT, None))
    }

    fn retrieve(&self, ctx: &Ctx, inputs: &TaintedInputs) -> Result<ServiceResponse, Error> {
        let username = addressed_user(inputs)?;

        Ok(ServiceResponse::success(
            StatusCode::OK,
            Some(format!(
                "[SEC: {}] Retrieve accounts for User {}",
                ctx.principal_name(),
                username
            )),
        ))
    }
}

fn is_fulfillment(inputs: &TaintedInputs) -> bool {
    inputs
        .header("content-type")
        .cloned()
        .map(Tainted::into_inner)
        .and_then(|value| {
            value
                .split(';')
                .next()
                .map(|media| media.trim().eq_ignore_ascii_case(FULFILLMENT_CONTENT_TYPE))
        })
        .unwrap_or(false)
}

fn addressed_user(inputs: &TaintedInputs) -> Result<String, Error> {
    let raw = inputs.path_param(USERNAME_PARAM).cloned().ok_or_else(|| {
        Error::InvalidArgument(format!("missing path parameter '{}'", USERNAME_PARAM))
    })?;
    Ok(AccountNameSanitizer::default().sanitize(raw)?.into_inner())
}
