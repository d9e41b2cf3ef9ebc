//! Request-scoped transaction boundaries.
//!
//! Every authorized request gets one [`UnitOfWork`] from a shared
//! [`SessionFactory`]. The unit of work is opened before the handler runs and
//! closed afterwards according to the handler's [`Outcome`]:
//!
//! ```text
//! NoTransaction --begin--> Active --complete--> Committed | RolledBack
//! ```
//!
//! A unit of work that is dropped while still active is rolled back, so no
//! exit path leaves a transaction open.

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::context::Ctx;
use crate::error::Error;
use crate::logging::RequestLog;
use crate::state::Authorized;

/// A persistence session supporting a single transaction at a time.
pub trait Session {
    /// Starts a transaction.
    fn begin(&mut self) -> Result<(), Error>;
    /// Commits the active transaction.
    fn commit(&mut self) -> Result<(), Error>;
    /// Rolls back the active transaction.
    fn rollback(&mut self) -> Result<(), Error>;
    /// True between a successful `begin` and the matching commit or rollback.
    fn is_active(&self) -> bool;
    /// True once the transaction was marked so it can only roll back.
    fn is_rollback_only(&self) -> bool;
    /// Marks the active transaction rollback-only.
    fn set_rollback_only(&mut self);
}

/// Process-wide source of sessions, shared by all request threads.
pub trait SessionFactory: Send + Sync {
    /// The session type handed to each request.
    type Session: Session;

    /// Creates a fresh session for one request.
    fn create_session(&self) -> Result<Self::Session, Error>;
}

/// What to do when a transaction cannot be started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeginFailure {
    /// Log the failure and run the handler without a transaction.
    #[default]
    Proceed,
    /// Fail the request with a persistence error (500).
    Abort,
}

/// The handler's result as seen by the transaction boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// The handler explicitly asked for a rollback.
    pub rollback_only: bool,
    /// Status of the response about to be sent.
    pub status: StatusCode,
    /// Reason phrase of the response.
    pub reason: String,
}

impl Outcome {
    /// A response with `status` and its canonical reason.
    pub fn status(status: StatusCode) -> Self {
        Self {
            rollback_only: false,
            status,
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }

    /// A response with an explicit reason phrase.
    pub fn with_reason(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            rollback_only: false,
            status,
            reason: reason.into(),
        }
    }

    /// Marks the outcome rollback-only.
    pub fn mark_rollback_only(mut self) -> Self {
        self.rollback_only = true;
        self
    }
}

/// Why a unit of work was rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackCause {
    /// Rollback-only was set on the outcome or the session.
    Marked,
    /// The response status was 400 or above.
    ErrorResponse(StatusCode),
}

/// How [`TransactionManager::complete`] closed a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The transaction was committed.
    Committed,
    /// The transaction was rolled back.
    RolledBack(RollbackCause),
    /// No active transaction; nothing was done.
    Skipped,
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Committed => write!(f, "COMMIT"),
            Completion::RolledBack(RollbackCause::Marked) => write!(f, "ROLLBACK (marked)"),
            Completion::RolledBack(RollbackCause::ErrorResponse(status)) => {
                write!(f, "ROLLBACK (error-response) {}", status.as_u16())
            }
            Completion::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// One request's session and transaction.
///
/// Owned exclusively by the request that began it. If it is dropped while
/// the transaction is still active, the transaction is rolled back.
#[derive(Debug)]
pub struct UnitOfWork<S: Session> {
    session: Option<S>,
}

impl<S: Session> UnitOfWork<S> {
    /// True if a transaction is open.
    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_active())
    }

    /// Marks the open transaction rollback-only. No-op without one.
    pub fn set_rollback_only(&mut self) {
        if let Some(session) = self.session.as_mut().filter(|s| s.is_active()) {
            session.set_rollback_only();
        }
    }

    /// True if the session was marked rollback-only.
    pub fn is_rollback_only(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_rollback_only())
    }

    /// The request's session.
    ///
    /// # Errors
    ///
    /// [`Error::Persistence`] when no session could be created at begin.
    pub fn session(&mut self) -> Result<&mut S, Error> {
        self.session
            .as_mut()
            .ok_or_else(|| Error::Persistence("no persistence session for this request".into()))
    }
}

impl<S: Session> Drop for UnitOfWork<S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.is_active() {
                match session.rollback() {
                    Ok(()) => tracing::warn!("Unit of work dropped while active, rolled back"),
                    Err(e) => tracing::error!("Rollback of abandoned unit of work failed: {}", e),
                }
            }
        }
    }
}

/// Opens and closes units of work around requests.
#[derive(Debug)]
pub struct TransactionManager<F> {
    factory: F,
    begin_failure: BeginFailure,
}

impl<F: SessionFactory> TransactionManager<F> {
    /// Creates a manager over a shared session factory.
    pub fn new(factory: F, begin_failure: BeginFailure) -> Self {
        Self {
            factory,
            begin_failure,
        }
    }

    /// The underlying session factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Opens a unit of work for an authorized request.
    ///
    /// # Errors
    ///
    /// With [`BeginFailure::Abort`], a failure to create the session or start
    /// the transaction is returned as [`Error::Persistence`]. With
    /// [`BeginFailure::Proceed`] it is logged and an inactive unit of work is
    /// returned instead.
    pub fn begin(&self, ctx: &Ctx<Authorized>) -> Result<UnitOfWork<F::Session>, Error> {
        let log = ctx.log();

        let mut session = match self.factory.create_session() {
            Ok(session) => session,
            Err(e) => return self.begin_failed(&log, ctx, None, e),
        };

        if let Err(e) = session.begin() {
            if session.is_active() {
                if let Err(rollback_err) = session.rollback() {
                    log.error(format_args!("Rollback after failed begin failed: {}", rollback_err));
                }
            }
            return self.begin_failed(&log, ctx, Some(session), e);
        }

        log.debug(format_args!(
            "Started transaction for user '{}', request '{} {}'",
            log.user(),
            ctx.method(),
            ctx.path()
        ));

        Ok(UnitOfWork {
            session: Some(session),
        })
    }

    fn begin_failed(
        &self,
        log: &RequestLog<'_>,
        ctx: &Ctx<Authorized>,
        session: Option<F::Session>,
        cause: Error,
    ) -> Result<UnitOfWork<F::Session>, Error> {
        log.error(format_args!(
            "Unable to start transaction for user '{}', request '{} {}': {}",
            log.user(),
            ctx.method(),
            ctx.path(),
            cause
        ));

        match self.begin_failure {
            BeginFailure::Proceed => Ok(UnitOfWork { session }),
            BeginFailure::Abort => Err(Error::Persistence(format!(
                "unable to start transaction: {}",
                cause
            ))),
        }
    }

    /// Closes a unit of work according to the handler's outcome.
    ///
    /// Rollback-only takes precedence over any status. Otherwise a status of
    /// 400 or above rolls back and anything below commits. An inactive unit
    /// of work is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the commit or rollback failure. Before returning, a
    /// best-effort rollback is attempted; if that fails too, the second
    /// failure is logged and dropped.
    pub fn complete(
        &self,
        uow: &mut UnitOfWork<F::Session>,
        outcome: &Outcome,
        ctx: &Ctx<Authorized>,
    ) -> Result<Completion, Error> {
        let log = ctx.log();

        let session = match uow.session.as_mut() {
            Some(session) if session.is_active() => session,
            _ => return Ok(Completion::Skipped),
        };

        let result = if outcome.rollback_only || session.is_rollback_only() {
            session.rollback().map(|()| {
                log.info(format_args!("ROLLBACK (marked)"));
                Completion::RolledBack(RollbackCause::Marked)
            })
        } else if outcome.status.as_u16() >= 400 {
            session.rollback().map(|()| {
                log.info(format_args!(
                    "ROLLBACK (error-response): {} {}",
                    outcome.status.as_u16(),
                    outcome.reason
                ));
                Completion::RolledBack(RollbackCause::ErrorResponse(outcome.status))
            })
        } else {
            session.commit().map(|()| {
                log.info(format_args!("COMMIT"));
                Completion::Committed
            })
        };

        result.map_err(|e| {
            log.error(format_args!("Transaction completion failed: {}", e));
            if session.is_active() {
                if let Err(second) = session.rollback() {
                    log.error(format_args!("Best-effort rollback failed: {}", second));
                }
            }
            e
        })
    }
}
