//! Account manager core.
//!
//! Registration, deletion and lookup of user accounts behind a request
//! pipeline that enforces, in order:
//! - **Authentication**: the hosting layer's principal becomes a `Ctx<Authed>`
//! - **Role-based access**: [`AccessGate`] is the only way to a `Ctx<Authorized>`
//! - **Request-scoped transactions**: [`TransactionManager`] opens one unit of
//!   work per request and commits or rolls it back from the outcome
//! - **Credential derivation**: passphrases are stored only as scrypt output
//!   ([`CredentialDeriver`]) and travel as [`Secret`]s until then
//!
//! The client side negotiates TLS through a [`Negotiator`] before talking to
//! the service with [`AccountManagerClient`].
//!
//! # Core Types
//!
//! - [`Secret<T>`]: redacts sensitive values in logs and wipes them on drop
//! - [`Tainted<T>`]: untrusted request data that must pass a [`Sanitizer`]
//! - [`Ctx`]: request context in the `Unauthed → Authed → Authorized` states
//! - [`AccountService`]: the request pipeline over a persistence provider
//!
//! # Examples
//!
//! ```
//! use account_core::{AccessGate, Operation, Principal, RequestMeta, Role, Secret};
//!
//! // Secrets are automatically redacted
//! let passphrase = Secret::new(b"Smb9324$#@#@$".to_vec());
//! assert_eq!(format!("{:?}", passphrase), "[REDACTED]");
//!
//! // The gate enforces the operation's role requirement
//! let meta = RequestMeta {
//!     request_id: "req-123".to_string(),
//!     method: "DELETE".to_string(),
//!     path: "/users/johndoe".to_string(),
//!     principal: Some(Principal::new("admin", [Role::SERVICE_ADMIN])),
//! };
//!
//! let ctx = AccessGate::default()
//!     .admit(meta, Operation::DeleteAccount)
//!     .expect("service admins may delete accounts");
//! assert_eq!(ctx.principal_name(), "admin");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod account;
pub mod client;
pub mod config;
mod context;
pub mod credential;
mod error;
mod gate;
pub mod keys;
mod logging;
mod policy;
mod request;
mod sanitizer;
mod secret;
mod service;
mod state;
mod store;
mod tainted;
pub mod tls;
mod transaction;
mod verified;
pub mod web;

pub use account::{
    Controller, ControllerBody, Fulfillment, FulfillmentBody, Registration, RegistrationBody,
    Schema, StoredController, StoredUser, FULFILLMENT_CONTENT_TYPE,
};
pub use client::{AccountManagerClient, ClientResponse};
pub use config::{ClientSettings, ServiceConfig};
pub use context::Ctx;
pub use credential::{CostParams, CredentialDeriver, DerivedCredential};
pub use error::{Error, Violation, ViolationKind};
pub use gate::AccessGate;
pub use logging::{RequestLog, NO_NAME};
pub use policy::{authorize, AccessTable, Decision, Operation, Role, RoleRequirement};
pub use request::{Principal, RequestMeta};
pub use sanitizer::{
    AccountNameSanitizer, CredentialSanitizer, EmailSanitizer, MacAddressSanitizer, SanitizationError,
    SanitizationErrorKind, Sanitizer,
};
pub use secret::{Passphrase, Secret};
pub use service::{AccountService, ServiceResponse, USERNAME_PARAM};
pub use state::{Authed, Authorized, Unauthed};
pub use store::{AccountSession, MemorySession, MemoryStore};
pub use tainted::Tainted;
pub use tls::{
    CandidateOptions, ContextFactory, FactoryError, Negotiator, NegotiatorConfig,
    ProtocolSelection, ProtocolVersion, RustlsContextFactory, TransportContext, TrustAnchors,
    TrustStore,
};
pub use transaction::{
    BeginFailure, Completion, Outcome, RollbackCause, Session, SessionFactory,
    TransactionManager, UnitOfWork,
};
pub use verified::Verified;

#[cfg(test)]
pub(crate) mod test_utils {
    use std::io;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use proptest::prelude::*;
    use rcgen::{CertificateParams, DnType, KeyPair};
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory sink for formatted log output.
    #[derive(Clone, Default)]
    pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Runs `f` with a debug-level subscriber and returns its result and the log text.
    pub fn with_captured_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs.contents())
    }

    pub fn capture_logs(f: impl FnOnce()) -> String {
        with_captured_logs(f).1
    }

    pub fn arb_account_name() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9._-]{1,64}"
    }

    pub fn arb_email() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,20}@[a-z0-9]{1,20}\\.[a-z]{2,6}"
    }

    /// Self-signed CA certificate and key, both PEM.
    pub fn generate_test_ca_pem() -> (String, String) {
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, "Account Manager Test CA");
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);

        let key_pair = KeyPair::generate().expect("key generation should succeed");
        let cert = params
            .self_signed(&key_pair)
            .expect("self-signing should succeed");

        (cert.pem(), key_pair.serialize_pem())
    }
}
