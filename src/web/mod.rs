//! HTTP boundary.
//!
//! The hosting HTTP layer maps each inbound request onto a
//! [`RequestAdapter`]. From there:
//!
//! - request metadata (id, method, path, principal) becomes a
//!   [`RequestMeta`](crate::RequestMeta)
//! - every header, path parameter and the body become `Tainted<T>`; the
//!   body, which may hold credentials, stays a `Secret` throughout
//! - [`extract_authed`] turns the adapter into a `Ctx<Authed>`
//!
//! Nothing here grants access; that is the [`AccessGate`](crate::AccessGate)'s job.
//!
//! # Example Flow
//!
//! ```
//! use account_core::web::{extract_authed, RequestAdapter};
//! use account_core::{AccessGate, Operation, Principal, Role};
//!
//! let mut adapter = RequestAdapter::new("req-1", "DELETE", "/users/johndoe");
//! adapter.set_principal(Some(Principal::new("admin", [Role::SERVICE_ADMIN])));
//! adapter.add_path_param("username", "johndoe");
//!
//! let extraction = extract_authed(&adapter).expect("principal present");
//! let ctx = AccessGate::default()
//!     .authorize(extraction.context, Operation::DeleteAccount)
//!     .expect("admin may delete");
//!
//! assert_eq!(ctx.path(), "/users/johndoe");
//! ```

mod adapter;
mod extract;
mod middleware;

pub use adapter::{RequestAdapter, TaintedInputs};
pub use extract::{ExtractMetadata, ExtractTaintedInputs};
pub use middleware::{
    extract_authed, extract_unauthed, AuthenticatedExtraction, UnauthenticatedExtraction,
};
