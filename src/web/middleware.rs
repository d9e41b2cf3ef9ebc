//! Builds request contexts from a [`RequestAdapter`].
//!
//! These extractors produce `Ctx<Unauthed>` or `Ctx<Authed>` only. Access to
//! an operation is decided afterwards by the [`AccessGate`](crate::AccessGate).
//!
//! ```text
//! HTTP request
//!   ↓
//! RequestAdapter
//!   ↓
//! extract_authed()  → (Ctx<Authed>, TaintedInputs)     401 if no principal
//!   ↓
//! AccessGate::authorize() → Ctx<Authorized>            403 if no role matches
//! ```

use crate::context::Ctx;
use crate::error::Violation;
use crate::state::{Authed, Unauthed};

use super::{ExtractMetadata, ExtractTaintedInputs, RequestAdapter, TaintedInputs};

/// Result of [`extract_unauthed`].
#[derive(Debug)]
pub struct UnauthenticatedExtraction {
    /// Context without a principal
    pub context: Ctx<Unauthed>,
    /// Untrusted inputs
    pub inputs: TaintedInputs,
}

/// Result of [`extract_authed`].
#[derive(Debug)]
pub struct AuthenticatedExtraction {
    /// Context carrying the container's principal
    pub context: Ctx<Authed>,
    /// Untrusted inputs
    pub inputs: TaintedInputs,
}

/// Extracts a context without looking at the principal.
pub fn extract_unauthed(adapter: &RequestAdapter) -> UnauthenticatedExtraction {
    let meta = adapter.extract_metadata();

    UnauthenticatedExtraction {
        context: Ctx::new_unauthed(meta.request_id, meta.method, meta.path),
        inputs: adapter.extract_tainted_inputs(),
    }
}

/// Extracts an authenticated context.
///
/// # Errors
///
/// Returns an `Unauthenticated` violation (401) if the adapter carries no
/// principal.
pub fn extract_authed(adapter: &RequestAdapter) -> Result<AuthenticatedExtraction, Violation> {
    let meta = adapter.extract_metadata();
    let (unauthed, principal) = Ctx::from_meta(meta);
    let context = unauthed.authenticate(principal)?;

    Ok(AuthenticatedExtraction {
        context,
        inputs: adapter.extract_tainted_inputs(),
    })
}
