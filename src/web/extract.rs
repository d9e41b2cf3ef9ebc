//! Extraction boundary traits.
//!
//! Implement these for a framework's request type to feed it into the
//! access filter without going through [`RequestAdapter`](super::RequestAdapter).

use crate::request::RequestMeta;

use super::TaintedInputs;

/// Produces request metadata.
pub trait ExtractMetadata {
    /// Request id, request line and principal.
    fn extract_metadata(&self) -> RequestMeta;
}

/// Produces the untrusted inputs of a request.
pub trait ExtractTaintedInputs {
    /// Every header, path parameter and the body, wrapped in `Tainted<T>`.
    fn extract_tainted_inputs(&self) -> TaintedInputs;
}
