//! Request adapter for mapping HTTP requests onto account-core types.

use std::collections::HashMap;

use crate::request::{Principal, RequestMeta};
use crate::secret::Secret;
use crate::Tainted;

use super::{ExtractMetadata, ExtractTaintedInputs};

/// Framework-neutral view of one inbound HTTP request.
///
/// Holds simple owned data so that any HTTP framework can fill it in.
/// Header names are stored lower-cased. The body may carry plaintext
/// credentials, so it is held as a [`Secret`] and wiped with the adapter.
///
/// # Examples
///
/// ```
/// use account_core::web::{ExtractMetadata, ExtractTaintedInputs, RequestAdapter};
/// use account_core::{Principal, Role};
///
/// let mut adapter = RequestAdapter::new("req-12345", "GET", "/users/johndoe/accounts");
/// adapter.set_principal(Some(Principal::new("johndoe", [Role::ACCOUNT_OWNER])));
/// adapter.add_path_param("username", "johndoe");
///
/// let meta = adapter.extract_metadata();
/// assert_eq!(meta.method, "GET");
///
/// let inputs = adapter.extract_tainted_inputs();
/// assert!(inputs.path_param("username").is_some());
/// ```
#[derive(Debug)]
pub struct RequestAdapter {
    request_id: String,
    method: String,
    path: String,
    principal: Option<Principal>,
    headers: HashMap<String, String>,
    path_params: HashMap<String, String>,
    body: Option<Secret<String>>,
}

impl RequestAdapter {
    /// Creates an adapter for a request line. Everything else starts empty.
    pub fn new(request_id: impl Into<String>, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            path: path.into(),
            principal: None,
            headers: HashMap::new(),
            path_params: HashMap::new(),
            body: None,
        }
    }

    /// Sets the principal the container authenticated, if any.
    pub fn set_principal(&mut self, principal: Option<Principal>) {
        self.principal = principal;
    }

    /// Adds a header.
    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into().to_ascii_lowercase(), value.into());
    }

    /// Adds a routed path parameter.
    pub fn add_path_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.path_params.insert(key.into(), value.into());
    }

    /// Sets the request body.
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = Some(Secret::new(body.into()));
    }

    /// Returns the request ID.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the principal, if present.
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }
}

impl ExtractMetadata for RequestAdapter {
    fn extract_metadata(&self) -> RequestMeta {
        RequestMeta {
            request_id: self.request_id.clone(),
            method: self.method.clone(),
            path: self.path.clone(),
            principal: self.principal.clone(),
        }
    }
}

impl ExtractTaintedInputs for RequestAdapter {
    fn extract_tainted_inputs(&self) -> TaintedInputs {
        let taint = |map: &HashMap<String, String>| {
            map.iter()
                .map(|(k, v)| (k.clone(), Tainted::new(v.clone())))
                .collect()
        };

        TaintedInputs {
            headers: taint(&self.headers),
            path_params: taint(&self.path_params),
            body: self
                .body
                .as_ref()
                .map(|body| Tainted::new(Secret::new(body.expose_secret().clone()))),
        }
    }
}

/// Untrusted inputs of one request.
#[derive(Debug, Default)]
pub struct TaintedInputs {
    headers: HashMap<String, Tainted<String>>,
    path_params: HashMap<String, Tainted<String>>,
    body: Option<Tainted<Secret<String>>>,
}

impl TaintedInputs {
    /// Header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&Tainted<String>> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    /// Routed path parameter.
    pub fn path_param(&self, name: &str) -> Option<&Tainted<String>> {
        self.path_params.get(name)
    }

    /// Request body.
    pub fn body(&self) -> Option<&Tainted<Secret<String>>> {
        self.body.as_ref()
    }

    /// Moves the body out, leaving `None` behind.
    pub fn take_body(&mut self) -> Option<Tainted<Secret<String>>> {
        self.body.take()
    }

    /// Number of headers.
    pub fn headers_count(&self) -> usize {
        self.headers.len()
    }

    /// Number of path parameters.
    pub fn path_params_count(&self) -> usize {
        self.path_params.len()
    }
}
