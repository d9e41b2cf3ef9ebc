//! JSON configuration files for the service and the client.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::account::Schema;
use crate::error::Error;
use crate::policy::{AccessTable, RoleRequirement};
use crate::tls::{NegotiatorConfig, ProtocolSelection, ProtocolVersion, TrustStore, DEFAULT_PREFERENCE};
use crate::transaction::BeginFailure;

/// Default service root used by the client.
pub const DEFAULT_SERVICE_ROOT: &str = "https://localhost:8443";

fn load<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let raw = fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!("Cannot read configuration '{}': {}", path.display(), e))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        Error::Configuration(format!("Cannot parse configuration '{}': {}", path.display(), e))
    })
}

/// Settings of the account service.
///
/// ```json
/// {
///   "schema": "legacy_beehive",
///   "begin_failure": "abort",
///   "access": [
///     { "operation": "retrieve-account", "roles": ["auditor", "service-admin"] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Persistence mapping
    pub schema: Schema,
    /// Behaviour when a transaction cannot be started
    pub begin_failure: BeginFailure,
    /// Include internal failure detail in 5xx reasons
    pub debug_errors: bool,
    /// Overrides of the default operation → roles table
    pub access: Vec<RoleRequirement>,
}

impl ServiceConfig {
    /// Reads a service configuration file.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] naming the file when it cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        load(path.as_ref())
    }

    /// Resolves the access table from the defaults and [`access`](Self::access).
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when an override lists no roles.
    pub fn access_table(&self) -> Result<AccessTable, Error> {
        AccessTable::resolve(&self.access)
    }
}

/// Settings of the account manager client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSettings {
    /// Scheme, host and port of the service, e.g. `https://localhost:8443`
    pub service_root: String,
    /// PEM bundle of trusted certificates
    pub trust_store: Option<PathBuf>,
    /// A single protocol to use without fallback
    pub protocol: Option<String>,
    /// Protocols to try in order when no explicit one is set
    pub preference: Vec<ProtocolVersion>,
    /// Trust the platform roots in addition to the trust store
    pub include_system_roots: bool,
    /// Legacy TLS 1.0 workaround
    pub legacy_tls10_compat: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            service_root: DEFAULT_SERVICE_ROOT.to_string(),
            trust_store: None,
            protocol: None,
            preference: DEFAULT_PREFERENCE.to_vec(),
            include_system_roots: false,
            legacy_tls10_compat: false,
        }
    }
}

impl ClientSettings {
    /// Reads a client settings file.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] naming the file when it cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        load(path.as_ref())
    }

    /// The protocol selection these settings describe.
    pub fn selection(&self) -> ProtocolSelection {
        match &self.protocol {
            Some(name) => ProtocolSelection::Explicit(name.clone()),
            None => ProtocolSelection::Preference(self.preference.clone()),
        }
    }

    /// Negotiator options.
    pub fn negotiator_config(&self) -> NegotiatorConfig {
        NegotiatorConfig {
            include_system_roots: self.include_system_roots,
            legacy_tls10_compat: self.legacy_tls10_compat,
        }
    }

    /// The configured trust store, if any.
    pub fn trust_store(&self) -> Option<TrustStore> {
        self.trust_store.as_ref().map(TrustStore::new)
    }
}
