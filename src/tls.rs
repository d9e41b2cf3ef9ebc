//! Client-side TLS protocol negotiation.
//!
//! The negotiator walks an ordered list of protocol versions and asks a
//! [`ContextFactory`] to build a client context for each until one succeeds.
//! A candidate the runtime cannot provide is logged at debug level and
//! skipped. When the caller names a single protocol explicitly there is no
//! fallback: the first failure is final.
//!
//! Trust anchors come from an optional PEM bundle ([`TrustStore`]) and, when
//! no bundle is configured or when asked to, from the platform's native root
//! store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Transport security protocol versions, by standard name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// TLS 1.0
    #[serde(rename = "TLSv1")]
    Tls10,
    /// TLS 1.1
    #[serde(rename = "TLSv1.1")]
    Tls11,
    /// TLS 1.2
    #[serde(rename = "TLSv1.2")]
    Tls12,
    /// TLS 1.3
    #[serde(rename = "TLSv1.3")]
    Tls13,
}

/// Preference order used when none is configured, highest first.
pub const DEFAULT_PREFERENCE: [ProtocolVersion; 4] = [
    ProtocolVersion::Tls13,
    ProtocolVersion::Tls12,
    ProtocolVersion::Tls11,
    ProtocolVersion::Tls10,
];

impl ProtocolVersion {
    /// Standard protocol name (`TLSv1`, `TLSv1.1`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolVersion::Tls10 => "TLSv1",
            ProtocolVersion::Tls11 => "TLSv1.1",
            ProtocolVersion::Tls12 => "TLSv1.2",
            ProtocolVersion::Tls13 => "TLSv1.3",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProtocolVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TLSv1" | "TLSv1.0" => Ok(ProtocolVersion::Tls10),
            "TLSv1.1" => Ok(ProtocolVersion::Tls11),
            "TLSv1.2" => Ok(ProtocolVersion::Tls12),
            "TLSv1.3" => Ok(ProtocolVersion::Tls13),
            other => Err(Error::Configuration(format!(
                "unknown TLS protocol '{}'",
                other
            ))),
        }
    }
}

/// Which protocols the negotiator may try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolSelection {
    /// Try each version in order, falling back on unsupported ones.
    Preference(Vec<ProtocolVersion>),
    /// Try only the named protocol; any failure is final.
    Explicit(String),
}

impl Default for ProtocolSelection {
    fn default() -> Self {
        ProtocolSelection::Preference(DEFAULT_PREFERENCE.to_vec())
    }
}

/// Why a factory could not produce a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// The runtime does not implement this protocol. The negotiator may
    /// fall back to the next candidate.
    Unsupported(String),
    /// Anything else. Always fatal.
    Failed(String),
}

impl fmt::Display for FactoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactoryError::Unsupported(msg) => write!(f, "unsupported: {}", msg),
            FactoryError::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

/// Per-candidate options handed to the factory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateOptions {
    /// Legacy TLS 1.0 negotiation workaround. Only ever set for the
    /// [`ProtocolVersion::Tls10`] candidate, and only when enabled in
    /// [`NegotiatorConfig`].
    pub legacy_tls10_compat: bool,
    /// The protocol was named explicitly. The context must not accept any
    /// other version.
    pub explicit: bool,
}

/// Builds a client transport context for one protocol version.
///
/// Implementations must be usable from several threads at once.
pub trait ContextFactory: Send + Sync {
    /// The context type produced, e.g. a rustls `ClientConfig`.
    type Context;

    /// Instantiates a context for `protocol` trusting `anchors`.
    ///
    /// # Errors
    ///
    /// [`FactoryError::Unsupported`] when the runtime lacks the protocol,
    /// [`FactoryError::Failed`] for any other failure.
    fn create(
        &self,
        protocol: ProtocolVersion,
        anchors: &TrustAnchors,
        options: CandidateOptions,
    ) -> Result<Self::Context, FactoryError>;
}

/// A PEM certificate bundle on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStore {
    location: PathBuf,
}

impl TrustStore {
    /// Refers to the bundle at `location`. Nothing is read until [`load`](Self::load).
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Where the bundle lives.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Reads and parses every certificate in the bundle.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] naming the location when the file is missing,
    /// unreadable, not PEM, or holds no certificate.
    pub fn load(&self) -> Result<Vec<CertificateDer<'static>>, Error> {
        let bytes = std::fs::read(&self.location).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Configuration(format!(
                    "Configured trusted certificate store was not found at '{}'",
                    self.location.display()
                ))
            } else {
                Error::Configuration(format!(
                    "Cannot read trusted certificate store at '{}': {}",
                    self.location.display(),
                    e
                ))
            }
        })?;

        let certs = CertificateDer::pem_slice_iter(&bytes)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                Error::Configuration(format!(
                    "Cannot parse trusted certificate store at '{}': {}",
                    self.location.display(),
                    e
                ))
            })?;

        if certs.is_empty() {
            return Err(Error::Configuration(format!(
                "Trusted certificate store at '{}' contains no certificates",
                self.location.display()
            )));
        }

        Ok(certs)
    }
}

/// The resolved set of certificates a client will trust.
#[derive(Debug, Clone)]
pub struct TrustAnchors {
    roots: Arc<RootCertStore>,
    from_store: usize,
}

impl TrustAnchors {
    /// The root store to hand to a TLS client.
    pub fn roots(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.roots)
    }

    /// Number of anchors loaded from the configured trust store.
    pub fn from_store(&self) -> usize {
        self.from_store
    }

    /// Total number of anchors.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// True when nothing is trusted.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Negotiator settings fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiatorConfig {
    /// Also trust the platform roots when a trust store is configured.
    pub include_system_roots: bool,
    /// Pass the legacy TLS 1.0 workaround to the factory for the TLS 1.0
    /// candidate. Has no effect with [`RustlsContextFactory`].
    pub legacy_tls10_compat: bool,
}

/// The outcome of a successful negotiation.
#[derive(Debug, Clone)]
pub struct TransportContext<C> {
    protocol: ProtocolVersion,
    trust_anchors: usize,
    context: C,
}

impl<C> TransportContext<C> {
    /// The protocol the context was built for.
    ///
    /// This is the highest version the context offers. A TLS 1.3 context
    /// from a preference list may still settle on TLS 1.2 with an older
    /// server; one from an explicit selection may not.
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Number of anchors taken from the configured trust store.
    pub fn trust_anchors(&self) -> usize {
        self.trust_anchors
    }

    /// Borrows the runtime context.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Takes the runtime context.
    pub fn into_context(self) -> C {
        self.context
    }
}

/// Walks a protocol preference list against a [`ContextFactory`].
///
/// # Examples
///
/// ```no_run
/// use account_core::{Negotiator, NegotiatorConfig, ProtocolSelection, RustlsContextFactory};
///
/// let negotiator = Negotiator::new(RustlsContextFactory::default(), NegotiatorConfig::default());
/// let transport = negotiator.negotiate(&ProtocolSelection::default(), None).unwrap();
///
/// assert_eq!(transport.protocol().name(), "TLSv1.3");
/// ```
#[derive(Debug, Clone)]
pub struct Negotiator<F> {
    factory: F,
    config: NegotiatorConfig,
}

impl<F: ContextFactory> Negotiator<F> {
    /// Creates a negotiator over `factory`.
    pub fn new(factory: F, config: NegotiatorConfig) -> Self {
        Self { factory, config }
    }

    /// Establishes a client context.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when the trust store cannot be loaded, when
    /// every candidate is unsupported, when an explicit protocol fails, or
    /// when the factory reports a non-recoverable failure.
    pub fn negotiate(
        &self,
        selection: &ProtocolSelection,
        trust_store: Option<&TrustStore>,
    ) -> Result<TransportContext<F::Context>, Error> {
        let anchors = self.trust_anchors(trust_store)?;

        match selection {
            ProtocolSelection::Explicit(name) => {
                let protocol: ProtocolVersion = name.parse()?;
                let context = self
                    .factory
                    .create(protocol, &anchors, self.options_for(protocol, true))
                    .map_err(|e| {
                        Error::Configuration(format!(
                            "requested TLS protocol '{}' is not available: {}",
                            name, e
                        ))
                    })?;
                Ok(self.bind(protocol, &anchors, context))
            }
            ProtocolSelection::Preference(candidates) => {
                for &protocol in candidates {
                    match self.factory.create(protocol, &anchors, self.options_for(protocol, false)) {
                        Ok(context) => return Ok(self.bind(protocol, &anchors, context)),
                        Err(FactoryError::Unsupported(reason)) => {
                            tracing::debug!(
                                protocol = %protocol,
                                "TLS protocol not supported by this runtime, falling back: {}",
                                reason
                            );
                        }
                        Err(FactoryError::Failed(reason)) => {
                            return Err(Error::Configuration(format!(
                                "cannot initialise {} context: {}",
                                protocol, reason
                            )));
                        }
                    }
                }
                Err(Error::Configuration(
                    "no supported TLS protocol available".to_string(),
                ))
            }
        }
    }

    fn options_for(&self, protocol: ProtocolVersion, explicit: bool) -> CandidateOptions {
        CandidateOptions {
            legacy_tls10_compat: self.config.legacy_tls10_compat
                && protocol == ProtocolVersion::Tls10,
            explicit,
        }
    }

    fn bind(
        &self,
        protocol: ProtocolVersion,
        anchors: &TrustAnchors,
        context: F::Context,
    ) -> TransportContext<F::Context> {
        tracing::debug!(protocol = %protocol, anchors = anchors.len(), "Negotiated TLS context");
        TransportContext {
            protocol,
            trust_anchors: anchors.from_store(),
            context,
        }
    }

    fn trust_anchors(&self, trust_store: Option<&TrustStore>) -> Result<TrustAnchors, Error> {
        let mut roots = RootCertStore::empty();
        let mut from_store = 0;

        if let Some(store) = trust_store {
            for cert in store.load()? {
                roots.add(cert).map_err(|e| {
                    Error::Configuration(format!(
                        "Invalid certificate in trusted certificate store at '{}': {}",
                        store.location().display(),
                        e
                    ))
                })?;
                from_store += 1;
            }
        }

        if trust_store.is_none() || self.config.include_system_roots {
            let native = rustls_native_certs::load_native_certs();
            for err in &native.errors {
                tracing::warn!("Skipping unreadable system certificate: {}", err);
            }
            let (added, ignored) = roots.add_parsable_certificates(native.certs);
            tracing::debug!(added, ignored, "Loaded system trust anchors");
        }

        Ok(TrustAnchors {
            roots: Arc::new(roots),
            from_store,
        })
    }
}

/// Production [`ContextFactory`] backed by rustls with the `ring` provider.
///
/// rustls implements TLS 1.2 and 1.3 only. A TLS 1.3 candidate from a
/// preference list also accepts TLS 1.2 servers; an explicit TLS 1.3 and
/// any TLS 1.2 context are pinned to that one version.
#[derive(Debug, Clone)]
pub struct RustlsContextFactory {
    provider: Arc<CryptoProvider>,
}

impl Default for RustlsContextFactory {
    fn default() -> Self {
        Self {
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }
}

impl RustlsContextFactory {
    /// The rustls versions a context for `protocol` will accept.
    fn enabled_versions(
        protocol: ProtocolVersion,
        options: CandidateOptions,
    ) -> Result<Vec<&'static rustls::SupportedProtocolVersion>, FactoryError> {
        match protocol {
            ProtocolVersion::Tls13 if options.explicit => Ok(vec![&rustls::version::TLS13]),
            ProtocolVersion::Tls13 => Ok(vec![&rustls::version::TLS13, &rustls::version::TLS12]),
            ProtocolVersion::Tls12 => Ok(vec![&rustls::version::TLS12]),
            ProtocolVersion::Tls10 | ProtocolVersion::Tls11 => Err(FactoryError::Unsupported(
                format!("{} is not implemented by rustls", protocol),
            )),
        }
    }
}

impl ContextFactory for RustlsContextFactory {
    type Context = Arc<ClientConfig>;

    fn create(
        &self,
        protocol: ProtocolVersion,
        anchors: &TrustAnchors,
        options: CandidateOptions,
    ) -> Result<Self::Context, FactoryError> {
        let versions = Self::enabled_versions(protocol, options)?;

        let config = ClientConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_protocol_versions(&versions)
            .map_err(|e| FactoryError::Unsupported(e.to_string()))?
            .with_root_certificates(anchors.roots())
            .with_no_client_auth();

        Ok(Arc::new(config))
    }
}
