//! Blocking HTTPS client for the account manager REST interface.
//!
//! The transport is negotiated once per client through [`Negotiator`] and
//! handed to `reqwest` as a preconfigured rustls configuration. Every
//! request carries HTTP Basic credentials, borrowed from the client's
//! [`Passphrase`] for the duration of the header encoding.

use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use rustls::ClientConfig;

use crate::account::{FulfillmentBody, RegistrationBody, FULFILLMENT_CONTENT_TYPE};
use crate::config::ClientSettings;
use crate::error::Error;
use crate::secret::Passphrase;
use crate::tls::{Negotiator, ProtocolVersion, RustlsContextFactory, TransportContext};

/// Path of the service below the service root, including the API version.
pub const SERVICE_PATH: &str = "rest/rpc/accountmanager/2/0/0/";

/// A status line and body returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResponse {
    /// Response status
    pub status: StatusCode,
    /// Response body as text; empty for 204
    pub body: String,
}

/// Client for one service endpoint, acting as one user.
///
/// # Examples
///
/// ```no_run
/// use account_core::{AccountManagerClient, ClientSettings, Passphrase, RegistrationBody};
///
/// let settings = ClientSettings::from_file("client.json").unwrap();
/// let client = AccountManagerClient::new(
///     &settings,
///     "admin",
///     Passphrase::from_string("admin-password".to_string()),
/// )
/// .unwrap();
///
/// let response = client
///     .create(&RegistrationBody {
///         username: "johndoe".to_string(),
///         email: Some("email@host.domain".to_string()),
///         credentials: "Smb9324$#@#@$".to_string(),
///     })
///     .unwrap();
/// tracing::info!(status = %response.status, "Created johndoe");
/// ```
#[derive(Debug)]
pub struct AccountManagerClient {
    http: Client,
    base: Url,
    protocol: ProtocolVersion,
    username: String,
    credentials: Passphrase,
}

impl AccountManagerClient {
    /// Negotiates a transport from `settings` and builds the client.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the service root is not a URL, the trust
    /// store cannot be loaded or no TLS protocol can be negotiated.
    pub fn new(
        settings: &ClientSettings,
        username: impl Into<String>,
        credentials: Passphrase,
    ) -> Result<Self, Error> {
        let negotiator = Negotiator::new(RustlsContextFactory::default(), settings.negotiator_config());
        let trust_store = settings.trust_store();
        let transport = negotiator.negotiate(&settings.selection(), trust_store.as_ref())?;

        tracing::debug!(
            protocol = %transport.protocol(),
            trust_anchors = transport.trust_anchors(),
            "Negotiated client transport"
        );

        Self::with_transport(&settings.service_root, transport, username, credentials)
    }

    /// Builds the client over an already negotiated transport.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the service root is not a URL or the HTTP
    /// client cannot be built. [`Error::InvalidArgument`] if the credentials
    /// are not UTF-8.
    pub fn with_transport(
        service_root: &str,
        transport: TransportContext<Arc<ClientConfig>>,
        username: impl Into<String>,
        credentials: Passphrase,
    ) -> Result<Self, Error> {
        password(&credentials)?;
        let base = service_url(service_root)?;
        let protocol = transport.protocol();
        let tls = Arc::unwrap_or_clone(transport.into_context());

        let http = Client::builder()
            .use_preconfigured_tls(tls)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to initialize HTTPS client: {}", e)))?;

        Ok(Self {
            http,
            base,
            protocol,
            username: username.into(),
            credentials,
        })
    }

    /// The service base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// The negotiated protocol.
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// `POST users` with a JSON registration document.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the request could not be completed.
    pub fn create(&self, registration: &RegistrationBody) -> Result<ClientResponse, Error> {
        let url = self.target(&["users"])?;
        self.send(self.http.post(url).json(registration))
    }

    /// `POST users` with a customer fulfillment document, which also
    /// attaches the listed controllers to the new account.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the document cannot be serialized,
    /// [`Error::Transport`] if the request could not be completed.
    pub fn create_fulfillment(&self, fulfillment: &FulfillmentBody) -> Result<ClientResponse, Error> {
        self.send(self.fulfillment_request(fulfillment)?)
    }

    fn fulfillment_request(&self, fulfillment: &FulfillmentBody) -> Result<RequestBuilder, Error> {
        let url = self.target(&["users"])?;
        let document = serde_json::to_vec(fulfillment)
            .map_err(|e| Error::InvalidArgument(format!("unserializable customer fulfillment: {}", e)))?;

        Ok(self
            .http
            .post(url)
            .header(CONTENT_TYPE, FULFILLMENT_CONTENT_TYPE)
            .body(document))
    }

    /// `GET users/{username}/accounts`.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the request could not be completed.
    pub fn retrieve_account_info(&self, username: &str) -> Result<ClientResponse, Error> {
        let url = self.target(&["users", username, "accounts"])?;
        self.send(self.http.get(url))
    }

    /// `DELETE users/{username}`.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the request could not be completed.
    pub fn delete(&self, username: &str) -> Result<ClientResponse, Error> {
        let url = self.target(&["users", username])?;
        self.send(self.http.delete(url))
    }

    fn target(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Configuration(format!("'{}' cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, Error> {
        Ok(request.basic_auth(&self.username, Some(password(&self.credentials)?)))
    }

    fn send(&self, request: RequestBuilder) -> Result<ClientResponse, Error> {
        let response = self
            .authorize(request)?
            .send()
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| Error::Transport(format!("unreadable response body: {}", e)))?;

        Ok(ClientResponse { status, body })
    }
}

fn password(credentials: &Passphrase) -> Result<&str, Error> {
    std::str::from_utf8(credentials.expose_secret())
        .map_err(|_| Error::InvalidArgument("credentials must be valid UTF-8".into()))
}

fn service_url(service_root: &str) -> Result<Url, Error> {
    let mut root = Url::parse(service_root)
        .map_err(|e| Error::Configuration(format!("invalid service root '{}': {}", service_root, e)))?;
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    root.join(SERVICE_PATH)
        .map_err(|e| Error::Configuration(format!("invalid service root '{}': {}", service_root, e)))
}
