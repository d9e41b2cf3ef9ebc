//! Account records and the registration payload.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::credential::DerivedCredential;
use crate::error::Error;
use crate::sanitizer::{
    AccountNameSanitizer, CredentialSanitizer, EmailSanitizer, MacAddressSanitizer, Sanitizer,
};
use crate::secret::{Passphrase, Secret};
use crate::{Tainted, Verified};

/// Media type of a customer fulfillment document.
///
/// A create request carrying this content type registers the user together
/// with the controllers they were sold.
pub const FULFILLMENT_CONTENT_TYPE: &str = "application/vnd.openremote.customer-fulfillment+json";

/// Persistence mapping in use by the deployment.
///
/// Both mappings hold the same user data; they differ in the entity the
/// rows are recorded under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Schema {
    /// The mapping shared with the original Beehive database.
    #[serde(rename = "legacy_beehive", alias = "LEGACY_BEEHIVE")]
    LegacyBeehive,
    /// The account manager's own mapping.
    #[default]
    #[serde(rename = "account_manager_2_0", alias = "ACCOUNT_MANAGER_2_0")]
    AccountManager20,
}

impl Schema {
    /// Entity that user rows are stored under.
    pub fn entity_name(&self) -> &'static str {
        match self {
            Schema::LegacyBeehive => "BeehiveUser",
            Schema::AccountManager20 => "User",
        }
    }

    /// Entity that controller rows are stored under.
    pub fn controller_entity_name(&self) -> &'static str {
        match self {
            Schema::LegacyBeehive => "BeehiveController",
            Schema::AccountManager20 => "RelationalController",
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::LegacyBeehive => f.write_str("LEGACY_BEEHIVE"),
            Schema::AccountManager20 => f.write_str("ACCOUNT_MANAGER_2_0"),
        }
    }
}

impl FromStr for Schema {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LEGACY_BEEHIVE" => Ok(Schema::LegacyBeehive),
            "ACCOUNT_MANAGER_2_0" => Ok(Schema::AccountManager20),
            _ => Err(Error::Configuration(format!("unknown service schema '{}'", s))),
        }
    }
}

/// The JSON body of a registration request.
///
/// Field values are untrusted until turned into a [`Registration`].
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RegistrationBody {
    /// Requested account name
    pub username: String,
    /// Contact address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Plaintext credentials
    pub credentials: String,
}

impl fmt::Debug for RegistrationBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationBody")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("credentials", &"[REDACTED]")
            .finish()
    }
}

impl RegistrationBody {
    /// Validates the body into a [`Registration`], consuming the plaintext.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when any field fails validation.
    pub fn into_registration(self) -> Result<Registration, Error> {
        let RegistrationBody {
            username,
            email,
            credentials,
        } = self;

        Registration::from_tainted(
            Tainted::new(username),
            email.filter(|e| !e.trim().is_empty()).map(Tainted::new),
            Tainted::new(Passphrase::from_string(credentials)),
        )
    }
}

/// A validated request to create a user account.
#[derive(Debug)]
pub struct Registration {
    username: Verified<String>,
    email: Option<Verified<String>>,
    credentials: Verified<Passphrase>,
}

impl Registration {
    /// Builds a registration from untrusted fields.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] with the first validation failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use account_core::{Passphrase, Registration, Tainted};
    ///
    /// let registration = Registration::from_tainted(
    ///     Tainted::new("johndoe".to_string()),
    ///     Some(Tainted::new("email@host.domain".to_string())),
    ///     Tainted::new(Passphrase::from_string("Smb9324$#@#@$".to_string())),
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(registration.username(), "johndoe");
    /// ```
    pub fn from_tainted(
        username: Tainted<String>,
        email: Option<Tainted<String>>,
        credentials: Tainted<Passphrase>,
    ) -> Result<Self, Error> {
        let username = AccountNameSanitizer::default().sanitize(username)?;
        let email = email.map(|e| EmailSanitizer.sanitize(e)).transpose()?;
        let credentials = CredentialSanitizer.sanitize(credentials)?;

        Ok(Self {
            username,
            email,
            credentials,
        })
    }

    /// Parses and validates a JSON registration document.
    ///
    /// The raw document is wiped when it goes out of scope here.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when the document is not a registration or
    /// one of its fields fails validation.
    pub fn from_json(document: Tainted<Secret<String>>) -> Result<Self, Error> {
        let body: RegistrationBody = parse_document(document).map_err(|_| {
            Error::InvalidArgument(
                "User registration JSON representation was not correctly deserialized.".into(),
            )
        })?;

        body.into_registration().map_err(incorrect_user_data)
    }

    /// The validated account name.
    pub fn username(&self) -> &str {
        self.username.as_ref()
    }

    /// The validated contact address, if given.
    pub fn email(&self) -> Option<&str> {
        self.email.as_ref().map(|e| e.as_ref().as_str())
    }

    /// The plaintext credentials. Dropped (and wiped) with the registration.
    pub fn credentials(&self) -> &Passphrase {
        self.credentials.as_ref()
    }
}

fn parse_document<T: DeserializeOwned>(
    document: Tainted<Secret<String>>,
) -> Result<T, serde_json::Error> {
    let raw = document.into_inner();
    serde_json::from_str(raw.expose_secret())
}

fn incorrect_user_data(error: Error) -> Error {
    match error {
        Error::InvalidArgument(msg) => Error::InvalidArgument(format!("Incorrect user data: {}", msg)),
        other => other,
    }
}

/// One controller entry of a fulfillment document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerBody {
    /// Network addresses identifying the controller
    #[serde(rename = "mac-addresses")]
    pub mac_addresses: Vec<String>,
}

/// The JSON body of a customer fulfillment: a registration plus the
/// controllers the customer received.
///
/// ```json
/// {
///   "username": "johndoe",
///   "email": "email@host.domain",
///   "credentials": "...",
///   "controllers": [ { "mac-addresses": ["FF:FF:FF:FF:FF:FF"] } ]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FulfillmentBody {
    /// The user part
    #[serde(flatten)]
    pub registration: RegistrationBody,
    /// Controllers to attach to the new account
    #[serde(default)]
    pub controllers: Vec<ControllerBody>,
}

/// A validated controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller {
    mac_addresses: BTreeSet<String>,
}

impl Controller {
    /// Builds a controller from untrusted addresses.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if no address is given or one is malformed.
    pub fn from_tainted(mac_addresses: Vec<Tainted<String>>) -> Result<Self, Error> {
        let mac_addresses = mac_addresses
            .into_iter()
            .map(|mac| MacAddressSanitizer.sanitize(mac).map(Verified::into_inner))
            .collect::<Result<BTreeSet<_>, _>>()?;

        if mac_addresses.is_empty() {
            return Err(Error::InvalidArgument(
                "controller must have at least one mac address".into(),
            ));
        }

        Ok(Self { mac_addresses })
    }

    /// Normalized addresses, sorted.
    pub fn mac_addresses(&self) -> &BTreeSet<String> {
        &self.mac_addresses
    }
}

/// A validated request to create a user account with controllers.
#[derive(Debug)]
pub struct Fulfillment {
    registration: Registration,
    controllers: Vec<Controller>,
}

impl Fulfillment {
    /// Validates a fulfillment body.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when a field fails validation or no
    /// controller is listed.
    pub fn from_body(body: FulfillmentBody) -> Result<Self, Error> {
        let FulfillmentBody {
            registration,
            controllers,
        } = body;

        let registration = registration.into_registration()?;

        if controllers.is_empty() {
            return Err(Error::InvalidArgument(
                "customer fulfillment must list at least one controller".into(),
            ));
        }

        let controllers = controllers
            .into_iter()
            .map(|c| Controller::from_tainted(c.mac_addresses.into_iter().map(Tainted::new).collect()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            registration,
            controllers,
        })
    }

    /// Parses and validates a JSON fulfillment document.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when the document cannot be parsed or
    /// fails validation.
    pub fn from_json(document: Tainted<Secret<String>>) -> Result<Self, Error> {
        let body: FulfillmentBody = parse_document(document).map_err(|e| {
            Error::InvalidArgument(format!(
                "Unable to parse customer fulfillment from JSON: line {} column {}",
                e.line(),
                e.column()
            ))
        })?;

        Self::from_body(body).map_err(incorrect_user_data)
    }

    /// The user part.
    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Controllers to attach, in document order.
    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }
}

/// A persisted user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    /// Row identifier of the owning account
    pub account_id: u64,
    /// Account name, unique per schema
    pub username: String,
    /// Contact address
    pub email: Option<String>,
    /// Stored form of the credentials
    pub credential: DerivedCredential,
    /// Mapping the row was written under
    pub schema: Schema,
}

/// A persisted controller, owned by an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredController {
    /// Owning account
    pub account_id: u64,
    /// Normalized addresses
    pub mac_addresses: BTreeSet<String>,
    /// Mapping the row was written under
    pub schema: Schema,
}
