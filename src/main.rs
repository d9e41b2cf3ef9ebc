use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use account_core::keys::{self, DEFAULT_ALIAS, TRUST_STORE_FILENAME};
use account_core::{AccountManagerClient, ClientResponse, ClientSettings, Passphrase, RegistrationBody};

const TEST_USER: &str = "johndoe";
const TEST_EMAIL: &str = "email@host.domain";
const TEST_CREDENTIALS: &str = "Smb9324$#@#@$";

#[derive(Parser)]
#[command(name = "account-tool", version, about = "Account manager deployment tooling")]
struct ToolCli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a server key, its self-signed certificate and a client trust store
    GenerateKeys {
        /// Name of the server key
        #[arg(long, default_value = DEFAULT_ALIAS)]
        alias: String,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Host names the certificate is valid for
        #[arg(long = "host", default_value = "localhost")]
        hosts: Vec<String>,
    },
    /// Create, retrieve and delete a test account against a deployed service
    DeploymentTest {
        /// Service root, e.g. https://localhost:8443
        url: String,
        /// Service admin credentials as <username:password>
        credentials: String,
        /// PEM trust store; defaults to ~/client.truststore.pem
        #[arg(long)]
        trust_store: Option<PathBuf>,
        /// Use exactly this TLS protocol instead of the preference list
        #[arg(long)]
        protocol: Option<String>,
    },
}

fn init_logging() {
    let fmt_layer = fmt::layer().with_target(false);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn generate_keys(alias: &str, out: &Path, hosts: &[String]) -> Result<()> {
    let material = keys::generate(alias, hosts)?;
    let written = keys::write_keys(&material, alias, out)?;

    info!(
        alias = %alias,
        private_key = %written.private_key.display(),
        certificate = %written.certificate.display(),
        trust_store = %written.trust_store.display(),
        "Generated server key"
    );
    Ok(())
}

fn split_credentials(raw: &str) -> Result<(String, Passphrase)> {
    let (user, password) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("Unable to parse <username:password> from the credentials argument"))?;
    if user.is_empty() {
        bail!("Unable to parse <username:password>: empty username");
    }
    Ok((user.to_string(), Passphrase::from_string(password.to_string())))
}

fn default_trust_store() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME is not set; pass --trust-store")?;
    Ok(PathBuf::from(home).join(TRUST_STORE_FILENAME))
}

fn report(step: &str, response: &ClientResponse) {
    info!(
        step,
        status = response.status.as_u16(),
        "{}: {}",
        response.status.as_u16(),
        response.status.canonical_reason().unwrap_or_default()
    );
    if !response.body.is_empty() {
        info!(step, body = %response.body, "Response body");
    }
}

fn deployment_test(
    url: String,
    credentials: &str,
    trust_store: Option<PathBuf>,
    protocol: Option<String>,
) -> Result<()> {
    let (admin, password) = split_credentials(credentials)?;

    let settings = ClientSettings {
        service_root: url,
        trust_store: Some(match trust_store {
            Some(path) => path,
            None => default_trust_store()?,
        }),
        protocol,
        ..ClientSettings::default()
    };

    let client = AccountManagerClient::new(&settings, &admin, password)
        .context("initializing account manager client")?;

    info!(
        service_root = %settings.service_root,
        admin = %admin,
        protocol = %client.protocol(),
        "Executing deployment test"
    );

    info!(user = TEST_USER, "Creating new user account");
    let response = client.create(&RegistrationBody {
        username: TEST_USER.to_string(),
        email: Some(TEST_EMAIL.to_string()),
        credentials: TEST_CREDENTIALS.to_string(),
    })?;
    report("create", &response);

    info!(user = TEST_USER, "Retrieving account info");
    let response = client.retrieve_account_info(TEST_USER)?;
    report("retrieve", &response);

    info!(user = TEST_USER, "Deleting user account");
    let response = client.delete(TEST_USER)?;
    report("delete", &response);

    Ok(())
}

fn main() -> Result<()> {
    init_logging();

    match ToolCli::parse().command {
        Commands::GenerateKeys { alias, out, hosts } => generate_keys(&alias, &out, &hosts),
        Commands::DeploymentTest {
            url,
            credentials,
            trust_store,
            protocol,
        } => deployment_test(url, &credentials, trust_store, protocol),
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use http::StatusCode;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured(f: impl FnOnce()) -> String {
        let sink = Captured::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let out = String::from_utf8_lossy(&sink.0.lock()).into_owned();
        out
    }

    #[test]
    fn status_is_reported_through_the_log() {
        let logs = captured(|| {
            report(
                "retrieve",
                &ClientResponse {
                    status: StatusCode::OK,
                    body: "[SEC: admin] Retrieve accounts for User johndoe".to_string(),
                },
            )
        });

        assert!(logs.contains("INFO"), "{}", logs);
        assert!(logs.contains("200: OK"));
        assert!(logs.contains("step=\"retrieve\""));
        assert!(logs.contains("[SEC: admin] Retrieve accounts for User johndoe"));
    }

    #[test]
    fn empty_body_is_not_reported() {
        let logs = captured(|| {
            report(
                "delete",
                &ClientResponse {
                    status: StatusCode::NO_CONTENT,
                    body: String::new(),
                },
            )
        });

        assert!(logs.contains("204: No Content"));
        assert!(!logs.contains("Response body"));
    }

    #[test]
    fn credentials_argument_splits_at_first_colon() {
        let (user, password) = split_credentials("admin:pa:ss").unwrap();
        assert_eq!(user, "admin");
        assert_eq!(password.expose_secret(), b"pa:ss");

        assert!(split_credentials("no-colon").is_err());
        assert!(split_credentials(":password").is_err());
    }
}
