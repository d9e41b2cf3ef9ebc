//! Server key and client trust store generation.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rcgen::{CertificateParams, DnType, KeyPair};

use crate::error::Error;
use crate::secret::Secret;

/// Alias used for the server key when none is given.
pub const DEFAULT_ALIAS: &str = "tomcat";

/// File name of the client trust store.
pub const TRUST_STORE_FILENAME: &str = "client.truststore.pem";

/// A freshly generated self-signed server certificate and its key.
#[derive(Debug)]
pub struct KeyMaterial {
    /// Certificate, PEM encoded
    pub certificate_pem: String,
    /// PKCS#8 private key, PEM encoded
    pub private_key_pem: Secret<String>,
}

/// Where [`write_keys`] put its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenKeys {
    /// `<alias>-private.key.pem`
    pub private_key: PathBuf,
    /// `<alias>.cert.pem`
    pub certificate: PathBuf,
    /// [`TRUST_STORE_FILENAME`]
    pub trust_store: PathBuf,
}

/// Generates a self-signed certificate for `alias`, valid for `hosts`.
///
/// # Errors
///
/// [`Error::Configuration`] if a host name is invalid or key generation fails.
pub fn generate(alias: &str, hosts: &[String]) -> Result<KeyMaterial, Error> {
    let mut params = CertificateParams::new(hosts.to_vec())
        .map_err(|e| Error::Configuration(format!("invalid certificate host names: {}", e)))?;
    params.distinguished_name.push(DnType::CommonName, alias);

    let key_pair = KeyPair::generate()
        .map_err(|e| Error::Configuration(format!("key generation failed: {}", e)))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| Error::Configuration(format!("certificate signing failed: {}", e)))?;

    Ok(KeyMaterial {
        certificate_pem: cert.pem(),
        private_key_pem: Secret::new(key_pair.serialize_pem()),
    })
}

/// Writes the key, the certificate and a trust store holding the
/// certificate into `out_dir`. The key file is owner-readable only on Unix.
///
/// # Errors
///
/// [`Error::Configuration`] naming the file that could not be written.
pub fn write_keys(material: &KeyMaterial, alias: &str, out_dir: &Path) -> Result<WrittenKeys, Error> {
    fs::create_dir_all(out_dir)
        .map_err(|e| Error::Configuration(format!("Cannot create '{}': {}", out_dir.display(), e)))?;

    let written = WrittenKeys {
        private_key: out_dir.join(format!("{}-private.key.pem", alias)),
        certificate: out_dir.join(format!("{}.cert.pem", alias)),
        trust_store: out_dir.join(TRUST_STORE_FILENAME),
    };

    write_file(&written.private_key, material.private_key_pem.expose_secret(), true)?;
    write_file(&written.certificate, &material.certificate_pem, false)?;
    write_file(&written.trust_store, &material.certificate_pem, false)?;

    Ok(written)
}

fn write_file(path: &Path, content: &str, private: bool) -> Result<(), Error> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if private {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    options
        .open(path)
        .and_then(|mut file| file.write_all(content.as_bytes()))
        .map_err(|e| Error::Configuration(format!("Cannot write '{}': {}", path.display(), e)))
}
