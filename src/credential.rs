//! scrypt-based credential derivation.
//!
//! Passphrases are never stored. At registration the plaintext is run
//! through scrypt with fixed cost parameters and the resulting 127 bytes are
//! persisted in its place.
//!
//! The salt is the account name followed by [`SALT_PADDING`]. It is
//! deterministic, so the same `(passphrase, account)` pair always derives the
//! same credential, including after an account is deleted and re-created.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::error::Error;
use crate::secret::Passphrase;

/// log2 of the scrypt CPU/memory cost (N = 16384).
pub const LOG_N: u8 = 14;
/// scrypt block size.
pub const R: u32 = 8;
/// scrypt parallelism.
pub const P: u32 = 1;
/// Length of a derived credential in bytes.
pub const DERIVED_LEN: usize = 127;
/// Appended to the account name to form the salt.
pub const SALT_PADDING: &str = "::account-manager/credential-salt/v2";

/// Cost parameters a credential was derived with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CostParams {
    /// log2(N)
    pub log_n: u8,
    /// Block size
    pub r: u32,
    /// Parallelism
    pub p: u32,
    /// Output length in bytes
    pub len: usize,
}

impl CostParams {
    /// The fixed parameters used for every account.
    pub const STANDARD: CostParams = CostParams {
        log_n: LOG_N,
        r: R,
        p: P,
        len: DERIVED_LEN,
    };

    /// N, the iteration cost.
    pub fn n(&self) -> u64 {
        1u64 << self.log_n
    }
}

/// The stored form of a passphrase.
///
/// Immutable once computed. `Debug` prints the length only.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedCredential {
    bytes: Vec<u8>,
    params: CostParams,
    salt: Vec<u8>,
}

impl DerivedCredential {
    /// The derived bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Parameters used for the derivation.
    pub fn params(&self) -> CostParams {
        self.params
    }

    /// The salt used for the derivation.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Checks a candidate passphrase against this credential.
    ///
    /// The comparison of derived bytes runs in constant time.
    ///
    /// # Errors
    ///
    /// Same as [`CredentialDeriver::derive`].
    pub fn matches(&self, passphrase: &Passphrase, account: &str) -> Result<bool, Error> {
        let candidate = CredentialDeriver.derive_with(passphrase, account, self.params)?;
        Ok(self.bytes.as_slice().ct_eq(candidate.bytes.as_slice()).into())
    }
}

impl fmt::Debug for DerivedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedCredential")
            .field("len", &self.bytes.len())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Derives stored credentials from passphrases.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialDeriver;

impl CredentialDeriver {
    /// Derives the credential for `account` using [`CostParams::STANDARD`].
    ///
    /// Blocks the calling thread for the duration of the scrypt computation.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the passphrase or account name is empty
    ///
    /// # Examples
    ///
    /// ```
    /// use account_core::{CredentialDeriver, Passphrase};
    ///
    /// let pass = Passphrase::from_string("Smb9324$#@#@$".to_string());
    /// let first = CredentialDeriver.derive(&pass, "johndoe").unwrap();
    /// let second = CredentialDeriver.derive(&pass, "johndoe").unwrap();
    ///
    /// assert_eq!(first.bytes().len(), 127);
    /// assert_eq!(first, second);
    /// ```
    pub fn derive(&self, passphrase: &Passphrase, account: &str) -> Result<DerivedCredential, Error> {
        self.derive_with(passphrase, account, CostParams::STANDARD)
    }

    fn derive_with(
        &self,
        passphrase: &Passphrase,
        account: &str,
        params: CostParams,
    ) -> Result<DerivedCredential, Error> {
        if passphrase.is_empty() {
            return Err(Error::InvalidArgument("credentials must not be empty".into()));
        }
        if account.is_empty() {
            return Err(Error::InvalidArgument("account name must not be empty".into()));
        }

        let salt = salt_for(account);
        // scrypt::Params only records `len` for PHC strings; the raw output
        // length is taken from the buffer.
        let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, scrypt::Params::RECOMMENDED_LEN)
            .map_err(|e| Error::Configuration(format!("invalid scrypt parameters: {}", e)))?;

        let started = Instant::now();
        let mut bytes = vec![0u8; params.len];
        scrypt::scrypt(passphrase.expose_secret(), &salt, &scrypt_params, &mut bytes)
            .map_err(|e| Error::Configuration(format!("invalid scrypt output length: {}", e)))?;

        tracing::debug!(
            account = %account,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Derived credential"
        );

        Ok(DerivedCredential { bytes, params, salt })
    }
}

/// Builds the deterministic salt for an account.
pub fn salt_for(account: &str) -> Vec<u8> {
    let mut salt = Vec::with_capacity(account.len() + SALT_PADDING.len());
    salt.extend_from_slice(account.as_bytes());
    salt.extend_from_slice(SALT_PADDING.as_bytes());
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(s: &str) -> Passphrase {
        Passphrase::from_string(s.to_string())
    }

    #[test]
    fn derivation_uses_fixed_parameters() {
        let cred = CredentialDeriver.derive(&pass("Smb9324$#@#@$"), "johndoe").unwrap();

        assert_eq!(cred.bytes().len(), DERIVED_LEN);
        assert_eq!(cred.params(), CostParams::STANDARD);
        assert_eq!(cred.params().n(), 16384);
        assert_eq!(cred.salt(), b"johndoe::account-manager/credential-salt/v2");
    }

    #[test]
    fn same_pair_derives_same_credential() {
        let a = CredentialDeriver.derive(&pass("secret"), "alice").unwrap();
        let b = CredentialDeriver.derive(&pass("secret"), "alice").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn account_name_changes_the_credential() {
        let a = CredentialDeriver.derive(&pass("secret"), "alice").unwrap();
        let b = CredentialDeriver.derive(&pass("secret"), "bob").unwrap();
        assert_ne!(a.bytes(), b.bytes());
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(matches!(
            CredentialDeriver.derive(&Passphrase::new(Vec::new()), "alice"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            CredentialDeriver.derive(&pass("secret"), ""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn matches_checks_passphrase() {
        let cred = CredentialDeriver.derive(&pass("secret"), "alice").unwrap();

        assert!(cred.matches(&pass("secret"), "alice").unwrap());
        assert!(!cred.matches(&pass("Secret"), "alice").unwrap());
        assert!(!cred.matches(&pass("secret"), "mallory").unwrap());
    }

    #[test]
    fn debug_does_not_print_bytes() {
        let cred = CredentialDeriver.derive(&pass("secret"), "alice").unwrap();
        let out = format!("{:?}", cred);
        assert!(out.contains("len: 127"));
        assert!(!out.contains("bytes"));
    }
}
