use std::fmt;

use zeroize::Zeroize;

/// A wrapper that keeps credential material out of logs and wipes it on drop.
///
/// Passphrases travel through the account manager only as `Secret<Vec<u8>>`
/// (see [`Passphrase`]). The plaintext is reachable solely through
/// [`expose_secret`](Self::expose_secret), and the backing memory is zeroized
/// as soon as the wrapper goes out of scope, so a passphrase never outlives
/// the derivation that consumed it.
///
/// # Security Properties
///
/// - Does NOT implement `Deref`, `AsRef`, `Borrow`, `Clone`, or `Copy`
/// - Debug and Display output is always `[REDACTED]`
/// - Memory is overwritten with zeroes when dropped
///
/// # Examples
///
/// ```
/// use account_core::Secret;
///
/// let passphrase = Secret::new(b"Smb9324$#@#@$".to_vec());
///
/// assert_eq!(format!("{:?}", passphrase), "[REDACTED]");
/// assert_eq!(passphrase.expose_secret().len(), 13);
/// ```
// BREAKING CHANGE WARNING: Do NOT add Clone, Copy, or Default derives.
// A cloned passphrase would escape the zeroize-on-drop guarantee.
pub struct Secret<T: Zeroize> {
    // BREAKING CHANGE WARNING: This field MUST remain private (CWE-532).
    inner: T,
}

/// Plaintext credential bytes as received from a registration or a client.
pub type Passphrase = Secret<Vec<u8>>;

impl<T: Zeroize> Secret<T> {
    /// Wraps a sensitive value in a `Secret`.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the secret value.
    ///
    /// # Security Warning
    ///
    /// The name is verbose on purpose. Never pass the returned reference to a
    /// logger, an error message or a response body.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl Passphrase {
    /// Builds a passphrase from UTF-8 text, wiping the source string.
    pub fn from_string(mut value: String) -> Self {
        let bytes = value.as_bytes().to_vec();
        value.zeroize();
        Self::new(bytes)
    }

    /// Returns true when the passphrase holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    /// BREAKING CHANGE WARNING: This MUST unconditionally return "[REDACTED]".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    /// BREAKING CHANGE WARNING: This MUST unconditionally return "[REDACTED]".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
