use std::fmt;

use crate::error::Error;
use crate::secret::Passphrase;
use crate::{Tainted, Verified};

/// Longest account name accepted at registration.
pub const MAX_ACCOUNT_NAME_LEN: usize = 255;

/// Longest e-mail address accepted at registration (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 254;

/// Error returned when sanitization fails.
///
/// The message names the violated constraint, never the rejected input.
///
/// # Examples
///
/// ```
/// use account_core::{SanitizationError, SanitizationErrorKind};
///
/// let error = SanitizationError::new(SanitizationErrorKind::TooLong, "username exceeds 255 characters");
/// assert_eq!(error.kind(), SanitizationErrorKind::TooLong);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationError {
    kind: SanitizationErrorKind,
    message: String,
}

impl SanitizationError {
    /// Creates a new sanitization error.
    pub fn new(kind: SanitizationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> SanitizationErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SanitizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sanitization failed ({}): {}", self.kind, self.message)
    }
}

impl std::error::Error for SanitizationError {}

impl From<SanitizationError> for Error {
    fn from(err: SanitizationError) -> Self {
        Error::InvalidArgument(err.message)
    }
}

/// Kind of sanitization error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizationErrorKind {
    /// Input format is malformed.
    MalformedInput,
    /// Input is empty or contains only whitespace.
    Empty,
    /// Input exceeds maximum allowed length.
    TooLong,
    /// Input contains control or non-printable characters.
    ContainsControlChars,
}

impl fmt::Display for SanitizationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedInput => write!(f, "malformed input"),
            Self::Empty => write!(f, "empty input"),
            Self::TooLong => write!(f, "input too long"),
            Self::ContainsControlChars => write!(f, "contains control characters"),
        }
    }
}

/// Trait for sanitizing tainted values into verified values.
///
/// # Invariants
///
/// Implementations MUST:
/// - Only call `Verified::new_unchecked` after validation succeeds
/// - Not leak the rejected input in errors
pub trait Sanitizer<T> {
    /// Sanitizes a tainted value, returning a verified value on success.
    ///
    /// # Errors
    ///
    /// Returns `SanitizationError` if the input fails validation.
    fn sanitize(&self, input: Tainted<T>) -> Result<Verified<T>, SanitizationError>;
}

fn has_control_chars(s: &str) -> bool {
    s.chars().any(|c| c.is_control())
}

/// Validates account identifiers.
///
/// Trims surrounding whitespace, then requires a non-empty, printable name of
/// at most `max_len` characters. The result is safe to use as a store key, a
/// URL path segment and a log field.
///
/// # Examples
///
/// ```
/// use account_core::{AccountNameSanitizer, Sanitizer, Tainted};
///
/// let sanitizer = AccountNameSanitizer::default();
/// let verified = sanitizer.sanitize(Tainted::new("  johndoe ".to_string())).unwrap();
/// assert_eq!(verified.as_ref(), "johndoe");
///
/// assert!(sanitizer.sanitize(Tainted::new("john\ndoe".to_string())).is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AccountNameSanitizer {
    max_len: usize,
}

impl AccountNameSanitizer {
    /// Creates a sanitizer with a custom length limit.
    ///
    /// # Panics
    ///
    /// Panics if `max_len` is 0.
    pub fn new(max_len: usize) -> Self {
        assert!(max_len > 0, "max_len must be greater than 0");
        Self { max_len }
    }
}

impl Default for AccountNameSanitizer {
    fn default() -> Self {
        Self::new(MAX_ACCOUNT_NAME_LEN)
    }
}

impl Sanitizer<String> for AccountNameSanitizer {
    fn sanitize(&self, input: Tainted<String>) -> Result<Verified<String>, SanitizationError> {
        let raw = input.into_inner();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(SanitizationError::new(
                SanitizationErrorKind::Empty,
                "username must not be empty",
            ));
        }

        if has_control_chars(trimmed) || trimmed.contains('/') {
            return Err(SanitizationError::new(
                SanitizationErrorKind::ContainsControlChars,
                "username contains control characters or '/'",
            ));
        }

        if trimmed.chars().count() > self.max_len {
            return Err(SanitizationError::new(
                SanitizationErrorKind::TooLong,
                format!("username exceeds {} characters", self.max_len),
            ));
        }

        Ok(Verified::new_unchecked(trimmed.to_string()))
    }
}

/// Validates contact e-mail addresses.
///
/// Only structural checks: one `@` with a non-empty local part and domain,
/// printable characters, bounded length.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailSanitizer;

impl Sanitizer<String> for EmailSanitizer {
    fn sanitize(&self, input: Tainted<String>) -> Result<Verified<String>, SanitizationError> {
        let raw = input.into_inner();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(SanitizationError::new(
                SanitizationErrorKind::Empty,
                "email must not be empty",
            ));
        }

        if has_control_chars(trimmed) || trimmed.contains(char::is_whitespace) {
            return Err(SanitizationError::new(
                SanitizationErrorKind::ContainsControlChars,
                "email contains whitespace or control characters",
            ));
        }

        if trimmed.len() > MAX_EMAIL_LEN {
            return Err(SanitizationError::new(
                SanitizationErrorKind::TooLong,
                format!("email exceeds {} bytes", MAX_EMAIL_LEN),
            ));
        }

        match trimmed.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
                Ok(Verified::new_unchecked(trimmed.to_string()))
            }
            _ => Err(SanitizationError::new(
                SanitizationErrorKind::MalformedInput,
                "email must have the form local@domain",
            )),
        }
    }
}

/// Rejects missing credentials.
///
/// The passphrase is not trimmed or otherwise altered; whitespace is a legal
/// part of a credential.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialSanitizer;

impl Sanitizer<Passphrase> for CredentialSanitizer {
    fn sanitize(&self, input: Tainted<Passphrase>) -> Result<Verified<Passphrase>, SanitizationError> {
        let passphrase = input.into_inner();

        if passphrase.is_empty() {
            return Err(SanitizationError::new(
                SanitizationErrorKind::Empty,
                "credentials must not be empty",
            ));
        }

        Ok(Verified::new_unchecked(passphrase))
    }
}

/// Validates controller MAC addresses.
///
/// Accepts six two-digit hex groups separated by `:` or `-` and normalizes
/// them to upper case with `:` separators, so `ff-ff-ff-ff-ff-ff` and
/// `FF:FF:FF:FF:FF:FF` name the same controller.
///
/// # Examples
///
/// ```
/// use account_core::{MacAddressSanitizer, Sanitizer, Tainted};
///
/// let mac = MacAddressSanitizer.sanitize(Tainted::new("00-1a-2b-3c-4d-5e".to_string())).unwrap();
/// assert_eq!(mac.as_ref(), "00:1A:2B:3C:4D:5E");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MacAddressSanitizer;

impl Sanitizer<String> for MacAddressSanitizer {
    fn sanitize(&self, input: Tainted<String>) -> Result<Verified<String>, SanitizationError> {
        let raw = input.into_inner();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(SanitizationError::new(
                SanitizationErrorKind::Empty,
                "mac address must not be empty",
            ));
        }

        let groups: Vec<&str> = trimmed.split(|c| c == ':' || c == '-').collect();
        let well_formed = groups.len() == 6
            && groups
                .iter()
                .all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()));

        if !well_formed {
            return Err(SanitizationError::new(
                SanitizationErrorKind::MalformedInput,
                "mac address must be six hex octets",
            ));
        }

        Ok(Verified::new_unchecked(groups.join(":").to_ascii_uppercase()))
    }
}
