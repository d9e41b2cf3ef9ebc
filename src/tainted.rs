use std::fmt;

/// A wrapper for untrusted request data that must be sanitized before use.
///
/// Every field of a registration body and every path parameter enters the
/// crate as `Tainted<T>`. The value is unreachable until a
/// [`Sanitizer`](crate::Sanitizer) promotes it to [`Verified<T>`](crate::Verified).
///
/// # Security Properties
///
/// - Does NOT implement `Deref` or any implicit conversion traits
/// - Inner value is inaccessible outside this crate
///
/// # Examples
///
/// ```
/// use account_core::Tainted;
///
/// let username = Tainted::new("johndoe\n[forged log line]".to_string());
///
/// // Debug output shows it's tainted
/// assert!(format!("{:?}", username).starts_with("Tainted"));
///
/// // But the value cannot be used directly:
/// // let key = format!("users/{}", username); // Won't compile!
/// ```
// BREAKING CHANGE WARNING: Do NOT remove Clone - tainted values need to be duplicated for validation flow.
#[derive(Clone)]
pub struct Tainted<T> {
    // BREAKING CHANGE WARNING: This field MUST remain private (CWE-20).
    inner: T,
}

impl<T> Tainted<T> {
    /// Wraps an untrusted value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Extracts the inner value for sanitization.
    ///
    /// BREAKING CHANGE WARNING: Changing visibility to `pub` lets request data
    /// reach the store and the logs unvalidated (CWE-74, CWE-117).
    pub(crate) fn into_inner(self) -> T {
        self.inner
    }
}

// BREAKING CHANGE WARNING: Do NOT add Deref, AsRef, Borrow, From<T> or Into<T>
// to Tainted<T>.

impl<T: fmt::Debug> fmt::Debug for Tainted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tainted")
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::Passphrase;

    #[test]
    fn tainted_wraps_value() {
        let user_input = Tainted::new("johndoe".to_string());
        let debug_output = format!("{:?}", user_input);

        assert!(debug_output.contains("Tainted"));
        assert!(debug_output.contains("johndoe"));
    }

    #[test]
    fn tainted_passphrase_stays_redacted() {
        let tainted = Tainted::new(Passphrase::from_string("Smb9324$#@#@$".to_string()));
        let debug_output = format!("{:?}", tainted);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("Smb9324"));
    }

    mod proptests {
        use super::*;
        use crate::{sanitizer::AccountNameSanitizer, test_utils::arb_account_name, Sanitizer};
        use proptest::prelude::*;

        proptest! {
            /// Cloning a Tainted value yields identical sanitization outcomes
            #[test]
            fn proptest_tainted_clone_preserves_value(input in arb_account_name()) {
                let sanitizer = AccountNameSanitizer::default();

                let tainted1 = Tainted::new(input.clone());
                let tainted2 = tainted1.clone();

                let verified1 = sanitizer.sanitize(tainted1).expect("valid input should pass");
                let verified2 = sanitizer.sanitize(tainted2).expect("valid input should pass");

                prop_assert_eq!(verified1.as_ref(), verified2.as_ref());
                prop_assert_eq!(verified1.as_ref(), &input);
            }
        }
    }
}
