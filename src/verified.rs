/// A value that passed a [`Sanitizer`](crate::Sanitizer).
///
/// `Verified<T>` is the only form in which request data reaches the account
/// store or a log line. It has no public constructor; the sanitizers in this
/// crate build it after their checks succeed.
///
/// # Examples
///
/// External callers cannot create `Verified<T>` directly:
///
/// ```compile_fail
/// use account_core::Verified;
///
/// let verified = Verified::new("johndoe".to_string());
/// ```
///
/// Going through a sanitizer works:
///
/// ```
/// use account_core::{AccountNameSanitizer, Sanitizer, Tainted};
///
/// let verified = AccountNameSanitizer::default()
///     .sanitize(Tainted::new("johndoe".to_string()))
///     .unwrap();
/// assert_eq!(verified.as_ref(), "johndoe");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified<T> {
    inner: T,
}

impl<T> Verified<T> {
    /// Wraps a value without checking it.
    ///
    /// `pub(crate)`: only sanitizers call this, after validation.
    pub(crate) fn new_unchecked(value: T) -> Self {
        Self { inner: value }
    }

    /// Consumes the wrapper and returns the inner value.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> AsRef<T> for Verified<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}
