use std::fmt;

/// Placeholder recorded when no principal name is available.
pub const NO_NAME: &str = "<no name>";

/// A request-scoped logger.
///
/// `RequestLog` is obtained from [`Ctx::log`](crate::Ctx::log) and borrows
/// the context, so it cannot outlive the request it describes. Every event
/// carries the request id, the caller's name and the request line as
/// structured fields.
///
/// Secret values are redacted when logged through their `Debug` and
/// `Display` implementations.
#[derive(Debug, Clone, Copy)]
pub struct RequestLog<'a> {
    request_id: &'a str,
    user: &'a str,
    method: &'a str,
    path: &'a str,
}

impl<'a> RequestLog<'a> {
    /// This is `pub(crate)` - only `Ctx` can create it.
    pub(crate) fn new(request_id: &'a str, user: Option<&'a str>, method: &'a str, path: &'a str) -> Self {
        Self {
            request_id,
            user: user.unwrap_or(NO_NAME),
            method,
            path,
        }
    }

    /// Returns the request ID associated with this logger.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Returns the caller name, or [`NO_NAME`].
    pub fn user(&self) -> &str {
        self.user
    }

    /// Logs an info-level message.
    ///
    /// Use with `format_args!`:
    /// ```no_run
    /// # use account_core::{RequestLog, Secret};
    /// # fn example(log: &RequestLog) {
    /// let secret = Secret::new(b"password".to_vec());
    /// log.info(format_args!("Deriving credential from {:?}", secret));
    /// # }
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(
            request_id = %self.request_id,
            user = %self.user,
            method = %self.method,
            path = %self.path,
            "{}",
            args
        );
    }

    /// Logs a warning-level message.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(
            request_id = %self.request_id,
            user = %self.user,
            method = %self.method,
            path = %self.path,
            "{}",
            args
        );
    }

    /// Logs an error-level message.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(
            request_id = %self.request_id,
            user = %self.user,
            method = %self.method,
            path = %self.path,
            "{}",
            args
        );
    }

    /// Logs a debug-level message.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(
            request_id = %self.request_id,
            user = %self.user,
            method = %self.method,
            path = %self.path,
            "{}",
            args
        );
    }
}
