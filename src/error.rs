use std::fmt;

use http::StatusCode;

/// Errors surfaced by the account manager core.
///
/// Every variant maps to exactly one external status through
/// [`Error::status`]. Messages carried by the variants are safe to log; they
/// never contain credential material.
#[derive(Debug)]
pub enum Error {
    /// The caller supplied malformed input (empty username, missing credentials).
    InvalidArgument(String),
    /// The environment cannot provide a requested capability
    /// (no usable TLS protocol, unreadable trust store, bad config file).
    Configuration(String),
    /// A uniqueness constraint would be violated.
    Conflict(String),
    /// The addressed account does not exist.
    NotFound(String),
    /// The persistence provider failed.
    Persistence(String),
    /// The remote service could not be reached or answered unintelligibly.
    Transport(String),
    /// An access-control check failed.
    Violation(Violation),
}

impl Error {
    /// Returns the status outcome reported to the caller for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            Error::Violation(v) => v.kind.status(),
        }
    }

    /// Returns the human-readable reason phrase sent back to the caller.
    ///
    /// Client errors carry their message. Server-side failures hide their
    /// internal detail unless `include_detail` is set (debug deployments).
    pub fn reason(&self, include_detail: bool) -> String {
        match self {
            Error::InvalidArgument(msg) => format!("Bad Request - {}", msg),
            Error::Conflict(msg) => format!("Conflict - {}", msg),
            Error::NotFound(msg) => format!("Not Found - {}", msg),
            Error::Configuration(msg) | Error::Persistence(msg) => {
                if include_detail {
                    format!("Internal Server Error - {}", msg)
                } else {
                    "Internal Server Error".to_string()
                }
            }
            Error::Transport(msg) => {
                if include_detail {
                    format!("Bad Gateway - {}", msg)
                } else {
                    "Bad Gateway".to_string()
                }
            }
            Error::Violation(v) => match v.kind {
                ViolationKind::Unauthenticated => "Unauthorized".to_string(),
                ViolationKind::Forbidden { .. } => "Forbidden".to_string(),
            },
        }
    }

    /// True for failures detected before anything was written.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            Error::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::Persistence(msg) => write!(f, "Persistence failure: {}", msg),
            Error::Transport(msg) => write!(f, "Transport failure: {}", msg),
            Error::Violation(v) => write!(f, "Policy violation: {}", v),
        }
    }
}

impl std::error::Error for Error {}

impl From<Violation> for Error {
    fn from(v: Violation) -> Self {
        Error::Violation(v)
    }
}

/// A policy violation with details about what failed.
#[derive(Debug, Clone)]
pub struct Violation {
    /// The kind of violation that occurred
    pub kind: ViolationKind,
    /// Human-readable message explaining the violation
    pub message: String,
}

impl Violation {
    /// Creates a new violation.
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Violation {}

/// The kind of policy violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// No authenticated principal accompanied the request
    Unauthenticated,
    /// The principal holds none of the roles the operation requires
    Forbidden {
        /// The operation that was refused
        operation: &'static str,
    },
}

impl ViolationKind {
    /// Status outcome for this violation kind.
    pub fn status(&self) -> StatusCode {
        match self {
            ViolationKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ViolationKind::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Unauthenticated => write!(f, "Unauthenticated"),
            ViolationKind::Forbidden { operation } => write!(f, "Forbidden for '{}'", operation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_maps_to_one_status() {
        assert_eq!(Error::InvalidArgument("x".into()).status(), 400);
        assert_eq!(Error::Configuration("x".into()).status(), 500);
        assert_eq!(Error::Conflict("x".into()).status(), 409);
        assert_eq!(Error::NotFound("x".into()).status(), 404);
        assert_eq!(Error::Persistence("x".into()).status(), 500);
        assert_eq!(Error::Transport("x".into()).status(), 502);
        assert_eq!(
            Error::from(Violation::new(ViolationKind::Unauthenticated, "none")).status(),
            401
        );
        assert_eq!(
            Error::from(Violation::new(
                ViolationKind::Forbidden {
                    operation: "delete-account"
                },
                "no role"
            ))
            .status(),
            403
        );
    }

    #[test]
    fn server_errors_hide_detail_by_default() {
        let err = Error::Persistence("connection reset by db-host-7".into());

        assert_eq!(err.reason(false), "Internal Server Error");
        assert!(err.reason(true).contains("db-host-7"));
    }

    #[test]
    fn client_errors_keep_their_reason() {
        let err = Error::Conflict("User 'johndoe' already exists.".into());
        assert_eq!(err.reason(false), "Conflict - User 'johndoe' already exists.");
        assert!(err.is_client_error());
    }

    #[test]
    fn violation_display_names_operation() {
        let v = Violation::new(
            ViolationKind::Forbidden {
                operation: "create-account",
            },
            "principal lacks service-admin",
        );
        assert!(v.to_string().contains("create-account"));
    }
}
