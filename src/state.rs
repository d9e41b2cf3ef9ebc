//! Type-state markers for context progression.
//!
//! Zero-sized markers that encode, at compile time, how far a request has
//! progressed through the access filter.

/// Marker type for an unauthenticated context.
///
/// `Ctx<Unauthed>` has no principal and cannot open a unit of work.
#[derive(Debug, Clone, Copy)]
pub struct Unauthed {
    _private: (),
}

/// Marker type for an authenticated context.
///
/// `Ctx<Authed>` carries a principal whose roles have not yet been checked
/// against any operation.
#[derive(Debug, Clone, Copy)]
pub struct Authed {
    _private: (),
}

/// Marker type for an authorized context.
///
/// `Ctx<Authorized>` has passed the role check for exactly one operation.
/// Only this state can begin a unit of work.
#[derive(Debug, Clone, Copy)]
pub struct Authorized {
    _private: (),
}
