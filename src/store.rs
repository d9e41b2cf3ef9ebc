//! Account persistence.
//!
//! [`AccountSession`] is the narrow contract the request handlers need on
//! top of a transactional [`Session`]. [`MemoryStore`] implements it in
//! process memory.

mod memory;

pub use memory::{MemorySession, MemoryStore};

use crate::account::{Controller, Schema, StoredUser};
use crate::error::Error;
use crate::transaction::Session;

/// Account operations available inside a unit of work.
///
/// Reads see the session's own uncommitted writes. Writes require an active
/// transaction and become visible to other sessions on commit.
pub trait AccountSession: Session {
    /// True if `username` exists under `schema`.
    fn user_exists(&self, schema: Schema, username: &str) -> Result<bool, Error>;

    /// Looks a user up by name.
    fn find_user(&self, schema: Schema, username: &str) -> Result<Option<StoredUser>, Error>;

    /// Creates an empty account and returns its identifier.
    fn create_account(&mut self) -> Result<u64, Error>;

    /// Stores a new user.
    ///
    /// # Errors
    ///
    /// [`Error::Conflict`] if the name is taken under the user's schema.
    fn insert_user(&mut self, user: StoredUser) -> Result<(), Error>;

    /// Removes a user. Returns false if there was no such user.
    fn remove_user(&mut self, schema: Schema, username: &str) -> Result<bool, Error>;

    /// Attaches a controller to an account, recorded under the schema's
    /// controller entity ([`Schema::controller_entity_name`]).
    fn insert_controller(
        &mut self,
        schema: Schema,
        account_id: u64,
        controller: &Controller,
    ) -> Result<(), Error>;
}
