use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::account::{Controller, Schema, StoredController, StoredUser};
use crate::error::Error;
use crate::store::AccountSession;
use crate::transaction::{Session, SessionFactory};

type UserKey = (Schema, String);

#[derive(Debug, Default)]
struct Tables {
    online: bool,
    next_account_id: u64,
    accounts: BTreeSet<u64>,
    users: BTreeMap<UserKey, StoredUser>,
    controllers: Vec<StoredController>,
}

#[derive(Debug, Clone)]
enum Change {
    CreateAccount(u64),
    Insert(StoredUser),
    Remove(UserKey),
    AddController(StoredController),
}

/// A thread-safe, in-process account store.
///
/// Cloning is cheap and every clone shares the same tables. Each session
/// stages its writes privately and applies them atomically on commit.
///
/// # Examples
///
/// ```
/// use account_core::{MemoryStore, Schema, SessionFactory, Session, AccountSession};
///
/// let store = MemoryStore::new();
/// let mut session = store.create_session().unwrap();
/// session.begin().unwrap();
/// assert!(!session.user_exists(Schema::default(), "johndoe").unwrap());
/// session.rollback().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables {
                online: true,
                next_account_id: 1,
                ..Tables::default()
            })),
        }
    }

    /// Takes the store offline or back online. While offline no
    /// transaction can begin.
    pub fn set_online(&self, online: bool) {
        self.tables.write().online = online;
    }

    /// Committed user, if any.
    pub fn user(&self, schema: Schema, username: &str) -> Option<StoredUser> {
        self.tables
            .read()
            .users
            .get(&(schema, username.to_string()))
            .cloned()
    }

    /// Number of committed users under `schema`.
    pub fn user_count(&self, schema: Schema) -> usize {
        self.tables
            .read()
            .users
            .keys()
            .filter(|(s, _)| *s == schema)
            .count()
    }

    /// Committed controllers recorded under `schema`.
    pub fn controllers(&self, schema: Schema) -> Vec<StoredController> {
        self.tables
            .read()
            .controllers
            .iter()
            .filter(|c| c.schema == schema)
            .cloned()
            .collect()
    }

    /// Number of committed accounts.
    pub fn account_count(&self) -> usize {
        self.tables.read().accounts.len()
    }
}

impl SessionFactory for MemoryStore {
    type Session = MemorySession;

    fn create_session(&self) -> Result<MemorySession, Error> {
        Ok(MemorySession {
            tables: Arc::clone(&self.tables),
            staged: Vec::new(),
            active: false,
            rollback_only: false,
        })
    }
}

/// One request's view of a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySession {
    tables: Arc<RwLock<Tables>>,
    staged: Vec<Change>,
    active: bool,
    rollback_only: bool,
}

impl MemorySession {
    fn require_active(&self) -> Result<(), Error> {
        if self.active {
            Ok(())
        } else {
            Err(Error::Persistence("no active transaction".into()))
        }
    }

    fn lookup(&self, key: &UserKey) -> Option<StoredUser> {
        let mut current = self.tables.read().users.get(key).cloned();
        for change in &self.staged {
            match change {
                Change::Insert(user) if user.schema == key.0 && user.username == key.1 => {
                    current = Some(user.clone());
                }
                Change::Remove(removed) if removed == key => current = None,
                _ => {}
            }
        }
        current
    }
}

impl Session for MemorySession {
    fn begin(&mut self) -> Result<(), Error> {
        if self.active {
            return Err(Error::Persistence("transaction already active".into()));
        }
        if !self.tables.read().online {
            return Err(Error::Persistence("account store is offline".into()));
        }
        self.active = true;
        self.rollback_only = false;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.require_active()?;
        if self.rollback_only {
            return Err(Error::Persistence("transaction is marked rollback-only".into()));
        }

        let mut tables = self.tables.write();

        // Validate everything before applying anything.
        let mut taken: BTreeSet<UserKey> = tables.users.keys().cloned().collect();
        for change in &self.staged {
            match change {
                Change::Insert(user) => {
                    if !taken.insert((user.schema, user.username.clone())) {
                        return Err(Error::Conflict(format!(
                            "User '{}' already exists.",
                            user.username
                        )));
                    }
                }
                Change::Remove(key) => {
                    taken.remove(key);
                }
                Change::AddController(controller) => {
                    let owned = tables.accounts.contains(&controller.account_id)
                        || self.staged.iter().any(|c| {
                            matches!(c, Change::CreateAccount(id) if *id == controller.account_id)
                        });
                    if !owned {
                        return Err(Error::Persistence(format!(
                            "no account {} for controller",
                            controller.account_id
                        )));
                    }
                }
                Change::CreateAccount(_) => {}
            }
        }

        let applied = self.staged.len();
        for change in self.staged.drain(..) {
            match change {
                Change::CreateAccount(id) => {
                    tables.accounts.insert(id);
                }
                Change::Insert(user) => {
                    tables.users.insert((user.schema, user.username.clone()), user);
                }
                Change::Remove(key) => {
                    tables.users.remove(&key);
                }
                Change::AddController(controller) => {
                    tables.controllers.push(controller);
                }
            }
        }
        drop(tables);

        self.active = false;
        tracing::debug!(applied, "Committed memory store transaction");
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), Error> {
        self.require_active()?;
        self.staged.clear();
        self.active = false;
        self.rollback_only = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    fn set_rollback_only(&mut self) {
        if self.active {
            self.rollback_only = true;
        }
    }
}

impl AccountSession for MemorySession {
    fn user_exists(&self, schema: Schema, username: &str) -> Result<bool, Error> {
        Ok(self.lookup(&(schema, username.to_string())).is_some())
    }

    fn find_user(&self, schema: Schema, username: &str) -> Result<Option<StoredUser>, Error> {
        Ok(self.lookup(&(schema, username.to_string())))
    }

    fn create_account(&mut self) -> Result<u64, Error> {
        self.require_active()?;
        let id = {
            let mut tables = self.tables.write();
            let id = tables.next_account_id;
            tables.next_account_id += 1;
            id
        };
        self.staged.push(Change::CreateAccount(id));
        Ok(id)
    }

    fn insert_user(&mut self, user: StoredUser) -> Result<(), Error> {
        self.require_active()?;
        if self.user_exists(user.schema, &user.username)? {
            return Err(Error::Conflict(format!(
                "User '{}' already exists.",
                user.username
            )));
        }
        self.staged.push(Change::Insert(user));
        Ok(())
    }

    fn remove_user(&mut self, schema: Schema, username: &str) -> Result<bool, Error> {
        self.require_active()?;
        if !self.user_exists(schema, username)? {
            return Ok(false);
        }
        self.staged.push(Change::Remove((schema, username.to_string())));
        Ok(true)
    }

    fn insert_controller(
        &mut self,
        schema: Schema,
        account_id: u64,
        controller: &Controller,
    ) -> Result<(), Error> {
        self.require_active()?;
        self.staged.push(Change::AddController(StoredController {
            account_id,
            mac_addresses: controller.mac_addresses().clone(),
            schema,
        }));
        Ok(())
    }
}
