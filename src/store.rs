//! In-memory user records.
//!
//! Records live only for the lifetime of the process. Identifiers come from a
//! single atomic counter so concurrent creates never share an id, and ids are
//! never handed out twice even after the record is deleted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub name: String,
}

pub struct UserStore {
    users: RwLock<BTreeMap<u64, UserRecord>>,
    next_id: AtomicU64,
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store a new record under the next free id.
    pub fn create(&self, name: String) -> Result<UserRecord, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if id == 0 {
            return Err(StoreError::InvalidId(id));
        }

        let record = UserRecord { id, name };
        let mut users = self
            .users
            .write()
            .map_err(|_| StoreError::Poisoned("users"))?;
        users.insert(id, record.clone());

        Ok(record)
    }

    pub fn get(&self, id: u64) -> Result<UserRecord, StoreError> {
        let users = self.users.read().map_err(|_| StoreError::Poisoned("users"))?;
        users.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    /// Replace the name of an existing record, returning the updated record.
    pub fn update(&self, id: u64, name: String) -> Result<UserRecord, StoreError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StoreError::Poisoned("users"))?;
        let record = users.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.name = name;

        Ok(record.clone())
    }

    pub fn delete(&self, id: u64) -> Result<UserRecord, StoreError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StoreError::Poisoned("users"))?;
        users.remove(&id).ok_or(StoreError::NotFound(id))
    }

    /// Snapshot of all records in ascending id order.
    pub fn get_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let users = self.users.read().map_err(|_| StoreError::Poisoned("users"))?;
        Ok(users.values().cloned().collect())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let users = self.users.read().map_err(|_| StoreError::Poisoned("users"))?;
        Ok(users.len())
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}
