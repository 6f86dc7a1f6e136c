use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{DocumentStore, StoreChange, StoreError, CHANGE_CHANNEL_CAPACITY};
use crate::auth::repo_types::{NewUser, User};
use crate::puzzle::month::MonthKey;
use crate::puzzle::repo_types::JigsawImagePart;

/// Process-local store. Used when no database is configured and in tests.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    changes: broadcast::Sender<StoreChange>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    fragments: BTreeMap<String, JigsawImagePart>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, change: StoreChange) {
        // no subscribers is fine
        self.changes.send(change).ok();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.username == username).cloned())
    }

    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let created = {
            let mut inner = self.lock();
            if inner.users.iter().any(|u| u.username == user.username) {
                return Err(StoreError::Duplicate(format!("user {}", user.username)));
            }
            let created = User {
                username: user.username.clone(),
                full_name: user.full_name.clone(),
                password_hash: user.password_hash.clone(),
                pieces: Vec::new(),
                version: 0,
            };
            inner.users.push(created.clone());
            created
        };
        self.notify(StoreChange::UserCreated(created.username.clone()));
        Ok(created)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.lock().users.clone())
    }

    async fn update_pieces(
        &self,
        username: &str,
        expected_version: i64,
        pieces: &[u8],
    ) -> Result<bool, StoreError> {
        {
            let mut inner = self.lock();
            let Some(user) = inner
                .users
                .iter_mut()
                .find(|u| u.username == username && u.version == expected_version)
            else {
                return Ok(false);
            };
            user.pieces = pieces.to_vec();
            user.version += 1;
        }
        self.notify(StoreChange::PiecesUpdated(username.to_string()));
        Ok(true)
    }

    async fn fragments_for_month(
        &self,
        month: &MonthKey,
    ) -> Result<Vec<JigsawImagePart>, StoreError> {
        Ok(self
            .lock()
            .fragments
            .values()
            .filter(|p| p.month == *month)
            .cloned()
            .collect())
    }

    async fn write_fragments(&self, parts: &[JigsawImagePart]) -> Result<(), StoreError> {
        let Some(first) = parts.first() else {
            return Ok(());
        };
        {
            let mut inner = self.lock();
            for part in parts {
                inner.fragments.insert(part.doc_id(), part.clone());
            }
        }
        self.notify(StoreChange::FragmentsWritten(first.month));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
