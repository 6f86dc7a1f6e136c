//! The document store shared by every component: user records and the
//! monthly image fragments, plus a feed of change notifications.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::auth::repo_types::{NewUser, User};
use crate::puzzle::month::MonthKey;
use crate::puzzle::repo_types::JigsawImagePart;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Buffered change notifications per subscriber before it starts lagging.
pub const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("gave up after repeated concurrent updates to {0}")]
    Contention(String),
}

/// What changed in the store. Emitted after the write is durable. The same
/// write may be announced more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    UserCreated(String),
    PiecesUpdated(String),
    FragmentsWritten(MonthKey),
    /// Changes may have been missed; reload everything.
    Resync,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the username is taken.
    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError>;

    /// All users in creation order.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Replaces the user's pieces only while the stored version still equals
    /// `expected_version`, bumping the version. `Ok(false)` means another
    /// writer got there first and nothing was changed.
    async fn update_pieces(
        &self,
        username: &str,
        expected_version: i64,
        pieces: &[u8],
    ) -> Result<bool, StoreError>;

    async fn fragments_for_month(
        &self,
        month: &MonthKey,
    ) -> Result<Vec<JigsawImagePart>, StoreError>;

    /// Writes all parts in one atomic batch; a part whose document key
    /// already exists is overwritten.
    async fn write_fragments(&self, parts: &[JigsawImagePart]) -> Result<(), StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}
