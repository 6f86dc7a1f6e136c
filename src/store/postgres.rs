use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{
    postgres::{PgListener, PgPoolOptions},
    FromRow, PgPool,
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::{DocumentStore, StoreChange, StoreError, CHANGE_CHANNEL_CAPACITY};
use crate::auth::repo_types::{NewUser, User};
use crate::puzzle::grid::PIECE_COUNT;
use crate::puzzle::month::MonthKey;
use crate::puzzle::repo_types::JigsawImagePart;

/// Channel the `users` trigger publishes on, see `migrations/0002`.
pub const USER_CHANGES_CHANNEL: &str = "jigsaw_user_changes";

/// Pause before polling the listener again after a failure.
const LISTEN_RETRY_DELAY: Duration = Duration::from_secs(2);

/// PostgreSQL-backed store. Writes through this instance are announced
/// directly; with [`PgStore::listen`] running, user writes from other
/// processes on the same database are announced too.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
    changes: broadcast::Sender<StoreChange>,
}

#[derive(Debug, FromRow)]
struct UserRow {
    username: String,
    full_name: String,
    password_hash: String,
    pieces: Vec<i32>,
    version: i64,
}

#[derive(Debug, FromRow)]
struct FragmentRow {
    id: i32,
    base64_part: String,
    prompt: String,
    month: String,
}

/// Payload of a `users` trigger notification.
#[derive(Debug, Deserialize)]
struct UserNotification {
    op: String,
    username: String,
}

fn parse_user_notification(payload: &str) -> Option<StoreChange> {
    let note: UserNotification = serde_json::from_str(payload).ok()?;
    match note.op.as_str() {
        "insert" => Some(StoreChange::UserCreated(note.username)),
        "update" => Some(StoreChange::PiecesUpdated(note.username)),
        _ => None,
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let pieces = row
            .pieces
            .iter()
            .map(|&p| {
                u8::try_from(p)
                    .ok()
                    .filter(|p| *p < PIECE_COUNT)
                    .ok_or_else(|| {
                        StoreError::Corrupt(format!("user {} has piece {p}", row.username))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(User {
            username: row.username,
            full_name: row.full_name,
            password_hash: row.password_hash,
            pieces,
            version: row.version,
        })
    }
}

impl TryFrom<FragmentRow> for JigsawImagePart {
    type Error = StoreError;

    fn try_from(row: FragmentRow) -> Result<Self, Self::Error> {
        let month = row
            .month
            .parse::<MonthKey>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let id = u32::try_from(row.id)
            .map_err(|_| StoreError::Corrupt(format!("fragment id {} for {month}", row.id)))?;
        Ok(JigsawImagePart {
            id,
            base64_part: row.base64_part,
            prompt: row.prompt,
            month,
        })
    }
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self::from_pool(db))
    }

    pub fn from_pool(db: PgPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { db, changes }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.db).await
    }

    /// Forwards `users` trigger notifications into this store's change
    /// feed. The task runs until the pool is closed.
    pub async fn listen(&self) -> Result<JoinHandle<()>, sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.db).await?;
        listener.listen(USER_CHANGES_CHANNEL).await?;
        info!(channel = USER_CHANGES_CHANNEL, "listening for user changes");

        let changes = self.changes.clone();
        let db = self.db.clone();
        Ok(tokio::spawn(async move {
            while !db.is_closed() {
                match listener.try_recv().await {
                    Ok(Some(notification)) => {
                        match parse_user_notification(notification.payload()) {
                            Some(change) => {
                                changes.send(change).ok();
                            }
                            None => warn!(
                                payload = notification.payload(),
                                "unrecognised user change notification"
                            ),
                        }
                    }
                    Ok(None) => {
                        // connection dropped, notifications may have been
                        // missed while it was down
                        warn!("change listener lost its connection, reconnecting");
                        changes.send(StoreChange::Resync).ok();
                    }
                    Err(e) => {
                        error!(error = %e, "change listener failed");
                        tokio::time::sleep(LISTEN_RETRY_DELAY).await;
                    }
                }
            }
            info!("pool closed, change listener stopped");
        }))
    }

    fn notify(&self, change: StoreChange) {
        self.changes.send(change).ok();
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT username, full_name, password_hash, pieces, version
              FROM users
             WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, full_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING username, full_name, password_hash, pieces, version
            "#,
        )
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(format!("user {}", user.username))
            }
            other => StoreError::Database(other),
        })?;
        let created = User::try_from(row)?;
        self.notify(StoreChange::UserCreated(created.username.clone()));
        Ok(created)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT username, full_name, password_hash, pieces, version
              FROM users
             ORDER BY created_at ASC, username ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn update_pieces(
        &self,
        username: &str,
        expected_version: i64,
        pieces: &[u8],
    ) -> Result<bool, StoreError> {
        let pieces: Vec<i32> = pieces.iter().map(|&p| i32::from(p)).collect();
        let result = sqlx::query(
            r#"
            UPDATE users
               SET pieces = $3, version = version + 1
             WHERE username = $1 AND version = $2
            "#,
        )
        .bind(username)
        .bind(expected_version)
        .bind(pieces)
        .execute(&self.db)
        .await?;

        let updated = result.rows_affected() == 1;
        if updated {
            self.notify(StoreChange::PiecesUpdated(username.to_string()));
        }
        Ok(updated)
    }

    async fn fragments_for_month(
        &self,
        month: &MonthKey,
    ) -> Result<Vec<JigsawImagePart>, StoreError> {
        let rows = sqlx::query_as::<_, FragmentRow>(
            r#"
            SELECT id, base64_part, prompt, month
              FROM jigsaw_images
             WHERE month = $1
             ORDER BY id ASC
            "#,
        )
        .bind(month.to_string())
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(JigsawImagePart::try_from).collect()
    }

    async fn write_fragments(&self, parts: &[JigsawImagePart]) -> Result<(), StoreError> {
        let Some(first) = parts.first() else {
            return Ok(());
        };

        let mut tx = self.db.begin().await?;
        for part in parts {
            let id = i32::try_from(part.id)
                .map_err(|_| StoreError::Corrupt(format!("fragment id {} too large", part.id)))?;
            sqlx::query(
                r#"
                INSERT INTO jigsaw_images (doc_id, id, base64_part, prompt, month)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (doc_id) DO UPDATE
                   SET base64_part = EXCLUDED.base64_part,
                       prompt      = EXCLUDED.prompt
                "#,
            )
            .bind(part.doc_id())
            .bind(id)
            .bind(&part.base64_part)
            .bind(&part.prompt)
            .bind(part.month.to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(month = %first.month, count = parts.len(), "fragments committed");
        self.notify(StoreChange::FragmentsWritten(first.month));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
