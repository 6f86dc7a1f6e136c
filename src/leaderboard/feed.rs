//! Ranked view of all users, refreshed whenever the store reports a change
//! to users or their pieces.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast::error::RecvError, watch};
use tracing::{debug, error, info, warn};

use crate::auth::repo_types::User;
use crate::store::{DocumentStore, StoreChange, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub full_name: String,
    pub pieces: usize,
}

/// Orders users by descending piece count. Ties keep the input order.
pub fn rank(users: Vec<User>) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = users
        .into_iter()
        .map(|u| LeaderboardEntry {
            pieces: u.pieces.len(),
            username: u.username,
            full_name: u.full_name,
        })
        .collect();
    entries.sort_by(|a, b| b.pieces.cmp(&a.pieces));
    entries
}

/// Latest ranking, shared by every reader.
#[derive(Clone)]
pub struct LeaderboardFeed {
    rx: watch::Receiver<Vec<LeaderboardEntry>>,
}

impl LeaderboardFeed {
    /// Loads the initial ranking and spawns the task that keeps it current.
    /// The task holds the store weakly and ends once the store is dropped
    /// or every feed handle is gone.
    pub async fn start(store: Arc<dyn DocumentStore>) -> Result<Self, StoreError> {
        // subscribe first so no change between the load and the loop is missed
        let mut changes = store.subscribe();
        let (tx, rx) = watch::channel(rank(store.list_users().await?));
        let store = Arc::downgrade(&store);

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(StoreChange::FragmentsWritten(_)) => continue,
                    Ok(change) => debug!(?change, "refreshing leaderboard"),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "leaderboard missed changes, reloading");
                    }
                    Err(RecvError::Closed) => break,
                }
                let Some(store) = store.upgrade() else { break };
                if tx.is_closed() {
                    break;
                }
                match store.list_users().await {
                    Ok(users) => {
                        tx.send_replace(rank(users));
                    }
                    Err(e) => error!(error = %e, "leaderboard reload failed"),
                }
            }
            info!("leaderboard refresh stopped");
        });

        Ok(Self { rx })
    }

    pub fn snapshot(&self) -> Vec<LeaderboardEntry> {
        self.rx.borrow().clone()
    }

    /// A receiver that is notified on every new ranking.
    pub fn watch(&self) -> watch::Receiver<Vec<LeaderboardEntry>> {
        self.rx.clone()
    }
}
