use std::collections::BTreeSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::Failure;
use crate::puzzle::grid::PIECE_COUNT;
use crate::store::{DocumentStore, StoreError};

/// Pieces granted per payment unless the caller asks for fewer.
pub const DEFAULT_MAX_NEW: usize = 2;

/// Read-modify-write rounds before giving up on a contended record.
const MAX_CAS_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AwardOutcome {
    /// Newly granted pieces, ascending.
    pub awarded: Vec<u8>,
    /// Full collection after the award, ascending.
    pub pieces: Vec<u8>,
    /// Every piece of the grid is now owned.
    pub complete: bool,
}

/// Grants random unowned pieces to users.
pub struct PieceAwardLedger {
    store: Arc<dyn DocumentStore>,
}

impl PieceAwardLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Adds up to `max_new` random pieces the user does not own yet.
    ///
    /// The read and the write are joined by a version check, so a
    /// concurrent award for the same user makes this call re-read and
    /// draw again instead of overwriting the other award.
    #[instrument(skip(self))]
    pub async fn award_random_pieces(
        &self,
        username: &str,
        max_new: usize,
    ) -> Result<AwardOutcome, Failure> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let user = self
                .store
                .find_user(username)
                .await?
                .ok_or_else(|| Failure::NotFound(format!("user {username}")))?;

            let available = unowned(&user.pieces);
            if available.is_empty() {
                return Err(Failure::AlreadyComplete);
            }
            let awarded = pick(&available, max_new, &mut rand::thread_rng());
            let pieces = merge(&user.pieces, &awarded);

            if self
                .store
                .update_pieces(username, user.version, &pieces)
                .await?
            {
                let complete = pieces.len() == usize::from(PIECE_COUNT);
                info!(?awarded, total = pieces.len(), complete, "pieces awarded");
                return Ok(AwardOutcome {
                    awarded,
                    pieces,
                    complete,
                });
            }
            debug!(attempt, "pieces changed concurrently, drawing again");
        }
        Err(StoreError::Contention(format!("pieces of {username}")).into())
    }
}

/// Grid indices not in `owned`, ascending.
pub fn unowned(owned: &[u8]) -> Vec<u8> {
    (0..PIECE_COUNT).filter(|p| !owned.contains(p)).collect()
}

/// Up to `max_new` distinct elements of `available`, uniformly at random,
/// returned ascending.
pub fn pick<R: Rng + ?Sized>(available: &[u8], max_new: usize, rng: &mut R) -> Vec<u8> {
    let mut picked: Vec<u8> = available.choose_multiple(rng, max_new).copied().collect();
    picked.sort_unstable();
    picked
}

fn merge(owned: &[u8], awarded: &[u8]) -> Vec<u8> {
    owned
        .iter()
        .chain(awarded)
        .copied()
        .collect::<BTreeSet<u8>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{NewUser, User};
    use crate::puzzle::month::MonthKey;
    use crate::puzzle::repo_types::JigsawImagePart;
    use crate::store::{MemoryStore, StoreChange};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast;

    async fn store_with(username: &str, pieces: &[u8]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_user(&NewUser {
                username: username.into(),
                full_name: "Test User".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        if !pieces.is_empty() {
            assert!(store.update_pieces(username, 0, pieces).await.unwrap());
        }
        store
    }

    fn assert_valid_set(pieces: &[u8]) {
        assert!(pieces.windows(2).all(|w| w[0] < w[1]), "sorted, no duplicates: {pieces:?}");
        assert!(pieces.iter().all(|p| *p < PIECE_COUNT));
    }

    #[test]
    fn pick_draws_distinct_available_pieces() {
        let mut rng = StdRng::seed_from_u64(7);
        let available = unowned(&[0, 1, 2]);
        assert_eq!(available.len(), 13);
        for _ in 0..200 {
            let picked = pick(&available, 2, &mut rng);
            assert_eq!(picked.len(), 2);
            assert_ne!(picked[0], picked[1]);
            assert!(picked.iter().all(|p| available.contains(p)));
        }
    }

    #[test]
    fn pick_is_capped_by_availability() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick(&[9], 2, &mut rng), vec![9]);
        assert!(pick(&[], 2, &mut rng).is_empty());
    }

    #[test]
    fn pick_reaches_every_piece() {
        let mut rng = StdRng::seed_from_u64(42);
        let available = unowned(&[]);
        let mut seen = BTreeSet::new();
        for _ in 0..500 {
            seen.extend(pick(&available, 2, &mut rng));
        }
        assert_eq!(seen.len(), usize::from(PIECE_COUNT));
    }

    #[tokio::test]
    async fn example_award_adds_two() {
        let store = store_with("asha", &[0, 1, 2]).await;
        let ledger = PieceAwardLedger::new(store.clone());

        let outcome = ledger.award_random_pieces("asha", DEFAULT_MAX_NEW).await.unwrap();

        assert_eq!(outcome.pieces.len(), 5);
        assert_eq!(outcome.awarded.len(), 2);
        assert!([0, 1, 2].iter().all(|p| outcome.pieces.contains(p)));
        assert!(outcome.awarded.iter().all(|p| *p > 2));
        assert!(!outcome.complete);
        assert_valid_set(&outcome.pieces);

        let stored = store.find_user("asha").await.unwrap().unwrap();
        assert_eq!(stored.pieces, outcome.pieces);
    }

    #[tokio::test]
    async fn award_size_follows_min_rule_for_every_k() {
        for k in 0..usize::from(PIECE_COUNT) {
            let owned: Vec<u8> = (0..PIECE_COUNT).take(k).collect();
            let store = store_with("ravi", &owned).await;
            let ledger = PieceAwardLedger::new(store);

            let outcome = ledger.award_random_pieces("ravi", DEFAULT_MAX_NEW).await.unwrap();

            let expected = 16.min(k + DEFAULT_MAX_NEW.min(16 - k));
            assert_eq!(outcome.pieces.len(), expected, "k = {k}");
            assert!(owned.iter().all(|p| outcome.pieces.contains(p)));
            assert_valid_set(&outcome.pieces);
            assert_eq!(outcome.complete, expected == 16);
        }
    }

    #[tokio::test]
    async fn last_piece_completes_the_puzzle() {
        let owned: Vec<u8> = (0..15).collect();
        let store = store_with("meera", &owned).await;
        let ledger = PieceAwardLedger::new(store);

        let outcome = ledger.award_random_pieces("meera", DEFAULT_MAX_NEW).await.unwrap();

        assert_eq!(outcome.awarded, vec![15]);
        assert!(outcome.complete);
    }

    #[tokio::test]
    async fn complete_set_is_left_alone() {
        let all: Vec<u8> = (0..PIECE_COUNT).collect();
        let store = store_with("done", &all).await;
        let mut changes = store.subscribe();
        let ledger = PieceAwardLedger::new(store.clone());

        let err = ledger.award_random_pieces("done", DEFAULT_MAX_NEW).await.unwrap_err();

        assert!(matches!(err, Failure::AlreadyComplete));
        let stored = store.find_user("done").await.unwrap().unwrap();
        assert_eq!(stored.pieces, all);
        assert_eq!(stored.version, 1);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let ledger = PieceAwardLedger::new(Arc::new(MemoryStore::new()));
        let err = ledger.award_random_pieces("ghost", 2).await.unwrap_err();
        assert!(matches!(err, Failure::NotFound(_)));
    }

    /// Lets another award land between the ledger's read and its first write.
    struct InterferingStore {
        inner: MemoryStore,
        interfered: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for InterferingStore {
        async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
            self.inner.find_user(username).await
        }

        async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError> {
            self.inner.insert_user(user).await
        }

        async fn list_users(&self) -> Result<Vec<User>, StoreError> {
            self.inner.list_users().await
        }

        async fn update_pieces(
            &self,
            username: &str,
            expected_version: i64,
            pieces: &[u8],
        ) -> Result<bool, StoreError> {
            if self.interfered.fetch_add(1, Ordering::SeqCst) == 0 {
                let current = self.inner.find_user(username).await?.unwrap();
                let mut theirs = current.pieces.clone();
                theirs.push(15);
                assert!(self.inner.update_pieces(username, current.version, &theirs).await?);
            }
            self.inner.update_pieces(username, expected_version, pieces).await
        }

        async fn fragments_for_month(
            &self,
            month: &MonthKey,
        ) -> Result<Vec<JigsawImagePart>, StoreError> {
            self.inner.fragments_for_month(month).await
        }

        async fn write_fragments(&self, parts: &[JigsawImagePart]) -> Result<(), StoreError> {
            self.inner.write_fragments(parts).await
        }

        fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
            self.inner.subscribe()
        }
    }

    #[tokio::test]
    async fn concurrent_award_is_not_lost() {
        let inner = MemoryStore::new();
        inner
            .insert_user(&NewUser {
                username: "asha".into(),
                full_name: "Asha".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        assert!(inner.update_pieces("asha", 0, &[0, 1]).await.unwrap());
        let store = Arc::new(InterferingStore {
            inner,
            interfered: AtomicUsize::new(0),
        });
        let ledger = PieceAwardLedger::new(store.clone());

        let outcome = ledger.award_random_pieces("asha", 1).await.unwrap();

        // the interfering award of piece 15 survives alongside ours
        assert!(outcome.pieces.contains(&15));
        assert!(outcome.pieces.contains(&0) && outcome.pieces.contains(&1));
        assert_eq!(outcome.pieces.len(), 4);
        assert_valid_set(&outcome.pieces);
        let stored = store.find_user("asha").await.unwrap().unwrap();
        assert_eq!(stored.pieces, outcome.pieces);
    }

    #[tokio::test]
    async fn parallel_awards_all_land() {
        let store = store_with("team", &[]).await;
        let ledger = Arc::new(PieceAwardLedger::new(store.clone()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.award_random_pieces("team", 2).await })
            })
            .collect();
        let mut granted = 0;
        for handle in handles {
            granted += handle.await.unwrap().unwrap().awarded.len();
        }

        let stored = store.find_user("team").await.unwrap().unwrap();
        assert_eq!(granted, 8);
        assert_eq!(stored.pieces.len(), 8);
        assert_valid_set(&stored.pieces);
    }
}
