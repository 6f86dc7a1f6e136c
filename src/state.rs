use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::genai::{http_client, ClipdropClient, GeminiClient, ImageGenerator, PromptGenerator};
use crate::leaderboard::LeaderboardFeed;
use crate::pieces::ledger::PieceAwardLedger;
use crate::puzzle::cache::MonthlyImageCache;
use crate::store::{DocumentStore, MemoryStore, PgStore, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub jwt: Arc<JwtKeys>,
    pub cache: Arc<MonthlyImageCache>,
    pub ledger: Arc<PieceAwardLedger>,
    pub leaderboard: LeaderboardFeed,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => {
                let store = PgStore::connect(url, 10).await?;
                if let Err(e) = store.migrate().await {
                    warn!(error = %e, "migrations failed; continuing");
                }
                if let Err(e) = store.listen().await {
                    warn!(error = %e, "cannot listen for changes from other instances");
                }
                info!("using postgres store");
                Arc::new(store)
            }
            None => {
                warn!("DATABASE_URL not set, data lives in memory only");
                Arc::new(MemoryStore::new())
            }
        };

        let client = http_client(config.genai.timeout)?;
        let prompts = Arc::new(GeminiClient::new(client.clone(), &config.genai));
        let images = Arc::new(ClipdropClient::new(client, &config.genai));

        Ok(Self::from_parts(config, store, prompts, images).await?)
    }

    pub async fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn DocumentStore>,
        prompts: Arc<dyn PromptGenerator>,
        images: Arc<dyn ImageGenerator>,
    ) -> Result<Self, StoreError> {
        let cache = Arc::new(MonthlyImageCache::new(
            store.clone(),
            prompts,
            images,
            config.genai.timeout,
        ));
        let ledger = Arc::new(PieceAwardLedger::new(store.clone()));
        let leaderboard = LeaderboardFeed::start(store.clone()).await?;
        let jwt = Arc::new(JwtKeys::from_config(&config.jwt));

        Ok(Self {
            config,
            store,
            jwt,
            cache,
            ledger,
            leaderboard,
        })
    }

    /// In-memory state with fake generators that answer instantly.
    #[cfg(test)]
    pub async fn fake() -> Self {
        use crate::genai::fake::{FakeImages, FakePrompts};

        Self::from_parts(
            Arc::new(AppConfig::test()),
            Arc::new(MemoryStore::new()),
            Arc::new(FakePrompts::replying("Autumn leaves over a quiet lake")),
            Arc::new(FakeImages::png()),
        )
        .await
        .expect("memory store never fails")
    }
}
