//! Service wiring.
//!
//! Every entry point (ingestion, query, stats, HTTP handlers) receives a
//! [`Services`] handle instead of reaching for process-wide singletons.
//! Cloning is cheap; all members are reference-counted.

use std::sync::Arc;

use anyhow::Result;

use code_rag_core::embedding::EmbeddingProvider;
use code_rag_core::generate::Generator;
use code_rag_core::jobs::JobStore;
use code_rag_core::session::SessionStore;
use code_rag_core::store::HybridIndex;

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::generator::create_generator;
use crate::jobs::SqliteJobStore;
use crate::migrate;
use crate::sessions::SqliteSessionStore;
use crate::sqlite_store::SqliteIndex;

#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub index: Arc<dyn HybridIndex>,
    pub sessions: Arc<dyn SessionStore>,
    pub jobs: Arc<dyn JobStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn Generator>,
}

impl Services {
    pub fn new(
        config: Config,
        index: Arc<dyn HybridIndex>,
        sessions: Arc<dyn SessionStore>,
        jobs: Arc<dyn JobStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            index,
            sessions,
            jobs,
            embedder,
            generator,
        }
    }

    /// SQLite-backed stores plus the configured providers.
    ///
    /// Runs migrations, so a fresh database path works without `crag init`.
    pub async fn from_config(config: Config) -> Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::migrate_pool(&pool).await?;

        let embedder = create_provider(&config.embedding)?;
        let generator = create_generator(&config.generator)?;
        let weights = config.retrieval.hybrid_weights();

        Ok(Self::new(
            config,
            Arc::new(SqliteIndex::new(pool.clone(), weights)),
            Arc::new(SqliteSessionStore::new(pool.clone())),
            Arc::new(SqliteJobStore::new(pool)),
            embedder,
            generator,
        ))
    }
}
