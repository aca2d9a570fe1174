//! Explicitly constructed services shared by every command.
//!
//! [`Assistant::open`] builds the store, embedder and model client once;
//! commands borrow them and [`Assistant::close`] releases the database pool.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::answer::AnswerComposer;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, Embedder};
use crate::llm::{ChatModel, OllamaChat};
use crate::migrate;
use crate::retrieve::Retriever;
use crate::store::{SqliteVectorStore, StoreLimits, VectorStore};

pub struct Assistant {
    config: Config,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    composer: AnswerComposer,
}

impl Assistant {
    /// Create the documents directory, open (and migrate) the index and
    /// build the embedding and chat clients.
    pub async fn open(config: &Config) -> Result<Self> {
        let docs = config.paths.documents_dir();
        std::fs::create_dir_all(&docs)
            .with_context(|| format!("Failed to create {}", docs.display()))?;

        let pool = db::connect(&config.paths.index_path()).await?;
        migrate::run_migrations(&pool).await?;

        let embedder = embedding::create_embedder(&config.embedding)?;
        let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(
            pool,
            embedder.clone(),
            StoreLimits {
                max_batch_items: config.indexing.max_batch_items,
                embed_batch_size: config.embedding.batch_size,
            },
        ));
        let model: Arc<dyn ChatModel> = Arc::new(OllamaChat::new(&config.llm)?);

        tracing::debug!(
            "opened index {} (embeddings: {}, model: {})",
            config.paths.index_path().display(),
            embedder.model_name(),
            model.model_name()
        );
        Ok(Self::from_parts(config.clone(), store, embedder, model))
    }

    /// Assemble an assistant from ready-made services.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        let retriever = Retriever::new(store.clone(), embedder.clone(), config.retrieval.clone());
        Self {
            composer: AnswerComposer::new(retriever, model),
            config,
            store,
            embedder,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn composer(&self) -> &AnswerComposer {
        &self.composer
    }

    pub async fn close(self) {
        self.store.close().await;
    }
}
