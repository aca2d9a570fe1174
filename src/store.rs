//! Persistent vector store.
//!
//! [`VectorStore`] is the seam between indexing/retrieval and storage. It
//! owns the embedding step on the write path: `add` takes plain chunks,
//! embeds them with the injected [`Embedder`] and persists text, vector and
//! metadata together.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`add`](VectorStore::add) | Embed and persist one batch of chunks |
//! | [`metadata`](VectorStore::metadata) | Metadata of every stored entry |
//! | [`indexed_sources`](VectorStore::indexed_sources) | Distinct source paths, for dedup |
//! | [`nearest`](VectorStore::nearest) | Top `fetch_k` entries by cosine similarity |
//! | [`query`](VectorStore::query) | `nearest` followed by MMR selection of `k` |
//!
//! [`SqliteVectorStore`] keeps everything in one SQLite file; search is a
//! brute-force scan, which is plenty for a personal document folder.
//! [`InMemoryVectorStore`] backs tests.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::embedding::{self, Embedder};
use crate::models::{Chunk, EntryMetadata, RetrievedChunk};
use crate::retrieve;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("batch of {len} chunks exceeds the store limit of {max} items per call")]
    BatchTooLarge { len: usize, max: usize },
    #[error("embedder returned {got} vectors for {expected} chunks")]
    EmbeddingCount { expected: usize, got: usize },
}

/// A nearest-neighbour hit together with its stored vector (needed by MMR).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Largest number of chunks accepted by a single [`add`](VectorStore::add).
    fn max_batch_items(&self) -> usize;

    /// Embed and persist `chunks`; returns once they are durable.
    async fn add(&self, chunks: &[Chunk]) -> Result<usize>;

    /// Metadata of every stored entry.
    async fn metadata(&self) -> Result<Vec<EntryMetadata>>;

    /// Distinct source paths present in the store.
    async fn indexed_sources(&self) -> Result<HashSet<PathBuf>> {
        Ok(self.metadata().await?.into_iter().map(|m| m.source).collect())
    }

    /// Entry count per source path, ordered by path.
    async fn source_counts(&self) -> Result<Vec<(PathBuf, i64)>> {
        let mut counts: BTreeMap<PathBuf, i64> = BTreeMap::new();
        for m in self.metadata().await? {
            *counts.entry(m.source).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn count(&self) -> Result<i64>;

    /// The `fetch_k` most similar entries, best first.
    async fn nearest(&self, query: &[f32], fetch_k: usize) -> Result<Vec<Candidate>>;

    /// Up to `k` entries chosen by maximal marginal relevance among the
    /// `fetch_k` nearest. `lambda` = 1.0 ranks purely by relevance.
    async fn query(
        &self,
        query: &[f32],
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<RetrievedChunk>> {
        let candidates = self.nearest(query, fetch_k.max(k)).await?;
        Ok(retrieve::mmr_select(query, candidates, k, lambda))
    }

    /// Release resources. The store must not be used afterwards.
    async fn close(&self) {}
}

fn check_batch(len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(StoreError::BatchTooLarge { len, max }.into());
    }
    Ok(())
}

/// Embed `chunks` in sub-batches of `embed_batch_size` texts.
async fn embed_chunks(
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    embed_batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(embed_batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        vectors.extend(embedder.embed(&texts).await?);
    }
    if vectors.len() != chunks.len() {
        return Err(StoreError::EmbeddingCount {
            expected: chunks.len(),
            got: vectors.len(),
        }
        .into());
    }
    Ok(vectors)
}

fn rank(mut candidates: Vec<Candidate>, fetch_k: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(fetch_k);
    candidates
}

// ============ SQLite ============

/// Limits applied by a store.
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    pub max_batch_items: usize,
    /// Texts sent to the embedder per call.
    pub embed_batch_size: usize,
}

pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    limits: StoreLimits,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>, limits: StoreLimits) -> Self {
        Self {
            pool,
            embedder,
            limits,
        }
    }
}

fn page_from_db(page: Option<i64>) -> Option<u32> {
    page.and_then(|p| u32::try_from(p).ok())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn max_batch_items(&self) -> usize {
        self.limits.max_batch_items
    }

    async fn add(&self, chunks: &[Chunk]) -> Result<usize> {
        check_batch(chunks.len(), self.limits.max_batch_items)?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors =
            embed_chunks(self.embedder.as_ref(), chunks, self.limits.embed_batch_size).await?;
        let model = self.embedder.model_name().to_string();
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO entries (id, source, page, chunk_index, start_char, text, hash,
                                     model, dims, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(chunk.source.to_string_lossy().to_string())
            .bind(chunk.page.map(i64::from))
            .bind(chunk.chunk_index)
            .bind(chunk.start_char)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(&model)
            .bind(vector.len() as i64)
            .bind(embedding::vec_to_blob(vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(chunks.len())
    }

    async fn metadata(&self) -> Result<Vec<EntryMetadata>> {
        let rows = sqlx::query(
            "SELECT id, source, page, chunk_index FROM entries ORDER BY source, page, chunk_index",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| EntryMetadata {
                id: row.get("id"),
                source: PathBuf::from(row.get::<String, _>("source")),
                page: page_from_db(row.get("page")),
                chunk_index: row.get("chunk_index"),
            })
            .collect())
    }

    async fn indexed_sources(&self) -> Result<HashSet<PathBuf>> {
        let sources: Vec<String> = sqlx::query_scalar("SELECT DISTINCT source FROM entries")
            .fetch_all(&self.pool)
            .await?;
        Ok(sources.into_iter().map(PathBuf::from).collect())
    }

    async fn source_counts(&self) -> Result<Vec<(PathBuf, i64)>> {
        let rows = sqlx::query(
            "SELECT source, COUNT(*) AS n FROM entries GROUP BY source ORDER BY source",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| (PathBuf::from(row.get::<String, _>("source")), row.get::<i64, _>("n")))
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn nearest(&self, query: &[f32], fetch_k: usize) -> Result<Vec<Candidate>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source, page, chunk_index, start_char, text, hash, embedding
            FROM entries
            WHERE dims = ?
            "#,
        )
        .bind(query.len() as i64)
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = embedding::blob_to_vec(&blob);
                let score = embedding::cosine_similarity(query, &vector);
                Candidate {
                    chunk: Chunk {
                        id: row.get("id"),
                        source: PathBuf::from(row.get::<String, _>("source")),
                        page: page_from_db(row.get("page")),
                        chunk_index: row.get("chunk_index"),
                        start_char: row.get("start_char"),
                        text: row.get("text"),
                        hash: row.get("hash"),
                    },
                    embedding: vector,
                    score,
                }
            })
            .collect();

        Ok(rank(candidates, fetch_k))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// ============ In-memory ============

/// Non-persistent store with the same semantics as [`SqliteVectorStore`].
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<(Chunk, Vec<f32>)>>,
    embedder: Arc<dyn Embedder>,
    limits: StoreLimits,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>, limits: StoreLimits) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            embedder,
            limits,
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<(Chunk, Vec<f32>)>>> {
        self.entries
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn max_batch_items(&self) -> usize {
        self.limits.max_batch_items
    }

    async fn add(&self, chunks: &[Chunk]) -> Result<usize> {
        check_batch(chunks.len(), self.limits.max_batch_items)?;
        let vectors =
            embed_chunks(self.embedder.as_ref(), chunks, self.limits.embed_batch_size).await?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        entries.extend(chunks.iter().cloned().zip(vectors));
        Ok(chunks.len())
    }

    async fn metadata(&self) -> Result<Vec<EntryMetadata>> {
        Ok(self
            .read()?
            .iter()
            .map(|(c, _)| EntryMetadata {
                id: c.id.clone(),
                source: c.source.clone(),
                page: c.page,
                chunk_index: c.chunk_index,
            })
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.read()?.len() as i64)
    }

    async fn nearest(&self, query: &[f32], fetch_k: usize) -> Result<Vec<Candidate>> {
        let candidates = self
            .read()?
            .iter()
            .filter(|(_, v)| v.len() == query.len())
            .map(|(c, v)| Candidate {
                chunk: c.clone(),
                embedding: v.clone(),
                score: embedding::cosine_similarity(query, v),
            })
            .collect();
        Ok(rank(candidates, fetch_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::split_record;
    use crate::models::RawRecord;

    /// Embeds text as counts of a few marker words.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword-test"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    ["apple", "boat", "cloud"]
                        .iter()
                        .map(|w| t.matches(w).count() as f32 + 0.01)
                        .collect()
                })
                .collect())
        }
    }

    fn limits(max: usize) -> StoreLimits {
        StoreLimits {
            max_batch_items: max,
            embed_batch_size: 2,
        }
    }

    fn chunks_for(path: &str, text: &str) -> Vec<Chunk> {
        split_record(
            &RawRecord {
                source: PathBuf::from(path),
                page: None,
                text: text.to_string(),
            },
            800,
            100,
        )
    }

    async fn sqlite_store(max: usize) -> (tempfile::TempDir, SqliteVectorStore) {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = crate::db::connect(&tmp.path().join("index.sqlite"))
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        (tmp, SqliteVectorStore::new(pool, Arc::new(KeywordEmbedder), limits(max)))
    }

    #[tokio::test]
    async fn sqlite_add_and_search() {
        let (_tmp, store) = sqlite_store(10).await;
        let mut chunks = chunks_for("/docs/fruit.txt", "apple apple apple");
        chunks.extend(chunks_for("/docs/sea.txt", "boat boat on the water"));
        chunks.extend(chunks_for("/docs/sky.txt", "cloud over the cloud"));
        assert_eq!(store.add(&chunks).await.unwrap(), 3);
        assert_eq!(store.count().await.unwrap(), 3);

        let hits = store.nearest(&[0.0, 1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.source, PathBuf::from("/docs/sea.txt"));
        assert_eq!(hits[0].chunk.text, "boat boat on the water");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn sqlite_reports_sources_and_metadata() {
        let (_tmp, store) = sqlite_store(10).await;
        store
            .add(&chunks_for("/docs/a.txt", "apple"))
            .await
            .unwrap();
        store
            .add(&chunks_for("/docs/b.txt", "boat"))
            .await
            .unwrap();

        let sources = store.indexed_sources().await.unwrap();
        assert!(sources.contains(&PathBuf::from("/docs/a.txt")));
        assert!(sources.contains(&PathBuf::from("/docs/b.txt")));
        assert_eq!(store.metadata().await.unwrap().len(), 2);
        assert_eq!(
            store.source_counts().await.unwrap(),
            vec![
                (PathBuf::from("/docs/a.txt"), 1),
                (PathBuf::from("/docs/b.txt"), 1)
            ]
        );
    }

    #[tokio::test]
    async fn oversized_batch_rejected() {
        let (_tmp, store) = sqlite_store(1).await;
        let mut chunks = chunks_for("/docs/a.txt", "apple");
        chunks.extend(chunks_for("/docs/b.txt", "boat"));
        let err = store.add(&chunks).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::BatchTooLarge { len: 2, max: 1 })
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sqlite_persists_across_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        {
            let pool = crate::db::connect(&path).await.unwrap();
            crate::migrate::run_migrations(&pool).await.unwrap();
            let store = SqliteVectorStore::new(pool, Arc::new(KeywordEmbedder), limits(10));
            store.add(&chunks_for("/docs/a.txt", "apple")).await.unwrap();
            store.close().await;
        }
        let pool = crate::db::connect(&path).await.unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        let store = SqliteVectorStore::new(pool, Arc::new(KeywordEmbedder), limits(10));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn in_memory_query_respects_k() {
        let store = InMemoryVectorStore::new(Arc::new(KeywordEmbedder), limits(100));
        for (i, text) in ["apple", "apple boat", "boat", "cloud", "apple cloud"]
            .iter()
            .enumerate()
        {
            store
                .add(&chunks_for(&format!("/docs/{}.txt", i), text))
                .await
                .unwrap();
        }
        let hits = store.query(&[1.0, 0.0, 0.0], 2, 4, 0.5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "apple");
    }
}
