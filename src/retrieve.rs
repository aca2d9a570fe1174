//! Query-time retrieval with maximal marginal relevance.
//!
//! Every query is embedded afresh, the store returns the `fetch_k` nearest
//! chunks, and [`mmr_select`] keeps `k` of them, trading similarity to the
//! query against similarity to chunks already picked:
//!
//! ```text
//! mmr(d) = λ · sim(q, d) − (1 − λ) · max sim(d, s)   for s in selected
//! ```
//!
//! The first pick is always the most similar candidate.

use std::sync::Arc;

use anyhow::Result;

use crate::config::RetrievalConfig;
use crate::embedding::{cosine_similarity, Embedder};
use crate::models::RetrievedChunk;
use crate::store::{Candidate, VectorStore};

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn settings(&self) -> &RetrievalConfig {
        &self.config
    }

    /// At most `k` chunks relevant to `query`, most relevant first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_query(query).await?;
        let hits = self
            .store
            .query(
                &query_vec,
                self.config.k,
                self.config.fetch_k,
                self.config.lambda_mult,
            )
            .await?;

        tracing::debug!(
            "retrieved {} chunks (k={}, fetch_k={}, lambda={})",
            hits.len(),
            self.config.k,
            self.config.fetch_k,
            self.config.lambda_mult
        );
        Ok(hits)
    }
}

/// Pick up to `k` candidates by maximal marginal relevance, in pick order.
pub fn mmr_select(
    query: &[f32],
    candidates: Vec<Candidate>,
    k: usize,
    lambda: f32,
) -> Vec<RetrievedChunk> {
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query, &c.embedding))
        .collect();

    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &i) in remaining.iter().enumerate() {
            let score = if selected.is_empty() {
                relevance[i]
            } else {
                let redundancy = selected
                    .iter()
                    .map(|&j| cosine_similarity(&candidates[i].embedding, &candidates[j].embedding))
                    .fold(f32::NEG_INFINITY, f32::max);
                lambda * relevance[i] - (1.0 - lambda) * redundancy
            };
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    selected
        .into_iter()
        .filter_map(|i| {
            slots[i].take().map(|c| RetrievedChunk {
                chunk: c.chunk,
                score: relevance[i],
            })
        })
        .collect()
}
