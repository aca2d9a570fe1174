//! Deduplicating indexer: ingest new files, split, store in bounded batches.
//!
//! Deduplication is by absolute source path: the set of paths already in the
//! store is read first and handed to the ingestor, so a file that has been
//! indexed once is never read again. Editing an indexed file does not
//! re-index it.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;

use crate::chunk::split_records;
use crate::config::Config;
use crate::ingest::{self, IngestOutcome};
use crate::models::RawRecord;
use crate::progress::{IndexProgressEvent, IndexProgressReporter};
use crate::store::VectorStore;

#[derive(Debug, Default)]
pub struct IndexReport {
    pub ingest: IngestOutcome,
    pub chunks_added: usize,
    pub batches: usize,
    /// Distinct sources with at least one stored chunk.
    pub documents_stored: usize,
}

impl IndexReport {
    pub fn documents_added(&self) -> usize {
        self.documents_stored
    }
}

/// Index every new document under the configured documents directory.
pub async fn process_documents(
    config: &Config,
    store: &dyn VectorStore,
    progress: &dyn IndexProgressReporter,
) -> Result<IndexReport> {
    let dir = config.paths.documents_dir();
    let indexed = store.indexed_sources().await?;
    let mut outcome = ingest::ingest_directory(&dir, &indexed, &config.documents)?;

    let records = std::mem::take(&mut outcome.records);
    let mut report = index_records(config, store, &records, &dir, progress).await?;
    report.ingest = outcome;
    Ok(report)
}

/// Split `records` and store the chunks in batches of `indexing.batch_size`.
pub async fn index_records(
    config: &Config,
    store: &dyn VectorStore,
    records: &[RawRecord],
    dir: &Path,
    progress: &dyn IndexProgressReporter,
) -> Result<IndexReport> {
    let mut report = IndexReport::default();
    if records.is_empty() {
        tracing::info!(
            "No new documents to process. Add files to {}",
            dir.display()
        );
        return Ok(report);
    }

    let chunks = split_records(
        records,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    );
    let documents = records
        .iter()
        .map(|r| &r.source)
        .collect::<HashSet<_>>()
        .len();
    progress.report(IndexProgressEvent::Split {
        documents: documents as u64,
        chunks: chunks.len() as u64,
    });
    tracing::info!(
        "Split {} documents into {} chunks",
        documents,
        chunks.len()
    );

    let batch_size = config
        .indexing
        .batch_size
        .min(store.max_batch_items())
        .max(1);
    let total = chunks.len() as u64;
    let mut stored = HashSet::new();

    for (i, batch) in chunks.chunks(batch_size).enumerate() {
        tracing::debug!("Processing batch {} ({} chunks)", i + 1, batch.len());
        report.chunks_added += store.add(batch).await?;
        report.batches += 1;
        stored.extend(batch.iter().map(|c| c.source.as_path()));
        report.documents_stored = stored.len();
        progress.report(IndexProgressEvent::Batch {
            index: (i + 1) as u64,
            chunks: batch.len() as u64,
            done: report.chunks_added as u64,
            total,
        });
    }

    tracing::info!(
        "Indexed {} chunks in {} batches",
        report.chunks_added,
        report.batches
    );
    Ok(report)
}
