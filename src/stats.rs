//! Index statistics and the documents listing.
//!
//! `docqa stats` summarises what is stored: index location and size, chunk
//! totals, a per-document breakdown and the active retrieval settings.
//! `docqa docs` lists the documents directory and marks what is indexed.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use walkdir::WalkDir;

use crate::app::Assistant;
use crate::models::DocumentFormat;

pub struct IndexStats {
    pub index_path: PathBuf,
    pub index_bytes: u64,
    pub total_chunks: i64,
    pub per_source: Vec<(PathBuf, i64)>,
    pub embedding_model: String,
    pub embedding_dims: usize,
}

pub async fn collect_stats(assistant: &Assistant) -> Result<IndexStats> {
    let index_path = assistant.config().paths.index_path();
    let index_bytes = std::fs::metadata(&index_path)
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(IndexStats {
        index_bytes,
        index_path,
        total_chunks: assistant.store().count().await?,
        per_source: assistant.store().source_counts().await?,
        embedding_model: assistant.embedder().model_name().to_string(),
        embedding_dims: assistant.embedder().dims(),
    })
}

pub fn render_stats(stats: &IndexStats, assistant: &Assistant) -> String {
    let retrieval = &assistant.config().retrieval;
    let llm = &assistant.config().llm;
    let mut out = String::new();

    out.push_str("Document Q&A: index stats\n");
    out.push_str("=========================\n\n");
    out.push_str(&format!("  Index:       {}\n", stats.index_path.display()));
    out.push_str(&format!("  Size:        {}\n\n", format_bytes(stats.index_bytes)));
    out.push_str(&format!("  Chunks:      {}\n", stats.total_chunks));
    out.push_str(&format!("  Documents:   {}\n", stats.per_source.len()));
    out.push_str(&format!(
        "  Embeddings:  {} ({} dims)\n",
        stats.embedding_model, stats.embedding_dims
    ));
    out.push_str(&format!("  Model:       {} at {}\n", llm.model, llm.url));
    out.push_str(&format!(
        "  Retrieval:   MMR k={} fetch_k={} lambda={}\n",
        retrieval.k, retrieval.fetch_k, retrieval.lambda_mult
    ));

    if !stats.per_source.is_empty() {
        out.push_str("\n  By document:\n");
        out.push_str(&format!("  {:<48} {:>8}\n", "DOCUMENT", "CHUNKS"));
        out.push_str(&format!("  {}\n", "-".repeat(57)));
        for (source, count) in &stats.per_source {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| source.display().to_string());
            out.push_str(&format!("  {:<48} {:>8}\n", name, count));
        }
    }

    out
}

/// A file in the documents directory.
pub struct DocEntry {
    pub path: PathBuf,
    pub bytes: u64,
    pub supported: bool,
    pub indexed: bool,
}

/// Visible files in the documents directory, sorted by path.
pub async fn list_documents(assistant: &Assistant) -> Result<Vec<DocEntry>> {
    let dir = assistant.config().paths.documents_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let indexed: HashSet<PathBuf> = assistant.store().indexed_sources().await?;
    let root = dir.canonicalize()?;

    let mut entries = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let hidden = entry
            .path()
            .strip_prefix(&root)
            .unwrap_or(entry.path())
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'));
        if hidden {
            continue;
        }
        let path = entry.path().to_path_buf();
        entries.push(DocEntry {
            bytes: entry.metadata().map(|m| m.len()).unwrap_or(0),
            supported: DocumentFormat::from_path(&path).is_some(),
            indexed: indexed.contains(&path),
            path,
        });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

pub fn render_documents(entries: &[DocEntry]) -> String {
    if entries.is_empty() {
        return "No documents uploaded yet.\n".to_string();
    }
    let mut out = String::new();
    for e in entries {
        let mark = if e.indexed {
            "indexed"
        } else if e.supported {
            "pending"
        } else {
            "unsupported"
        };
        let name = e
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        out.push_str(&format!(
            "  {:<12} {:<48} {:>10}\n",
            mark,
            name,
            format_bytes(e.bytes)
        ));
    }
    out
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
