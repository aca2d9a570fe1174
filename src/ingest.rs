//! Document ingestion: walk the documents directory and extract text.
//!
//! Files are classified by extension; unsupported ones are skipped with a
//! notice and files whose absolute path is already in the store are skipped
//! without being read. A file that fails to parse is logged and skipped,
//! never partially ingested, and the walk carries on. A file that loads but
//! holds no text (a scanned PDF, a blank text file, a header-only CSV) is
//! reported as empty and contributes no records.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::DocumentsConfig;
use crate::extract;
use crate::models::{DocumentFormat, RawRecord};

/// Result of one ingestion pass.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Records of newly loaded files, in path order.
    pub records: Vec<RawRecord>,
    pub loaded: Vec<PathBuf>,
    /// Loaded without error but with no extractable text.
    pub empty: Vec<PathBuf>,
    pub skipped_indexed: Vec<PathBuf>,
    pub skipped_unsupported: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Load every supported file under `dir` whose absolute path is not in
/// `indexed`.
pub fn ingest_directory(
    dir: &Path,
    indexed: &HashSet<PathBuf>,
    config: &DocumentsConfig,
) -> Result<IngestOutcome> {
    let mut outcome = IngestOutcome::default();
    if !dir.exists() {
        tracing::info!("documents directory {} does not exist", dir.display());
        return Ok(outcome);
    }

    let root = dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", dir.display()))?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(&root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("cannot read directory entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(&root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            continue;
        }
        files.push(path.to_path_buf());
    }
    files.sort();

    for path in files {
        let name = display_name(&path);

        let Some(format) = DocumentFormat::from_path(&path) else {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default();
            tracing::info!("'{}' files not supported, skipping {}", ext, name);
            outcome.skipped_unsupported.push(path);
            continue;
        };

        if indexed.contains(&path) {
            tracing::info!("Skipping (already indexed): {}", name);
            outcome.skipped_indexed.push(path);
            continue;
        }

        match extract::load_file(&path, format) {
            Ok(records) if records.iter().all(|r| r.text.trim().is_empty()) => {
                tracing::warn!("{} has no extractable text, skipping", name);
                outcome.empty.push(path);
            }
            Ok(records) => {
                tracing::debug!(
                    "loaded {} ({}, {} records)",
                    name,
                    format.as_str(),
                    records.len()
                );
                outcome.records.extend(records);
                outcome.loaded.push(path);
            }
            Err(e) => {
                tracing::warn!("Error loading {}: {}", name, e);
                outcome.failed.push((path, e.to_string()));
            }
        }
    }

    Ok(outcome)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
