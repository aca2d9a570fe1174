//! TOML configuration.
//!
//! Every section has defaults, so an empty file (or no file at all at the
//! default location) yields a working local setup: documents in
//! `./documents`, the index in `./vector_db/index.sqlite`, embeddings from
//! the bundled local model and answers from Ollama's `llama3.1`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub documents: DocumentsConfig,
    pub chunking: ChunkingConfig,
    pub indexing: IndexingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// Project root. Relative directories below are resolved against it.
    pub root: PathBuf,
    pub documents_dir: PathBuf,
    pub persist_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            documents_dir: PathBuf::from("documents"),
            persist_dir: PathBuf::from("vector_db"),
        }
    }
}

impl PathsConfig {
    pub fn documents_dir(&self) -> PathBuf {
        self.resolve(&self.documents_dir)
    }

    pub fn persist_dir(&self) -> PathBuf {
        self.resolve(&self.persist_dir)
    }

    /// SQLite file holding the vector index.
    pub fn index_path(&self) -> PathBuf {
        self.persist_dir().join("index.sqlite")
    }

    fn resolve(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root.join(dir)
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Glob patterns (relative to the documents dir) that are never ingested.
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            exclude_globs: vec!["**/.*".to_string(), ".*".to_string()],
            follow_symlinks: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexingConfig {
    /// Chunks handed to the store per `add` call.
    pub batch_size: usize,
    /// Hard per-call item limit enforced by the store.
    pub max_batch_items: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            max_batch_items: 5461,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks handed to the language model.
    pub k: usize,
    /// Nearest-neighbour candidates considered by MMR.
    pub fetch_k: usize,
    /// MMR trade-off: 1.0 is pure relevance, 0.0 pure diversity.
    pub lambda_mult: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 3,
            fetch_k: 10,
            lambda_mult: 0.6,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `local` (fastembed) or `ollama`.
    pub provider: String,
    pub model: Option<String>,
    pub dims: Option<usize>,
    pub url: Option<String>,
    /// Texts per embedding call.
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 3,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub url: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.1".to_string(),
            url: "http://localhost:11434".to_string(),
            temperature: 0.0,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Load and validate a config file.
///
/// When `paths.root` is relative it is taken relative to the directory that
/// contains the config file, so a project can be moved as a unit.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.paths.root.is_relative() {
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        config.paths.root = base.join(&config.paths.root);
    }

    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists; otherwise fall back to defaults rooted at the
/// current directory. Only used for the default config location.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path);
    }
    let config = Config::default();
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let chunking = &config.chunking;
    if chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if chunking.chunk_overlap >= chunking.chunk_size {
        bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            chunking.chunk_overlap,
            chunking.chunk_size
        );
    }

    let indexing = &config.indexing;
    if indexing.batch_size == 0 {
        bail!("indexing.batch_size must be > 0");
    }
    if indexing.batch_size > indexing.max_batch_items {
        bail!(
            "indexing.batch_size ({}) exceeds indexing.max_batch_items ({})",
            indexing.batch_size,
            indexing.max_batch_items
        );
    }

    let retrieval = &config.retrieval;
    if retrieval.k == 0 {
        bail!("retrieval.k must be >= 1");
    }
    if retrieval.k > retrieval.fetch_k {
        bail!(
            "retrieval.k ({}) must not exceed retrieval.fetch_k ({})",
            retrieval.k,
            retrieval.fetch_k
        );
    }
    if !(0.0..=1.0).contains(&retrieval.lambda_mult) {
        bail!("retrieval.lambda_mult must be in [0.0, 1.0]");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "local" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local or ollama.",
            other
        ),
    }
    if config.embedding.provider == "ollama" && config.embedding.model.is_none() {
        bail!("embedding.model must be specified when provider is 'ollama'");
    }

    if config.llm.provider != "ollama" {
        bail!(
            "Unknown llm provider: '{}'. Only ollama is supported.",
            config.llm.provider
        );
    }
    if config.llm.temperature < 0.0 {
        bail!("llm.temperature must be >= 0");
    }

    Ok(())
}
