//! # docqa CLI
//!
//! ## Usage
//!
//! ```bash
//! docqa [--config ./config/docqa.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the documents folder and the index |
//! | `docqa index` | Index new files in the documents folder |
//! | `docqa upload <file>...` | Copy files into the documents folder and index them |
//! | `docqa ask "<question>"` | Answer one question and exit |
//! | `docqa chat` | Interactive question/answer session |
//! | `docqa stats` | Index statistics |
//! | `docqa docs` | List the documents folder |

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use docqa::answer::AskError;
use docqa::app::Assistant;
use docqa::config::{self, Config};
use docqa::progress::ProgressMode;
use docqa::session::{render_turn, Session};
use docqa::{chat, db, indexer, logging, migrate, stats};

const DEFAULT_CONFIG: &str = "./config/docqa.toml";

/// Ask questions about your documents, answered by a local language model.
#[derive(Parser)]
#[command(name = "docqa", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docqa.toml`; if that file does not exist,
    /// built-in defaults rooted at the current directory are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the documents folder and the index. Safe to run repeatedly.
    Init,

    /// Index files in the documents folder that are not indexed yet.
    Index {
        /// Progress on stderr: `off`, `human` or `json`. Defaults to human on a TTY.
        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,
    },

    /// Copy files into the documents folder, then index.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,
    },

    /// Answer a single question.
    Ask {
        question: String,
    },

    /// Start an interactive session.
    Chat,

    /// Show index statistics.
    Stats,

    /// List documents and whether they are indexed.
    Docs,
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(s).ok_or_else(|| format!("unknown progress mode '{}'", s))
}

fn load(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => config::load_config(path),
        None => config::load_or_default(&PathBuf::from(DEFAULT_CONFIG)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load(&cli)?;
    logging::init(&cfg.logging, cli.verbose);

    match cli.command {
        Commands::Init => {
            let docs = cfg.paths.documents_dir();
            std::fs::create_dir_all(&docs)?;
            let pool = db::connect(&cfg.paths.index_path()).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Documents folder: {}", docs.display());
            println!("Index:            {}", cfg.paths.index_path().display());
            println!("Initialized successfully.");
        }
        Commands::Index { progress } => {
            let assistant = Assistant::open(&cfg).await?;
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let report =
                indexer::process_documents(&cfg, assistant.store(), mode.reporter().as_ref())
                    .await;
            assistant.close().await;
            let report = report?;
            println!(
                "index: {} documents added ({} chunks), {} already indexed, {} without text, {} unsupported, {} failed",
                report.documents_added(),
                report.chunks_added,
                report.ingest.skipped_indexed.len(),
                report.ingest.empty.len(),
                report.ingest.skipped_unsupported.len(),
                report.ingest.failed.len()
            );
        }
        Commands::Upload { files, progress } => {
            let session = Session::new(Assistant::open(&cfg).await?);
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let report = session.upload(&files, mode.reporter().as_ref()).await;
            session.close().await;
            let report = report?;
            println!(
                "upload: {} saved, {} rejected; {} documents indexed ({} chunks)",
                report.copied.len(),
                report.rejected.len(),
                report.index.documents_added(),
                report.index.chunks_added
            );
        }
        Commands::Ask { question } => {
            let mut session = Session::new(Assistant::open(&cfg).await?);
            let result = session.ask(&question).await;
            session.close().await;
            match result {
                Ok(turn) => print!("{}", render_turn(&turn)),
                Err(AskError::ModelUnreachable { url }) => {
                    anyhow::bail!(
                        "Cannot connect to Ollama at {}. Make sure Ollama is running (`ollama serve`).",
                        url
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Chat => {
            let session = Session::new(Assistant::open(&cfg).await?);
            chat::run_chat(session, ProgressMode::default_for_tty()).await?;
        }
        Commands::Stats => {
            let assistant = Assistant::open(&cfg).await?;
            let s = stats::collect_stats(&assistant).await;
            if let Ok(s) = &s {
                print!("{}", stats::render_stats(s, &assistant));
            }
            assistant.close().await;
            s?;
        }
        Commands::Docs => {
            let assistant = Assistant::open(&cfg).await?;
            let entries = stats::list_documents(&assistant).await;
            assistant.close().await;
            print!("{}", stats::render_documents(&entries?));
        }
    }

    Ok(())
}
