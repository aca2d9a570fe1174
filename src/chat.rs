//! Interactive chat loop on stdin/stdout.
//!
//! Every line that is not a `/command` is a question.

use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::answer::AskError;
use crate::progress::ProgressMode;
use crate::session::{render_turn, Session};
use crate::stats;

const HELP: &str = "\
Commands:
  /upload <path>...   copy files into the documents folder and index them
  /index              index new files already in the documents folder
  /history            show this conversation
  /clear              clear the conversation
  /stats              index statistics
  /docs               list documents
  /settings           retrieval and model settings
  /help               this help
  /quit               leave
Anything else is a question about your documents.";

enum Command<'a> {
    Upload(Vec<&'a str>),
    Index,
    History,
    Clear,
    Stats,
    Docs,
    Settings,
    Help,
    Quit,
    Unknown(&'a str),
    Ask(&'a str),
    Empty,
}

fn parse_line(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Ask(line);
    };
    let mut parts = rest.split_whitespace();
    match parts.next().unwrap_or_default() {
        "upload" => Command::Upload(parts.collect()),
        "index" => Command::Index,
        "history" => Command::History,
        "clear" => Command::Clear,
        "stats" => Command::Stats,
        "docs" => Command::Docs,
        "settings" => Command::Settings,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other),
    }
}

pub async fn run_chat(mut session: Session, progress: ProgressMode) -> Result<()> {
    let reporter = progress.reporter();
    println!("Document Q&A. Ask about your documents, /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if atty::is(atty::Stream::Stdout) {
            print!("> ");
            use std::io::Write;
            let _ = std::io::stdout().flush();
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_line(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Unknown(cmd) => println!("Unknown command /{}. Try /help.", cmd),
            Command::Clear => {
                session.clear();
                println!("Conversation cleared.");
            }
            Command::History => {
                if session.log().turns().is_empty() {
                    println!("No questions yet.");
                }
                for turn in session.log().turns() {
                    println!("{}", render_turn(turn));
                }
            }
            Command::Settings => {
                let cfg = session.assistant().config();
                println!(
                    "Retrieval: MMR k={} fetch_k={} lambda={}",
                    cfg.retrieval.k, cfg.retrieval.fetch_k, cfg.retrieval.lambda_mult
                );
                println!(
                    "Chunking: {} chars, {} overlap",
                    cfg.chunking.chunk_size, cfg.chunking.chunk_overlap
                );
                println!(
                    "Model: {} at {} (temperature {})",
                    cfg.llm.model, cfg.llm.url, cfg.llm.temperature
                );
            }
            Command::Stats => match stats::collect_stats(session.assistant()).await {
                Ok(s) => print!("{}", stats::render_stats(&s, session.assistant())),
                Err(e) => eprintln!("Error: {:#}", e),
            },
            Command::Docs => match stats::list_documents(session.assistant()).await {
                Ok(entries) => print!("{}", stats::render_documents(&entries)),
                Err(e) => eprintln!("Error: {:#}", e),
            },
            Command::Index => match session.index(reporter.as_ref()).await {
                Ok(report) => println!(
                    "Indexed {} documents ({} chunks).",
                    report.documents_added(),
                    report.chunks_added
                ),
                Err(e) => eprintln!("Error: {:#}", e),
            },
            Command::Upload(paths) => {
                if paths.is_empty() {
                    println!("Usage: /upload <path>...");
                    continue;
                }
                let files: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
                match session.upload(&files, reporter.as_ref()).await {
                    Ok(report) => println!(
                        "Saved {} files, indexed {} documents ({} chunks).",
                        report.copied.len(),
                        report.index.documents_added(),
                        report.index.chunks_added
                    ),
                    Err(e) => eprintln!("Error: {:#}", e),
                }
            }
            Command::Ask(question) => match session.ask(question).await {
                Ok(turn) => println!("{}", render_turn(&turn)),
                Err(AskError::ModelUnreachable { url }) => {
                    eprintln!(
                        "Cannot connect to Ollama at {}. Make sure Ollama is running (`ollama serve`).",
                        url
                    );
                }
                Err(e) => {
                    tracing::error!("query failed: {:#}", e);
                    eprintln!("Error: {:#}", e);
                }
            },
        }
    }

    session.close().await;
    Ok(())
}
