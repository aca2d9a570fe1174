//! A chat session: the assistant plus the conversation log.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::answer::AskError;
use crate::app::Assistant;
use crate::conversation::ConversationLog;
use crate::indexer::{self, IndexReport};
use crate::models::{ChatTurn, DocumentFormat, SUPPORTED_EXTENSIONS};
use crate::progress::IndexProgressReporter;

pub struct Session {
    assistant: Assistant,
    log: ConversationLog,
}

#[derive(Debug, Default)]
pub struct UploadReport {
    pub copied: Vec<PathBuf>,
    pub rejected: Vec<PathBuf>,
    /// Copied over a file that is already indexed; the new content is not
    /// indexed.
    pub replaced_indexed: Vec<PathBuf>,
    pub index: IndexReport,
}

impl Session {
    pub fn new(assistant: Assistant) -> Self {
        Self {
            assistant,
            log: ConversationLog::new(),
        }
    }

    pub fn assistant(&self) -> &Assistant {
        &self.assistant
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Ask a question. On failure the question is dropped from the log.
    pub async fn ask(&mut self, question: &str) -> Result<ChatTurn, AskError> {
        let pending = self.log.begin(question)?;

        let indicator = atty::is(atty::Stream::Stderr);
        if indicator {
            let mut err = std::io::stderr().lock();
            let _ = write!(err, "Thinking...");
            let _ = err.flush();
        }

        let result = self.assistant.composer().ask(question).await;

        if indicator {
            let mut err = std::io::stderr().lock();
            let _ = write!(err, "\r{}\r", " ".repeat(12));
            let _ = err.flush();
        }

        match result {
            Ok(answer) => Ok(self.log.resolve(pending, answer)?.clone()),
            Err(e) => {
                self.log.revert(pending)?;
                Err(e)
            }
        }
    }

    /// Index whatever is new in the documents directory.
    pub async fn index(&self, progress: &dyn IndexProgressReporter) -> Result<IndexReport> {
        indexer::process_documents(self.assistant.config(), self.assistant.store(), progress)
            .await
    }

    /// Copy `files` into the documents directory, then index.
    ///
    /// Copying is not transactional: files copied before a failure stay.
    pub async fn upload(
        &self,
        files: &[PathBuf],
        progress: &dyn IndexProgressReporter,
    ) -> Result<UploadReport> {
        let mut report = UploadReport::default();
        let dir = self.assistant.config().paths.documents_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let indexed = self.assistant.store().indexed_sources().await?;

        for file in files {
            if DocumentFormat::from_path(file).is_none() {
                tracing::warn!(
                    "{} is not a supported upload type ({})",
                    file.display(),
                    SUPPORTED_EXTENSIONS.join(", ")
                );
                report.rejected.push(file.clone());
                continue;
            }
            let target = copy_into(file, &dir)?;
            let resolved = target.canonicalize().unwrap_or_else(|_| target.clone());
            if indexed.contains(&resolved) {
                tracing::warn!(
                    "{} replaced an indexed document; its new content will not be indexed",
                    target.display()
                );
                report.replaced_indexed.push(target.clone());
            }
            report.copied.push(target);
        }

        report.index = self.index(progress).await?;
        Ok(report)
    }

    pub fn clear(&mut self) {
        self.log.clear();
    }

    pub async fn close(self) {
        self.assistant.close().await;
    }
}

fn copy_into(file: &Path, dir: &Path) -> Result<PathBuf> {
    let Some(name) = file.file_name() else {
        bail!("{} is not a file", file.display());
    };
    let target = dir.join(name);
    std::fs::copy(file, &target)
        .with_context(|| format!("Failed to copy {} to {}", file.display(), target.display()))?;
    tracing::info!("Saved {}", target.display());
    Ok(target)
}

/// Render an answered turn: time, answer and numbered source file names.
pub fn render_turn(turn: &ChatTurn) -> String {
    let mut out = format!(
        "[{}] Q: {}\n\n{}\n",
        turn.time.format("%H:%M:%S"),
        turn.question,
        turn.answer.trim_end()
    );
    if !turn.sources.is_empty() {
        out.push_str("\nSources:\n");
        for (i, source) in turn.sources.iter().enumerate() {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| source.display().to_string());
            out.push_str(&format!("  {}. {}\n", i + 1, name));
        }
    }
    out
}
