//! Answer composition: retrieve, build the prompt, call the model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::embedding::EmbedError;
use crate::llm::{ChatModel, LlmError};
use crate::models::RetrievedChunk;
use crate::retrieve::Retriever;

pub const SYSTEM_PROMPT: &str = "\
You are a helpful assistant that answers questions about the user's documents.
Use only the context below to answer. Some of the context may be irrelevant to \
the question; ignore it.
When you cite sources, only cite the sources that actually helped you answer.
If the context does not contain the answer, say that you don't know. Do not \
make up an answer.
Use Markdown for emphasis where it helps readability.

Context:
{context}";

#[derive(Debug, Error)]
pub enum AskError {
    #[error("cannot connect to Ollama at {url}. Start Ollama or run `ollama serve`.")]
    ModelUnreachable { url: String },
    #[error(transparent)]
    Other(anyhow::Error),
}

/// A question embedding that could not reach Ollama is the same outage as
/// an unreachable chat model.
impl From<anyhow::Error> for AskError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<EmbedError>() {
            Some(EmbedError::Unreachable { url, .. }) => {
                AskError::ModelUnreachable { url: url.clone() }
            }
            None => AskError::Other(err),
        }
    }
}

impl From<LlmError> for AskError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unreachable { url, .. } => AskError::ModelUnreachable { url },
            other => AskError::Other(other.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Distinct sources of the chunks given to the model, in retrieval order.
    pub sources: Vec<PathBuf>,
}

pub struct AnswerComposer {
    retriever: Retriever,
    model: Arc<dyn ChatModel>,
}

impl AnswerComposer {
    pub fn new(retriever: Retriever, model: Arc<dyn ChatModel>) -> Self {
        Self { retriever, model }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn model(&self) -> &dyn ChatModel {
        self.model.as_ref()
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        let chunks = self.retriever.retrieve(question).await?;
        let system = SYSTEM_PROMPT.replace("{context}", &build_context(&chunks));

        let text = self.model.complete(&system, question).await?;

        Ok(Answer {
            text,
            sources: distinct_sources(&chunks),
        })
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Chunk texts separated by blank lines, each headed by its file name.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|r| match r.chunk.page {
            Some(page) => format!(
                "[{} p.{}]\n{}",
                file_label(&r.chunk.source),
                page,
                r.chunk.text
            ),
            None => format!("[{}]\n{}", file_label(&r.chunk.source), r.chunk.text),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn distinct_sources(chunks: &[RetrievedChunk]) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = Vec::new();
    for r in chunks {
        if !sources.contains(&r.chunk.source) {
            sources.push(r.chunk.source.clone());
        }
    }
    sources
}
