//! Core data types that flow through ingestion, retrieval and chat.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// File formats the ingestor knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
    Word,
    Slides,
    Spreadsheet,
    Csv,
}

impl DocumentFormat {
    /// Classify a path by its (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            "doc" | "docx" => Some(Self::Word),
            "pptx" => Some(Self::Slides),
            "xlsx" | "xls" => Some(Self::Spreadsheet),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "text",
            Self::Word => "word",
            Self::Slides => "slides",
            Self::Spreadsheet => "spreadsheet",
            Self::Csv => "csv",
        }
    }
}

/// Extensions accepted by `upload`.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["pdf", "txt", "docx", "doc", "pptx", "csv", "xlsx", "xls"];

/// Text loaded from one source file (a whole file, a PDF page or a CSV row).
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub source: PathBuf,
    /// 1-based PDF page, when the record came from a single page.
    pub page: Option<u32>,
    pub text: String,
}

/// A bounded slice of a record's text, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub source: PathBuf,
    pub page: Option<u32>,
    /// Position among the chunks cut from the same record.
    pub chunk_index: i64,
    /// Character offset of the chunk within its record.
    pub start_char: i64,
    pub text: String,
    pub hash: String,
}

/// Metadata kept for every stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    pub id: String,
    pub source: PathBuf,
    pub page: Option<u32>,
    pub chunk_index: i64,
}

/// A stored chunk returned by a similarity search.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// One question/answer exchange in a chat session.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    pub sources: Vec<PathBuf>,
    pub time: DateTime<Local>,
}
