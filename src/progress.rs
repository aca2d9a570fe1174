//! Indexing progress reporting.
//!
//! The indexer emits one event per stored batch. Progress goes to **stderr**
//! so stdout stays clean for answers and command output.

use std::io::Write;

/// A single progress event emitted while indexing.
#[derive(Clone, Debug)]
pub enum IndexProgressEvent {
    /// Documents were loaded and split; `chunks` are about to be stored.
    Split { documents: u64, chunks: u64 },
    /// Batch `index` (1-based) of `chunks` chunks was stored; `done` of `total` so far.
    Batch {
        index: u64,
        chunks: u64,
        done: u64,
        total: u64,
    },
}

pub trait IndexProgressReporter: Send + Sync {
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly progress on stderr: "Processing batch 2 (5,000 chunks)  10,000 / 12,345".
pub struct StderrProgress;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = match &event {
            IndexProgressEvent::Split { documents, chunks } => format!(
                "Split {} documents into {} chunks\n",
                format_number(*documents),
                format_number(*chunks)
            ),
            IndexProgressEvent::Batch {
                index,
                chunks,
                done,
                total,
            } => format!(
                "Processing batch {} ({} chunks)  {} / {}\n",
                index,
                format_number(*chunks),
                format_number(*done),
                format_number(*total)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexProgressReporter for JsonProgress {
    fn report(&self, event: IndexProgressEvent) {
        let obj = match &event {
            IndexProgressEvent::Split { documents, chunks } => serde_json::json!({
                "event": "progress",
                "phase": "split",
                "documents": documents,
                "chunks": chunks
            }),
            IndexProgressEvent::Batch {
                index,
                chunks,
                done,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "batch",
                "batch": index,
                "chunks": chunks,
                "done": done,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn IndexProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
