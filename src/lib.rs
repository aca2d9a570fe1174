//! # docqa
//!
//! Ask questions about your own documents, answered by a locally served
//! language model.
//!
//! Files dropped (or uploaded) into a documents folder are extracted, split
//! into overlapping chunks, embedded and stored in a SQLite index. A question
//! retrieves a diverse set of relevant chunks (maximal marginal relevance) and
//! the model answers from them, citing the files it used.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌────────────┐
//! │  Ingestor  │──▶│  Indexer   │──▶│   Store    │
//! │ PDF/DOCX/… │   │ split+batch│   │ SQLite+vec │
//! └────────────┘   └────────────┘   └─────┬──────┘
//!                                         │ MMR
//!                  ┌────────────┐   ┌─────▼──────┐
//!                  │  Session   │◀──│  Composer  │──▶ Ollama
//!                  │ chat / ask │   │  prompt    │
//!                  └────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa init                       # create folders and the index
//! docqa upload report.pdf notes.txt
//! docqa ask "What did revenue do in Q3?"
//! docqa chat                       # interactive session
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Text extraction per file format |
//! | [`ingest`] | Documents directory walk |
//! | [`chunk`] | Overlapping character splitter |
//! | [`indexer`] | Deduplicating, batched indexing |
//! | [`embedding`] | Embedding providers and vector helpers |
//! | [`store`] | Vector store trait, SQLite and in-memory stores |
//! | [`retrieve`] | MMR retrieval |
//! | [`llm`] | Chat model client |
//! | [`answer`] | Prompt building and answering |
//! | [`conversation`] | Two-phase chat history |
//! | [`session`] | Ask / upload / clear over one assistant |
//! | [`chat`] | Interactive REPL |
//! | [`app`] | Service construction |
//! | [`stats`] | Index statistics |
//! | [`progress`] | Indexing progress on stderr |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod app;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod conversation;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod indexer;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod retrieve;
pub mod session;
pub mod stats;
pub mod store;
