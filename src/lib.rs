//! Docent - a chat assistant that answers from your documents
//!
//! Indexes a folder of documents into a vector store and answers questions
//! through a tool-calling agent whose only tool consults that index.
//!
//! # Overview
//!
//! Docent allows you to:
//! - Index a folder of text documents, re-embedding only what changed
//! - Chat with an agent (OpenAI or Groq) that answers from those documents
//! - Keep separate conversation memory per session
//! - Use it from a browser chat widget or the terminal
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Settings and prompt templates
//! - `documents` - Reading the document folder
//! - `chunking` - Token-bounded sentence chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction
//! - `indexer` - Index building and refresh
//! - `llm` - Chat model abstraction
//! - `rag` - RAG engine for question answering
//! - `agent` - Tool-calling agent
//! - `session` - Per-session conversation memory
//! - `assistant` - Streams agent runs as chat updates
//! - `server` - Web chat widget
//!
//! # Example
//!
//! ```rust,no_run
//! use docent::assistant::{Assistant, ChatUpdate};
//! use docent::config::Settings;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let assistant = Assistant::from_settings(&settings).await?;
//!
//!     let mut updates = assistant.chat(Some("demo"), "What do the docs say about refunds?");
//!     while let Some(update) = updates.next().await {
//!         if let ChatUpdate::Done(answer) = update {
//!             println!("{}", answer);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod assistant;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod llm;
pub mod openai;
pub mod rag;
pub mod server;
pub mod session;
pub mod vector_store;

pub use error::{DocentError, Result};
