//! RAG (Retrieval-Augmented Generation) for question answering with sources.
//!
//! Answers questions from the indexed document folder. The engine is
//! stateless; conversation memory belongs to the agent session.

pub mod context;
mod response;

pub use context::ContextBuilder;
pub use response::{RagEngine, RagResponse};

use crate::vector_store::SearchResult;

/// A retrieved node prepared for a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextChunk {
    /// Path of the source document, relative to the document folder.
    pub document_id: String,
    /// Position of the node within its document.
    pub order: u32,
    /// Text content.
    pub content: String,
    /// Similarity score.
    pub score: f32,
}

impl From<SearchResult> for ContextChunk {
    fn from(result: SearchResult) -> Self {
        Self {
            document_id: result.node.document_id,
            order: result.node.order,
            content: result.node.text,
            score: result.score,
        }
    }
}
