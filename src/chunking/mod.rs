//! Splitting documents into retrievable chunks.

mod sentence;
mod tokenizer;

pub use sentence::SentenceSplitter;
pub use tokenizer::count_tokens;

use serde::{Deserialize, Serialize};

/// A chunk of a source document, the unit that gets embedded and retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique id: `<document id>#<order>`.
    pub id: String,
    /// Id of the document this chunk came from.
    pub document_id: String,
    /// File name of the source document.
    pub file_name: String,
    /// Chunk text.
    pub text: String,
    /// Position of this chunk within its document.
    pub order: u32,
}

impl Node {
    /// Create a node, deriving its id from the document id and order.
    pub fn new(document_id: &str, file_name: &str, text: String, order: u32) -> Self {
        Self {
            id: format!("{}#{}", document_id, order),
            document_id: document_id.to_string(),
            file_name: file_name.to_string(),
            text,
            order,
        }
    }
}
