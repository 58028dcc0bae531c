//! Token-budgeted splitting that prefers sentence boundaries.

use super::tokenizer::TOKENIZER;
use super::Node;
use crate::documents::SourceDocument;
use crate::error::{DocentError, Result};
use text_splitter::{ChunkConfig, TextSplitter};
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// Splits text into chunks of at most `chunk_size` tokens, overlapping by
/// `chunk_overlap` tokens, breaking at the largest semantic unit that fits
/// (paragraphs, then sentences, then words).
pub struct SentenceSplitter {
    splitter: TextSplitter<CoreBPE>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceSplitter {
    /// Create a splitter. Fails when the overlap is not smaller than the chunk size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DocentError::Chunking("chunk size must be greater than 0".to_string()));
        }

        let config = ChunkConfig::new(chunk_size)
            .with_sizer(TOKENIZER.clone())
            .with_overlap(chunk_overlap)
            .map_err(|e| DocentError::Chunking(format!("Invalid chunk config: {}", e)))?;

        Ok(Self {
            splitter: TextSplitter::new(config),
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split raw text.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        self.splitter
            .chunks(text)
            .map(|chunk| chunk.to_string())
            .filter(|chunk| !chunk.trim().is_empty())
            .collect()
    }

    /// Split a document into nodes.
    pub fn split_document(&self, document: &SourceDocument) -> Vec<Node> {
        let nodes: Vec<Node> = self
            .split_text(&document.content)
            .into_iter()
            .enumerate()
            .map(|(order, text)| Node::new(&document.id, &document.file_name, text, order as u32))
            .collect();

        debug!("Split {} into {} nodes", document.id, nodes.len());
        nodes
    }
}
