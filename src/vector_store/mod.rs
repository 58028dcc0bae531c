//! Vector store abstraction for Docent.
//!
//! Provides a trait-based interface for different vector database backends.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::Node;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A node with its embedding, as kept in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNode {
    pub node: Node,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Stamp of the source document content and the embedding/chunking
    /// settings that produced this node.
    pub content_hash: String,
    /// When this node was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl StoredNode {
    pub fn new(node: Node, embedding: Vec<f32>, content_hash: &str) -> Self {
        Self {
            node,
            embedding,
            content_hash: content_hash.to_string(),
            indexed_at: Utc::now(),
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched node.
    pub node: Node,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Summary information about an indexed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub document_id: String,
    pub file_name: String,
    pub content_hash: String,
    /// Number of indexed nodes.
    pub node_count: u32,
    /// When the document was indexed.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Bulk upsert nodes.
    async fn upsert_batch(&self, nodes: &[StoredNode]) -> Result<usize>;

    /// Search for similar nodes.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.search_with_threshold(query_embedding, limit, f32::MIN).await
    }

    /// Search with a minimum similarity threshold.
    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>>;

    /// Delete all nodes of a document.
    async fn delete_document(&self, document_id: &str) -> Result<usize>;

    /// Remove everything.
    async fn clear(&self) -> Result<usize>;

    /// List all indexed documents.
    async fn list_documents(&self) -> Result<Vec<IndexedDocument>>;

    /// Content hash recorded for a document, if it is indexed.
    async fn document_hash(&self, document_id: &str) -> Result<Option<String>>;

    /// Get total node count.
    async fn node_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Score, filter and order candidates, keeping the best `limit`.
pub(crate) fn rank<'a>(
    candidates: impl Iterator<Item = &'a StoredNode>,
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = candidates
        // Vectors from another embedding model cannot be compared
        .filter(|stored| stored.embedding.len() == query_embedding.len())
        .map(|stored| SearchResult {
            node: stored.node.clone(),
            score: cosine_similarity(query_embedding, &stored.embedding),
        })
        .filter(|r| r.score >= min_score)
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node.id.cmp(&b.node.id))
    });
    results.truncate(limit);
    results
}

#[cfg(test)]
pub(crate) fn stored(document_id: &str, order: u32, text: &str, embedding: Vec<f32>) -> StoredNode {
    StoredNode::new(
        Node::new(document_id, document_id, text.to_string(), order),
        embedding,
        &format!("hash-{}", document_id),
    )
}
