//! In-memory vector store implementation.
//!
//! The index lives for the lifetime of the process and is rebuilt on start.

use super::{rank, IndexedDocument, SearchResult, StoredNode, VectorStore};
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store.
#[derive(Default)]
pub struct MemoryVectorStore {
    nodes: RwLock<HashMap<String, StoredNode>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, StoredNode>>> {
        self.nodes
            .read()
            .map_err(|e| DocentError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, StoredNode>>> {
        self.nodes
            .write()
            .map_err(|e| DocentError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, nodes: &[StoredNode]) -> Result<usize> {
        let mut store = self.write()?;
        for stored in nodes {
            store.insert(stored.node.id.clone(), stored.clone());
        }
        Ok(nodes.len())
    }

    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let store = self.read()?;
        Ok(rank(store.values(), query_embedding, limit, min_score))
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut store = self.write()?;
        let initial_len = store.len();
        store.retain(|_, stored| stored.node.document_id != document_id);
        Ok(initial_len - store.len())
    }

    async fn clear(&self) -> Result<usize> {
        let mut store = self.write()?;
        let removed = store.len();
        store.clear();
        Ok(removed)
    }

    async fn list_documents(&self) -> Result<Vec<IndexedDocument>> {
        let store = self.read()?;

        let mut documents: HashMap<String, IndexedDocument> = HashMap::new();
        for stored in store.values() {
            let entry = documents
                .entry(stored.node.document_id.clone())
                .or_insert_with(|| IndexedDocument {
                    document_id: stored.node.document_id.clone(),
                    file_name: stored.node.file_name.clone(),
                    content_hash: stored.content_hash.clone(),
                    node_count: 0,
                    indexed_at: stored.indexed_at,
                });

            entry.node_count += 1;
            if stored.indexed_at > entry.indexed_at {
                entry.indexed_at = stored.indexed_at;
            }
        }

        let mut documents: Vec<IndexedDocument> = documents.into_values().collect();
        documents.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        Ok(documents)
    }

    async fn document_hash(&self, document_id: &str) -> Result<Option<String>> {
        let store = self.read()?;
        Ok(store
            .values()
            .find(|stored| stored.node.document_id == document_id)
            .map(|stored| stored.content_hash.clone()))
    }

    async fn node_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::stored;

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new();

        store
            .upsert_batch(&[
                stored("guide.md", 0, "Hello world", vec![1.0, 0.0, 0.0]),
                stored("guide.md", 1, "Goodbye world", vec![0.0, 1.0, 0.0]),
                stored("faq.txt", 0, "Questions", vec![0.5, 0.5, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.node_count().await.unwrap(), 3);

        let results = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].node.text, "Hello world");
        assert!(results[0].score > results[1].score);

        let documents = store.list_documents().await.unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1].document_id, "guide.md");
        assert_eq!(documents[1].node_count, 2);

        assert_eq!(
            store.document_hash("faq.txt").await.unwrap().as_deref(),
            Some("hash-faq.txt")
        );
        assert_eq!(store.delete_document("guide.md").await.unwrap(), 2);
        assert!(store.document_hash("guide.md").await.unwrap().is_none());
        assert_eq!(store.clear().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_threshold_filters() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[
                stored("a", 0, "match", vec![1.0, 0.0]),
                stored("b", 0, "orthogonal", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search_with_threshold(&[1.0, 0.0], 10, 0.5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].node.text, "match");
    }
}
