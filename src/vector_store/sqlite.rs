//! SQLite-based vector store implementation.
//!
//! Persists embeddings between runs so unchanged documents are not embedded
//! again. Similarity is computed in Rust over all rows.

use super::{rank, IndexedDocument, SearchResult, StoredNode, VectorStore};
use crate::chunking::Node;
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS nodes (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        file_name TEXT NOT NULL,
        text TEXT NOT NULL,
        node_order INTEGER NOT NULL,
        embedding BLOB NOT NULL,
        content_hash TEXT NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_nodes_document_id ON nodes(document_id);
"#;

const SELECT_NODES: &str = r#"
    SELECT id, document_id, file_name, text, node_order, embedding, content_hash, indexed_at
    FROM nodes
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) a store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DocentError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_stored(row: &Row<'_>) -> rusqlite::Result<StoredNode> {
        let embedding_bytes: Vec<u8> = row.get(5)?;
        let indexed_at_str: String = row.get(7)?;

        Ok(StoredNode {
            node: Node {
                id: row.get(0)?,
                document_id: row.get(1)?,
                file_name: row.get(2)?,
                text: row.get(3)?,
                order: row.get(4)?,
            },
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            content_hash: row.get(6)?,
            indexed_at: parse_timestamp(&indexed_at_str),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, nodes))]
    async fn upsert_batch(&self, nodes: &[StoredNode]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for stored in nodes {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO nodes
                (id, document_id, file_name, text, node_order, embedding, content_hash, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    stored.node.id,
                    stored.node.document_id,
                    stored.node.file_name,
                    stored.node.text,
                    stored.node.order,
                    Self::embedding_to_bytes(&stored.embedding),
                    stored.content_hash,
                    stored.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        debug!("Batch upserted {} nodes", nodes.len());
        Ok(nodes.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(SELECT_NODES)?;
        let nodes: Vec<StoredNode> = stmt
            .query_map([], Self::row_to_stored)?
            .collect::<rusqlite::Result<_>>()?;

        let results = rank(nodes.iter(), query_embedding, limit, min_score);
        debug!("Found {} matching nodes", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM nodes WHERE document_id = ?1",
            params![document_id],
        )?;

        debug!("Deleted {} nodes for {}", deleted, document_id);
        Ok(deleted)
    }

    async fn clear(&self) -> Result<usize> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM nodes", [])?)
    }

    #[instrument(skip(self))]
    async fn list_documents(&self) -> Result<Vec<IndexedDocument>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT document_id, MAX(file_name), MAX(content_hash),
                   COUNT(*) AS node_count, MAX(indexed_at)
            FROM nodes
            GROUP BY document_id
            ORDER BY document_id
            "#,
        )?;

        let documents = stmt
            .query_map([], |row| {
                let indexed_at_str: String = row.get(4)?;
                Ok(IndexedDocument {
                    document_id: row.get(0)?,
                    file_name: row.get(1)?,
                    content_hash: row.get(2)?,
                    node_count: row.get(3)?,
                    indexed_at: parse_timestamp(&indexed_at_str),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(documents)
    }

    async fn document_hash(&self, document_id: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let hash = conn.query_row(
            "SELECT content_hash FROM nodes WHERE document_id = ?1 LIMIT 1",
            params![document_id],
            |row| row.get(0),
        );

        match hash {
            Ok(hash) => Ok(Some(hash)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn node_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::stored;

    #[tokio::test]
    async fn test_sqlite_vector_store() {
        let store = SqliteVectorStore::in_memory().unwrap();

        store
            .upsert_batch(&[
                stored("manual.md", 0, "Install the app", vec![1.0, 0.0, 0.0]),
                stored("manual.md", 1, "Configure the app", vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let documents = store.list_documents().await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].document_id, "manual.md");
        assert_eq!(documents[0].node_count, 2);

        let results = store.search(&[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].node.text, "Install the app");
        assert!((results[0].score - 1.0).abs() < 0.001);

        assert_eq!(
            store.document_hash("manual.md").await.unwrap().as_deref(),
            Some("hash-manual.md")
        );

        let deleted = store.delete_document("manual.md").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(store.list_documents().await.unwrap().is_empty());
        assert!(store.document_hash("manual.md").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let store = SqliteVectorStore::new(&path).unwrap();
            store
                .upsert_batch(&[stored("a.txt", 0, "kept", vec![0.25, -0.5])])
                .await
                .unwrap();
        }

        let store = SqliteVectorStore::new(&path).unwrap();
        assert_eq!(store.node_count().await.unwrap(), 1);
        let results = store.search(&[0.25, -0.5], 5).await.unwrap();
        assert_eq!(results[0].node.text, "kept");
    }
}
