//! Index builder for Docent.
//!
//! Coordinates reading the document folder, chunking, embedding and storing.

use crate::chunking::SentenceSplitter;
use crate::config::Settings;
use crate::documents::{hash_content, DirectoryReader, SourceDocument};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::{StoredNode, VectorStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Builds and refreshes the vector index from the document folder.
pub struct Indexer {
    reader: DirectoryReader,
    splitter: SentenceSplitter,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    embedding_model: String,
}

/// Outcome of an index build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Documents found in the folder.
    pub documents: usize,
    /// Documents (re)embedded during this build.
    pub indexed: usize,
    /// Documents whose stored embeddings were still current.
    pub unchanged: usize,
    /// Documents dropped because they left the folder.
    pub removed: usize,
    /// Nodes in the store after the build.
    pub nodes: usize,
}

impl Indexer {
    pub fn new(
        reader: DirectoryReader,
        splitter: SentenceSplitter,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            reader,
            splitter,
            embedder,
            vector_store,
            embedding_model: String::new(),
        }
    }

    /// Name of the embedding model, recorded with every stored node.
    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    /// Create an indexer configured from the `[index]` settings.
    pub fn from_settings(
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let reader = DirectoryReader::new(settings.input_dir())
            .recursive(settings.index.recursive)
            .extensions(&settings.index.extensions);
        let splitter =
            SentenceSplitter::new(settings.index.chunk_size, settings.index.chunk_overlap)?;

        Ok(Self::new(reader, splitter, embedder, vector_store)
            .with_embedding_model(&settings.embedding.model))
    }

    /// Get a reference to the vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    /// Bring the store in line with the folder, embedding only changed documents.
    #[instrument(skip(self), fields(dir = %self.reader.input_dir().display()))]
    pub async fn build(&self) -> Result<IndexReport> {
        let documents = self.reader.load()?;
        let mut report = IndexReport {
            documents: documents.len(),
            ..Default::default()
        };

        for document in &documents {
            let stamp = self.stamp(document);
            let stored_hash = self.vector_store.document_hash(&document.id).await?;
            if stored_hash.as_deref() == Some(stamp.as_str()) {
                debug!("{} unchanged, skipping", document.id);
                report.unchanged += 1;
                continue;
            }

            self.index_document(document, &stamp).await?;
            report.indexed += 1;
        }

        let present: HashSet<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        for indexed in self.vector_store.list_documents().await? {
            if !present.contains(indexed.document_id.as_str()) {
                self.vector_store.delete_document(&indexed.document_id).await?;
                info!("Removed {} from the index", indexed.document_id);
                report.removed += 1;
            }
        }

        report.nodes = self.vector_store.node_count().await?;

        info!(
            "Index ready: {} documents ({} indexed, {} unchanged, {} removed), {} nodes",
            report.documents, report.indexed, report.unchanged, report.removed, report.nodes
        );

        Ok(report)
    }

    /// Drop everything and embed the whole folder again.
    pub async fn rebuild(&self) -> Result<IndexReport> {
        let cleared = self.vector_store.clear().await?;
        info!("Cleared {} nodes before rebuild", cleared);
        self.build().await
    }

    /// Document content plus everything that shapes its vectors. A change in
    /// any of them invalidates the stored nodes.
    fn stamp(&self, document: &SourceDocument) -> String {
        hash_content(&format!(
            "{}\n{}\n{}\n{}\n{}",
            document.content_hash,
            self.embedding_model,
            self.embedder.dimensions(),
            self.splitter.chunk_size(),
            self.splitter.chunk_overlap()
        ))
    }

    async fn index_document(&self, document: &SourceDocument, stamp: &str) -> Result<usize> {
        let nodes = self.splitter.split_document(document);
        if nodes.is_empty() {
            self.vector_store.delete_document(&document.id).await?;
            debug!("{} has no text to index", document.id);
            return Ok(0);
        }

        // Embed before touching the store so a failed request keeps the old nodes
        let texts: Vec<String> = nodes.iter().map(|n| n.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let stored: Vec<StoredNode> = nodes
            .into_iter()
            .zip(embeddings)
            .map(|(node, embedding)| StoredNode::new(node, embedding, stamp))
            .collect();

        self.vector_store.delete_document(&document.id).await?;

        let count = self.vector_store.upsert_batch(&stored).await?;
        info!("Indexed {} ({} nodes)", document.id, count);
        Ok(count)
    }
}
