//! Document loading from a local folder.

mod reader;

pub use reader::DirectoryReader;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// A text document read from the input folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Path relative to the input folder, with `/` separators.
    pub id: String,
    /// Absolute or as-given path on disk.
    pub path: PathBuf,
    /// File name without directories.
    pub file_name: String,
    /// Full text.
    pub content: String,
    /// SHA-256 of the content, hex encoded.
    pub content_hash: String,
}

impl SourceDocument {
    /// Create a document and compute its content hash.
    pub fn new(id: String, path: PathBuf, content: String) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| id.clone());
        let content_hash = hash_content(&content);

        Self {
            id,
            path,
            file_name,
            content,
            content_hash,
        }
    }
}

/// SHA-256 hex digest of a text.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let a = SourceDocument::new("a.txt".into(), PathBuf::from("/tmp/a.txt"), "hello".into());
        let b = SourceDocument::new("b.txt".into(), PathBuf::from("/tmp/b.txt"), "hello".into());
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash.len(), 64);
        assert_eq!(a.file_name, "a.txt");
    }
}
