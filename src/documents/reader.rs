//! Directory reader that loads every text document under a folder.

use super::SourceDocument;
use crate::error::{DocentError, Result};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Loads text files from a folder.
pub struct DirectoryReader {
    input_dir: PathBuf,
    recursive: bool,
    extensions: Vec<String>,
}

impl DirectoryReader {
    /// Create a reader for a folder. Defaults to a recursive walk accepting `txt` and `md`.
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            recursive: true,
            extensions: vec!["txt".to_string(), "md".to_string()],
        }
    }

    /// Descend into subdirectories or not.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Accepted file extensions, without the leading dot. Matching ignores case.
    pub fn extensions(mut self, extensions: &[String]) -> Self {
        self.extensions = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// The folder this reader walks.
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Read all matching documents, sorted by relative path.
    #[instrument(skip(self), fields(dir = %self.input_dir.display()))]
    pub fn load(&self) -> Result<Vec<SourceDocument>> {
        if !self.input_dir.is_dir() {
            return Err(DocentError::Documents(format!(
                "Directory {} does not exist",
                self.input_dir.display()
            )));
        }

        let walker = WalkBuilder::new(&self.input_dir)
            .hidden(true)
            .git_ignore(true)
            .max_depth(if self.recursive { None } else { Some(1) })
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut documents = Vec::new();

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file()) || !self.accepts(path) {
                continue;
            }

            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let relative = path.strip_prefix(&self.input_dir).unwrap_or(path);
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");

            let document = SourceDocument::new(id, path.to_path_buf(), content);

            debug!("Loaded {} ({} bytes)", document.id, document.content.len());
            documents.push(document);
        }

        if documents.is_empty() {
            return Err(DocentError::Documents(format!(
                "No files found in {} (accepted extensions: {})",
                self.input_dir.display(),
                self.extensions.join(", ")
            )));
        }

        documents.sort_by(|a, b| a.id.cmp(&b.id));
        info!("Loaded {} documents", documents.len());
        Ok(documents)
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "second").unwrap();
        fs::write(dir.path().join("a.MD"), "# first").unwrap();
        fs::write(dir.path().join("image.png"), [0u8, 159, 146, 150]).unwrap();
        fs::write(dir.path().join(".hidden.txt"), "secret").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.txt"), "third").unwrap();
        dir
    }

    #[test]
    fn test_loads_matching_files_sorted() {
        let dir = fixture();
        let docs = DirectoryReader::new(dir.path())
            .extensions(&["txt".to_string(), ".md".to_string()])
            .load()
            .unwrap();

        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.MD", "b.txt", "nested/c.txt"]);
        assert_eq!(docs[2].file_name, "c.txt");
        assert_eq!(docs[0].content, "# first");
    }

    #[test]
    fn test_non_recursive_skips_subdirectories() {
        let dir = fixture();
        let docs = DirectoryReader::new(dir.path())
            .recursive(false)
            .load()
            .unwrap();

        assert!(docs.iter().all(|d| !d.id.contains('/')));
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_non_utf8_file_is_skipped() {
        let dir = fixture();
        fs::write(dir.path().join("broken.txt"), [0xffu8, 0xfe, 0x00]).unwrap();

        let docs = DirectoryReader::new(dir.path()).load().unwrap();
        assert!(docs.iter().all(|d| d.id != "broken.txt"));
    }

    #[test]
    fn test_missing_directory() {
        let err = DirectoryReader::new("/definitely/not/here").load().unwrap_err();
        assert!(matches!(err, DocentError::Documents(_)));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectoryReader::new(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("No files found"));
    }
}
