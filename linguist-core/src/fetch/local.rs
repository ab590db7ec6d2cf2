use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::FetchError;
use crate::types::SourceLocation;

use super::{FileTree, SourceFetcher, SourceFile, read_capped, resolve_local_path};

/// Walks a directory on the local filesystem.
///
/// The `.git` directory is never descended into; everything else is
/// returned and left to the analyzer's exclude patterns.
#[derive(Debug, Clone)]
pub struct LocalDirFetcher {
    max_file_bytes: u64,
}

impl LocalDirFetcher {
    pub fn new(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }
}

#[async_trait::async_trait]
impl SourceFetcher for LocalDirFetcher {
    async fn fetch(&self, location: &SourceLocation) -> Result<FileTree, FetchError> {
        let root = resolve_local_path(&location.target)
            .ok_or_else(|| FetchError::Unsupported(location.target.clone()))?;
        let max_file_bytes = self.max_file_bytes;
        tokio::task::spawn_blocking(move || walk_directory(&root, max_file_bytes))
            .await
            .map_err(|e| FetchError::Task(e.to_string()))?
    }
}

fn walk_directory(root: &Path, max_file_bytes: u64) -> Result<FileTree, FetchError> {
    if !root.is_dir() {
        return Err(FetchError::NotFound(root.display().to_string()));
    }

    // Metacharacters in the root itself must match literally
    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let pattern = Path::new(&escaped).join("**").join("*").to_string_lossy().to_string();
    let paths = glob::glob(&pattern).map_err(|e| FetchError::Io(std::io::Error::other(e)))?;

    let mut matched: Vec<PathBuf> = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                let relative = path.strip_prefix(root).unwrap_or(&path);
                if relative.components().any(|c| c.as_os_str() == ".git") {
                    continue;
                }
                if path.is_file() {
                    matched.push(path);
                }
            }
            Err(e) => {
                warn!(path = %e.path().display(), error = %e.error(), "Unreadable directory entry");
            }
        }
    }
    matched.sort();

    let files: Vec<SourceFile> = matched
        .iter()
        .map(|path| {
            let relative = path.strip_prefix(root).unwrap_or(path);
            SourceFile {
                path: relative.to_string_lossy().replace('\\', "/"),
                content: read_capped(path, max_file_bytes),
            }
        })
        .collect();

    debug!(root = %root.display(), files = files.len(), "Directory walk complete");
    Ok(FileTree { files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FileContent;

    fn create_test_project(dir: &Path) {
        std::fs::create_dir_all(dir.join("src/nested")).unwrap();
        std::fs::create_dir_all(dir.join(".git/objects")).unwrap();
        std::fs::write(dir.join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.join("src/nested/lib.rs"), "pub fn hello() {}").unwrap();
        std::fs::write(dir.join("README.md"), "# Test").unwrap();
        std::fs::write(dir.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        std::fs::write(dir.join("big.sql"), "x".repeat(64)).unwrap();
    }

    #[tokio::test]
    async fn walks_nested_files_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        create_test_project(tmp.path());

        let fetcher = LocalDirFetcher::new(1024);
        let tree = fetcher
            .fetch(&SourceLocation::new(tmp.path().to_string_lossy()))
            .await
            .unwrap();

        let paths: Vec<&str> = tree.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["README.md", "big.sql", "src/main.rs", "src/nested/lib.rs"]
        );
        assert_eq!(
            tree.files[2].content,
            FileContent::Bytes(b"fn main() {}".to_vec())
        );
    }

    #[tokio::test]
    async fn large_files_are_size_only() {
        let tmp = tempfile::tempdir().unwrap();
        create_test_project(tmp.path());

        let fetcher = LocalDirFetcher::new(16);
        let tree = fetcher
            .fetch(&SourceLocation::new(tmp.path().to_string_lossy()))
            .await
            .unwrap();
        let big = tree.files.iter().find(|f| f.path == "big.sql").unwrap();
        assert_eq!(big.content, FileContent::SizeOnly(64));
    }

    #[tokio::test]
    async fn root_with_glob_metacharacters() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("svc[1]");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("main.go"), "package main").unwrap();

        let tree = LocalDirFetcher::new(1024)
            .fetch(&SourceLocation::new(root.to_string_lossy()))
            .await
            .unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.files[0].path, "main.go");
    }

    #[tokio::test]
    async fn file_target_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.rs");
        std::fs::write(&file, "fn a() {}").unwrap();

        let err = LocalDirFetcher::new(1024)
            .fetch(&SourceLocation::new(file.to_string_lossy()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }
}
