// Source fetching: turn a resolved location into a tree of files.

pub mod git;
pub mod local;

pub use git::GitTreeFetcher;
pub use local::LocalDirFetcher;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::FetchError;
use crate::types::SourceLocation;

/// Content of one fetched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Full content was read.
    Bytes(Vec<u8>),
    /// File exceeded the read cap; only its size is known.
    SizeOnly(u64),
    /// File exists but could not be read.
    Unreadable(String),
}

/// A file in a fetched tree, addressed by its slash-separated relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: FileContent,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Bytes(content.into()),
        }
    }
}

/// All files of one source location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    pub files: Vec<SourceFile>,
}

impl FileTree {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Reads the file tree behind a [`SourceLocation`].
#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, location: &SourceLocation) -> Result<FileTree, FetchError>;
}

/// Map a location target to a local path.
///
/// Accepts plain paths, `file://` URLs, and `url:`-prefixed location
/// annotations wrapping either. Remote URLs yield `None`.
pub fn resolve_local_path(target: &str) -> Option<PathBuf> {
    let target = target.strip_prefix("url:").unwrap_or(target);
    let target = target.strip_prefix("file://").unwrap_or(target);
    if target.contains("://") || target.is_empty() {
        return None;
    }
    Some(PathBuf::from(target))
}

/// Read the content of a file, honoring the read cap.
pub(crate) fn read_capped(path: &Path, max_file_bytes: u64) -> FileContent {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > max_file_bytes => FileContent::SizeOnly(meta.len()),
        Ok(_) => match std::fs::read(path) {
            Ok(bytes) => FileContent::Bytes(bytes),
            Err(e) => FileContent::Unreadable(e.to_string()),
        },
        Err(e) => FileContent::Unreadable(e.to_string()),
    }
}

/// Fetcher used by the service: git repositories are read from their
/// committed tree, plain directories are walked.
#[derive(Debug)]
pub struct DefaultFetcher {
    local: LocalDirFetcher,
    git: GitTreeFetcher,
}

impl DefaultFetcher {
    pub fn new(max_file_bytes: u64) -> Self {
        Self {
            local: LocalDirFetcher::new(max_file_bytes),
            git: GitTreeFetcher::new(max_file_bytes),
        }
    }
}

#[async_trait::async_trait]
impl SourceFetcher for DefaultFetcher {
    async fn fetch(&self, location: &SourceLocation) -> Result<FileTree, FetchError> {
        let path = resolve_local_path(&location.target)
            .ok_or_else(|| FetchError::Unsupported(location.target.clone()))?;
        if !path.exists() {
            return Err(FetchError::NotFound(path.display().to_string()));
        }
        if location.reference.is_some() || path.join(".git").exists() {
            debug!(location = %location, "Reading committed git tree");
            self.git.fetch(location).await
        } else {
            debug!(location = %location, "Walking directory");
            self.local.fetch(location).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_local_targets() {
        assert_eq!(
            resolve_local_path("/srv/repo"),
            Some(PathBuf::from("/srv/repo"))
        );
        assert_eq!(
            resolve_local_path("file:///srv/repo"),
            Some(PathBuf::from("/srv/repo"))
        );
        assert_eq!(
            resolve_local_path("url:file:///srv/repo"),
            Some(PathBuf::from("/srv/repo"))
        );
        assert_eq!(
            resolve_local_path("url:https://github.com/org/repo/tree/main/"),
            None
        );
        assert_eq!(resolve_local_path(""), None);
    }

    #[tokio::test]
    async fn remote_locations_are_unsupported() {
        let fetcher = DefaultFetcher::new(1024);
        let err = fetcher
            .fetch(&SourceLocation::new("https://github.com/org/repo"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unsupported(_)));
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let fetcher = DefaultFetcher::new(1024);
        let err = fetcher
            .fetch(&SourceLocation::new("/nonexistent/linguist/repo"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn plain_directory_is_walked() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("main.go"), "package main\n").unwrap();
        let fetcher = DefaultFetcher::new(1024);
        let tree = fetcher
            .fetch(&SourceLocation::new(tmp.path().to_string_lossy()))
            .await
            .unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.files[0].path, "main.go");
    }
}
