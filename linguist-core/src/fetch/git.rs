use std::path::Path;

use gix::bstr::ByteSlice;
use tracing::debug;

use crate::error::FetchError;
use crate::types::SourceLocation;

use super::{FileContent, FileTree, SourceFetcher, SourceFile, resolve_local_path};

/// Reads the committed tree of a local git repository (`HEAD`, or the
/// location's `reference`) straight from the object database. The working
/// tree is never consulted, so uncommitted files are not analyzed.
#[derive(Debug, Clone)]
pub struct GitTreeFetcher {
    max_file_bytes: u64,
}

impl GitTreeFetcher {
    pub fn new(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }
}

#[async_trait::async_trait]
impl SourceFetcher for GitTreeFetcher {
    async fn fetch(&self, location: &SourceLocation) -> Result<FileTree, FetchError> {
        let root = resolve_local_path(&location.target)
            .ok_or_else(|| FetchError::Unsupported(location.target.clone()))?;
        let reference = location.reference.clone();
        let max_file_bytes = self.max_file_bytes;
        tokio::task::spawn_blocking(move || {
            read_committed_tree(&root, reference.as_deref(), max_file_bytes)
        })
        .await
        .map_err(|e| FetchError::Task(e.to_string()))?
    }
}

fn git_err(e: impl std::fmt::Display) -> FetchError {
    FetchError::Git(e.to_string())
}

fn read_committed_tree(
    repo_path: &Path,
    reference: Option<&str>,
    max_file_bytes: u64,
) -> Result<FileTree, FetchError> {
    let repo = gix::open(repo_path).map_err(git_err)?;

    let commit = match reference {
        Some(spec) => repo
            .rev_parse_single(spec)
            .map_err(git_err)?
            .object()
            .map_err(git_err)?
            .try_into_commit()
            .map_err(git_err)?,
        None => repo.head_commit().map_err(git_err)?,
    };
    let tree = commit.tree().map_err(git_err)?;

    // Diffing against the empty tree yields every blob of the commit as an addition.
    let empty = repo.empty_tree();
    let mut platform = empty.changes().map_err(git_err)?;
    let mut blobs: Vec<(String, gix::ObjectId)> = Vec::new();
    platform
        .for_each_to_obtain_tree(&tree, |change| {
            use gix::object::tree::diff::Change;
            if let Change::Addition {
                location,
                entry_mode,
                id,
                ..
            } = change
            {
                if entry_mode.is_blob() {
                    blobs.push((location.to_str_lossy().into_owned(), id.detach()));
                }
            }
            Ok::<_, std::convert::Infallible>(std::ops::ControlFlow::Continue(()))
        })
        .map_err(|e| FetchError::Git(format!("tree walk error: {e}")))?;

    blobs.sort_by(|a, b| a.0.cmp(&b.0));

    let files = blobs
        .into_iter()
        .map(|(path, oid)| {
            let content = match repo.find_object(oid) {
                Ok(object) if object.data.len() as u64 > max_file_bytes => {
                    FileContent::SizeOnly(object.data.len() as u64)
                }
                Ok(object) => FileContent::Bytes(object.data.clone()),
                Err(e) => FileContent::Unreadable(e.to_string()),
            };
            SourceFile { path, content }
        })
        .collect::<Vec<_>>();

    debug!(
        repo = %repo_path.display(),
        commit = %commit.id,
        files = files.len(),
        "Git tree read"
    );
    Ok(FileTree { files })
}
