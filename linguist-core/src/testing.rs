// Deterministic fakes shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::FetchError;
use crate::fetch::{FileTree, SourceFetcher, SourceFile};
use crate::types::{EntityRef, SourceLocation, TrackedEntity};

/// Fetcher keyed by location target: unknown targets fail with `NotFound`,
/// targets marked slow sleep for an hour first.
#[derive(Debug, Default)]
pub(crate) struct ScriptedFetcher {
    trees: HashMap<String, FileTree>,
    slow: HashSet<String>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    /// A single 100-byte Go file at `target`.
    pub(crate) fn with_tree(mut self, target: &str) -> Self {
        self.trees.insert(
            target.to_string(),
            FileTree {
                files: vec![SourceFile::new("main.go", vec![b'x'; 100])],
            },
        );
        self
    }

    pub(crate) fn with_slow_tree(mut self, target: &str) -> Self {
        self.slow.insert(target.to_string());
        self.with_tree(target)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch(&self, location: &SourceLocation) -> Result<FileTree, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.slow.contains(&location.target) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.trees
            .get(&location.target)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(location.target.clone()))
    }
}

/// `component:default/{name}` located at `/srv/{name}`.
pub(crate) fn tracked(name: &str) -> TrackedEntity {
    TrackedEntity {
        entity_ref: EntityRef::new(format!("component:default/{name}")),
        kind: "Component".into(),
        location: Some(SourceLocation::new(format!("/srv/{name}"))),
    }
}
