use std::sync::Arc;

use linguist_core::analyze::{AnalysisSettings, Analyzer};
use linguist_core::classify::ExtensionClassifier;
use linguist_core::clock::ManualClock;
use linguist_core::error::{AnalysisError, FetchError};
use linguist_core::fetch::{DefaultFetcher, FileContent, GitTreeFetcher, SourceFetcher};
use linguist_core::types::{EntityRef, SourceLocation};
use linguist_test::TestRepo;

fn paths(tree: &linguist_core::fetch::FileTree) -> Vec<&str> {
    tree.files.iter().map(|f| f.path.as_str()).collect()
}

#[tokio::test]
async fn git_tree_lists_committed_files_only() {
    let repo = TestRepo::multi_lang();
    repo.write("scratch/notes.py", "print('uncommitted')\n");

    let tree = GitTreeFetcher::new(1024 * 1024)
        .fetch(&repo.location())
        .await
        .unwrap();
    assert_eq!(
        paths(&tree),
        vec![
            "py-lib/util.py",
            "rust-svc/Cargo.toml",
            "rust-svc/src/main.rs",
            "web/package.json",
            "web/src/app.ts",
        ]
    );
}

#[tokio::test]
async fn git_tree_reads_the_requested_revision() {
    let repo = TestRepo::multi_lang();
    repo.tag("v2");
    repo.write("web/src/extra.ts", "export const extra = 1;\n");
    repo.commit("Add extra");

    let head = GitTreeFetcher::new(1024 * 1024)
        .fetch(&repo.location())
        .await
        .unwrap();
    assert!(paths(&head).contains(&"web/src/extra.ts"));

    let tagged = GitTreeFetcher::new(1024 * 1024)
        .fetch(&repo.location().with_reference("v2"))
        .await
        .unwrap();
    assert!(!paths(&tagged).contains(&"web/src/extra.ts"));
    assert!(paths(&tagged).contains(&"web/src/app.ts"));

    let first = GitTreeFetcher::new(1024 * 1024)
        .fetch(&repo.location().with_reference("HEAD~2"))
        .await
        .unwrap();
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn oversized_blobs_are_size_only() {
    let repo = TestRepo::go_service();
    let tree = GitTreeFetcher::new(60)
        .fetch(&repo.location())
        .await
        .unwrap();
    for file in &tree.files {
        if file.path.ends_with(".go") {
            assert_eq!(file.content, FileContent::SizeOnly(100));
        } else {
            assert!(matches!(file.content, FileContent::Bytes(ref b) if b.len() == 50));
        }
    }
}

#[tokio::test]
async fn unknown_revision_is_a_git_error() {
    let repo = TestRepo::go_service();
    let err = GitTreeFetcher::new(1024)
        .fetch(&repo.location().with_reference("no-such-branch"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Git(_)), "got {err:?}");
}

#[tokio::test]
async fn default_fetcher_prefers_the_committed_tree() {
    let repo = TestRepo::go_service();
    repo.write("pkg/wip.go", "package pkg\n");

    let tree = DefaultFetcher::new(1024 * 1024)
        .fetch(&repo.location())
        .await
        .unwrap();
    assert_eq!(tree.len(), 15);
    assert!(!paths(&tree).contains(&"pkg/wip.go"));
}

#[tokio::test]
async fn analyzer_over_git_repository() {
    let repo = TestRepo::multi_lang();
    let analyzer = Analyzer::new(
        Arc::new(DefaultFetcher::new(1024 * 1024)),
        Arc::new(ExtensionClassifier::new()),
        AnalysisSettings::default(),
        Arc::new(ManualClock::at_epoch()),
    );
    let entity = EntityRef::from("component:default/mono");
    let result = analyzer
        .analyze(&entity, Some(&repo.location()))
        .await
        .unwrap();

    for language in ["rust", "python", "typescript", "toml", "json"] {
        assert!(result.stat(language).is_some(), "missing {language}");
    }
    let total: f64 = result.stats.iter().map(|s| s.percentage).sum();
    assert!((total - 100.0).abs() < 0.05, "shares sum to {total}");
    assert_eq!(result.files_analyzed, 5);
    assert_eq!(
        result.source_location_used.as_deref(),
        Some(repo.location().target.as_str())
    );

    let err = analyzer
        .analyze(&entity, Some(&SourceLocation::new("https://example.com/repo")))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::FetchFailed { .. }));
}
