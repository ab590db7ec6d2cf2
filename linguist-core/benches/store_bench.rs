// Benchmark result store operations and tree aggregation.

use std::sync::Arc;

use chrono::DateTime;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use linguist_core::analyze::{AnalysisSettings, Analyzer};
use linguist_core::classify::ExtensionClassifier;
use linguist_core::clock::SystemClock;
use linguist_core::error::FetchError;
use linguist_core::fetch::{FileTree, SourceFetcher, SourceFile};
use linguist_core::store::{ResultStore, SqliteStore};
use linguist_core::types::{
    AnalysisResult, EntityRef, LanguageKind, LanguageStat, SourceLocation, StatUnit,
};

fn make_result(i: usize, computed_at_ms: i64) -> AnalysisResult {
    AnalysisResult {
        entity_ref: EntityRef::new(format!("component:default/service-{i}")),
        stats: ["go", "typescript", "markdown", "yaml"]
            .iter()
            .map(|lang| LanguageStat {
                language: (*lang).to_string(),
                kind: LanguageKind::Programming,
                bytes: 1_000,
                lines: None,
                percentage: 25.0,
            })
            .collect(),
        language_count: 4,
        computed_at: DateTime::from_timestamp_millis(computed_at_ms).unwrap(),
        source_location_used: Some(format!("/srv/service-{i}")),
        unit: StatUnit::Bytes,
        total_bytes: 4_000,
        total_lines: None,
        files_analyzed: 40,
        unreadable_files: 0,
    }
}

fn bench_upsert(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("store_upsert");

    for count in [100, 1_000] {
        group.bench_with_input(BenchmarkId::new("count", count), &count, |b, &n| {
            b.iter(|| {
                rt.block_on(async {
                    let store = SqliteStore::in_memory().unwrap();
                    for i in 0..n {
                        store.upsert(&make_result(i, 1_000)).await.unwrap();
                    }
                });
            });
        });
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    // Pre-populate store
    let store = rt.block_on(async {
        let store = SqliteStore::in_memory().unwrap();
        for i in 0..1_000 {
            store.upsert(&make_result(i, 1_000)).await.unwrap();
        }
        store
    });
    let entity = EntityRef::from("component:default/service-500");

    c.bench_function("store_read", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.read(&entity).await.unwrap();
            });
        });
    });

    c.bench_function("store_read_all_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.read_all().await.unwrap();
            });
        });
    });

    // Older writes are rejected by the conflict clause without a rewrite
    c.bench_function("store_upsert_superseded", |b| {
        let stale = make_result(500, 10);
        b.iter(|| {
            rt.block_on(async {
                store.upsert(&stale).await.unwrap();
            });
        });
    });
}

#[derive(Debug)]
struct InMemoryFetcher(FileTree);

#[async_trait::async_trait]
impl SourceFetcher for InMemoryFetcher {
    async fn fetch(&self, _location: &SourceLocation) -> Result<FileTree, FetchError> {
        Ok(self.0.clone())
    }
}

fn synthetic_tree(files: usize) -> FileTree {
    let extensions = ["rs", "go", "ts", "md", "yaml", "py", "unknown"];
    FileTree {
        files: (0..files)
            .map(|i| {
                let ext = extensions[i % extensions.len()];
                SourceFile::new(format!("src/dir_{}/file_{i}.{ext}", i / 50), vec![b'a'; 2_048])
            })
            .collect(),
    }
}

fn bench_analyze(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("analyze_tree");
    group.sample_size(20);

    for files in [1_000, 10_000] {
        let analyzer = Analyzer::new(
            Arc::new(InMemoryFetcher(synthetic_tree(files))),
            Arc::new(ExtensionClassifier::new()),
            AnalysisSettings::default(),
            Arc::new(SystemClock),
        );
        let entity = EntityRef::from("component:default/bench");
        let location = SourceLocation::new("/bench");
        group.bench_with_input(BenchmarkId::new("files", files), &files, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    analyzer.analyze(&entity, Some(&location)).await.unwrap();
                });
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_upsert, bench_read, bench_analyze);
criterion_main!(benches);
