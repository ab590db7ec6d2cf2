// Analyzer: fetch a source tree, classify every file, aggregate per language.
#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::classify::{FileSample, LanguageClassifier};
use crate::clock::Clock;
use crate::config::AnalysisSection;
use crate::error::{AnalysisError, ConfigError, FetchError};
use crate::fetch::{FileContent, FileTree, SourceFetcher};
use crate::types::{
    AnalysisResult, EntityRef, LanguageKind, LanguageStat, SourceLocation, StatUnit,
};

/// Knobs that shape an analysis, compiled from `[analysis]`.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub unit: StatUnit,
    /// Languages below this share (percent) are dropped.
    pub min_share: Option<f64>,
    pub exclude_patterns: Vec<glob::Pattern>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            unit: StatUnit::Bytes,
            min_share: None,
            exclude_patterns: Vec::new(),
        }
    }
}

impl AnalysisSettings {
    pub fn from_config(section: &AnalysisSection) -> Result<Self, ConfigError> {
        let exclude_patterns = section
            .exclude_patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| ConfigError::Invalid(format!("bad exclude pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            unit: section.unit,
            min_share: section.min_share,
            exclude_patterns,
        })
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.exclude_patterns.iter().any(|p| p.matches(path))
    }
}

/// Turns an entity's source tree into an [`AnalysisResult`].
///
/// Holds no state between runs; fetcher and classifier are injected so
/// tests can substitute deterministic fakes.
#[derive(Debug)]
pub struct Analyzer {
    fetcher: Arc<dyn SourceFetcher>,
    classifier: Arc<dyn LanguageClassifier>,
    settings: Arc<AnalysisSettings>,
    clock: Arc<dyn Clock>,
}

impl Analyzer {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        classifier: Arc<dyn LanguageClassifier>,
        settings: AnalysisSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fetcher,
            classifier,
            settings: Arc::new(settings),
            clock,
        }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Analyze one entity. Timeouts are enforced by the caller.
    #[instrument(skip_all, name = "analyze", fields(entity = %entity_ref))]
    pub async fn analyze(
        &self,
        entity_ref: &EntityRef,
        location: Option<&SourceLocation>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let start = Instant::now();
        let location = location.ok_or_else(|| AnalysisError::LocationUnavailable {
            entity: entity_ref.to_string(),
        })?;

        let tree = self
            .fetcher
            .fetch(location)
            .await
            .map_err(|source| AnalysisError::FetchFailed {
                location: location.to_string(),
                source,
            })?;
        debug!(files = tree.len(), "Source tree fetched");

        let classifier = Arc::clone(&self.classifier);
        let settings = Arc::clone(&self.settings);
        let summary =
            tokio::task::spawn_blocking(move || summarize(&tree, classifier.as_ref(), &settings))
                .await
                .map_err(|e| AnalysisError::FetchFailed {
                    location: location.to_string(),
                    source: FetchError::Task(e.to_string()),
                })?;

        let result = AnalysisResult {
            entity_ref: entity_ref.clone(),
            language_count: summary.stats.len(),
            stats: summary.stats,
            computed_at: self.clock.now(),
            source_location_used: Some(location.to_string()),
            unit: self.settings.unit,
            total_bytes: summary.total_bytes,
            total_lines: summary.total_lines,
            files_analyzed: summary.files_analyzed,
            unreadable_files: summary.unreadable_files,
        };

        info!(
            languages = result.language_count,
            files = result.files_analyzed,
            unreadable = result.unreadable_files,
            total_bytes = result.total_bytes,
            duration = ?start.elapsed(),
            "Analysis complete"
        );
        Ok(result)
    }
}

/// Aggregated outcome of classifying a whole tree.
#[derive(Debug, Default)]
struct TreeSummary {
    stats: Vec<LanguageStat>,
    total_bytes: u64,
    total_lines: Option<u64>,
    files_analyzed: u64,
    unreadable_files: u64,
}

enum FileOutcome {
    Excluded,
    Unreadable,
    Classified(Vec<(String, LanguageKind, u64, u64)>),
}

#[derive(Debug)]
struct Accumulator {
    kind: LanguageKind,
    bytes: u64,
    lines: u64,
}

fn count_lines(content: &[u8]) -> u64 {
    let newlines = content.iter().filter(|b| **b == b'\n').count() as u64;
    match content.last() {
        Some(b'\n') | None => newlines,
        Some(_) => newlines + 1,
    }
}

fn summarize(
    tree: &FileTree,
    classifier: &dyn LanguageClassifier,
    settings: &AnalysisSettings,
) -> TreeSummary {
    let outcomes: Vec<FileOutcome> = tree
        .files
        .par_iter()
        .map(|file| {
            if settings.is_excluded(&file.path) {
                return FileOutcome::Excluded;
            }
            let (sample, lines) = match &file.content {
                FileContent::Bytes(bytes) => (FileSample::full(bytes), count_lines(bytes)),
                FileContent::SizeOnly(size) => (FileSample::size_only(*size), 0),
                FileContent::Unreadable(_) => return FileOutcome::Unreadable,
            };
            let tags = classifier
                .classify(&file.path, sample)
                .into_iter()
                .map(|t| (t.language, t.kind, t.bytes, lines))
                .collect();
            FileOutcome::Classified(tags)
        })
        .collect();

    let mut summary = TreeSummary::default();
    let mut languages: BTreeMap<String, Accumulator> = BTreeMap::new();
    for outcome in outcomes {
        match outcome {
            FileOutcome::Excluded => {}
            FileOutcome::Unreadable => summary.unreadable_files += 1,
            FileOutcome::Classified(tags) => {
                summary.files_analyzed += 1;
                for (language, kind, bytes, lines) in tags {
                    let acc = languages.entry(language).or_insert(Accumulator {
                        kind,
                        bytes: 0,
                        lines: 0,
                    });
                    acc.bytes += bytes;
                    acc.lines += lines;
                }
            }
        }
    }

    let measure = |acc: &Accumulator| match settings.unit {
        StatUnit::Bytes => acc.bytes,
        StatUnit::Lines => acc.lines,
    };

    // Apply the negligible-share cutoff against the full total.
    if let Some(min_share) = settings.min_share {
        let total: u64 = languages.values().map(&measure).sum();
        if total > 0 {
            languages.retain(|_, acc| (measure(acc) as f64 * 100.0 / total as f64) >= min_share);
        }
    }

    let total: u64 = languages.values().map(&measure).sum();
    summary.total_bytes = languages.values().map(|a| a.bytes).sum();
    summary.total_lines = match settings.unit {
        StatUnit::Bytes => None,
        StatUnit::Lines => Some(total),
    };

    let mut stats: Vec<LanguageStat> = languages
        .into_iter()
        .map(|(language, acc)| LanguageStat {
            percentage: share(measure(&acc), total),
            lines: matches!(settings.unit, StatUnit::Lines).then_some(acc.lines),
            language,
            kind: acc.kind,
            bytes: acc.bytes,
        })
        .collect();
    stats.sort_by(|a, b| {
        let (ma, mb) = match settings.unit {
            StatUnit::Bytes => (a.bytes, b.bytes),
            StatUnit::Lines => (a.lines.unwrap_or(0), b.lines.unwrap_or(0)),
        };
        mb.cmp(&ma).then_with(|| a.language.cmp(&b.language))
    });
    summary.stats = stats;
    summary
}

/// Percentage rounded to two decimals.
fn share(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 10_000.0 / total as f64).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ExtensionClassifier;
    use crate::clock::ManualClock;
    use crate::fetch::SourceFile;

    #[derive(Debug)]
    struct FixedFetcher(FileTree);

    #[async_trait::async_trait]
    impl SourceFetcher for FixedFetcher {
        async fn fetch(&self, _location: &SourceLocation) -> Result<FileTree, FetchError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Debug)]
    struct FailingFetcher;

    #[async_trait::async_trait]
    impl SourceFetcher for FailingFetcher {
        async fn fetch(&self, location: &SourceLocation) -> Result<FileTree, FetchError> {
            Err(FetchError::NotFound(location.target.clone()))
        }
    }

    fn go_and_markdown_tree() -> FileTree {
        let mut files = Vec::new();
        for i in 0..10 {
            files.push(SourceFile::new(format!("pkg/file_{i}.go"), vec![b'a'; 100]));
        }
        for i in 0..5 {
            files.push(SourceFile::new(format!("docs/page_{i}.md"), vec![b'b'; 50]));
        }
        FileTree { files }
    }

    fn analyzer_with(fetcher: Arc<dyn SourceFetcher>, settings: AnalysisSettings) -> Analyzer {
        Analyzer::new(
            fetcher,
            Arc::new(ExtensionClassifier::new()),
            settings,
            Arc::new(ManualClock::at_epoch()),
        )
    }

    fn location() -> SourceLocation {
        SourceLocation::new("/srv/repo")
    }

    #[tokio::test]
    async fn aggregates_bytes_per_language() {
        let analyzer = analyzer_with(
            Arc::new(FixedFetcher(go_and_markdown_tree())),
            AnalysisSettings::default(),
        );
        let entity = EntityRef::from("component:default/e");
        let result = analyzer.analyze(&entity, Some(&location())).await.unwrap();

        assert_eq!(result.language_count, 2);
        assert_eq!(result.stats[0].language, "go");
        assert_eq!(result.stats[0].bytes, 1000);
        assert_eq!(result.stats[1].language, "markdown");
        assert_eq!(result.stats[1].bytes, 250);
        assert!((result.stats[0].percentage - 80.0).abs() < f64::EPSILON);
        assert!((result.stats[1].percentage - 20.0).abs() < f64::EPSILON);
        assert_eq!(result.total_bytes, 1250);
        assert_eq!(result.files_analyzed, 15);
        assert_eq!(result.source_location_used.as_deref(), Some("/srv/repo"));
        assert_eq!(result.computed_at.timestamp(), 0);
    }

    #[tokio::test]
    async fn missing_location_is_location_unavailable() {
        let analyzer = analyzer_with(Arc::new(FailingFetcher), AnalysisSettings::default());
        let err = analyzer
            .analyze(&EntityRef::from("component:default/e"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::LocationUnavailable { .. }));
    }

    #[tokio::test]
    async fn fetch_failure_is_reported() {
        let analyzer = analyzer_with(Arc::new(FailingFetcher), AnalysisSettings::default());
        let err = analyzer
            .analyze(&EntityRef::from("component:default/e"), Some(&location()))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::FetchFailed { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unreadable_files_are_counted_not_fatal() {
        let mut tree = go_and_markdown_tree();
        tree.files.push(SourceFile {
            path: "pkg/locked.go".into(),
            content: FileContent::Unreadable("permission denied".into()),
        });
        let analyzer = analyzer_with(Arc::new(FixedFetcher(tree)), AnalysisSettings::default());
        let result = analyzer
            .analyze(&EntityRef::from("component:default/e"), Some(&location()))
            .await
            .unwrap();
        assert_eq!(result.unreadable_files, 1);
        assert!(result.is_partial());
        assert_eq!(result.stat("go").unwrap().bytes, 1000);
    }

    #[tokio::test]
    async fn excluded_paths_are_skipped() {
        let mut tree = go_and_markdown_tree();
        tree.files
            .push(SourceFile::new("node_modules/lib/index.js", vec![b'c'; 10_000]));
        tree.files
            .push(SourceFile::new("web/vendor/jquery.js", vec![b'c'; 10_000]));
        let settings = AnalysisSettings::from_config(&AnalysisSection::default()).unwrap();
        let analyzer = analyzer_with(Arc::new(FixedFetcher(tree)), settings);
        let result = analyzer
            .analyze(&EntityRef::from("component:default/e"), Some(&location()))
            .await
            .unwrap();
        assert!(result.stat("javascript").is_none());
        assert_eq!(result.files_analyzed, 15);
    }

    #[tokio::test]
    async fn min_share_drops_negligible_languages() {
        let mut tree = go_and_markdown_tree();
        tree.files.push(SourceFile::new("build.sh", vec![b'd'; 5]));
        let settings = AnalysisSettings {
            min_share: Some(1.0),
            ..AnalysisSettings::default()
        };
        let analyzer = analyzer_with(Arc::new(FixedFetcher(tree)), settings);
        let result = analyzer
            .analyze(&EntityRef::from("component:default/e"), Some(&location()))
            .await
            .unwrap();
        assert!(result.stat("shell").is_none());
        assert_eq!(result.total_bytes, 1250);
    }

    #[tokio::test]
    async fn line_unit_counts_lines() {
        let tree = FileTree {
            files: vec![
                SourceFile::new("a.py", "x = 1\ny = 2\n"),
                SourceFile::new("b.py", "z = 3"),
                SourceFile::new("c.rs", "fn a() {}\nfn b() {}\nfn c() {}\n"),
            ],
        };
        let settings = AnalysisSettings {
            unit: StatUnit::Lines,
            ..AnalysisSettings::default()
        };
        let analyzer = analyzer_with(Arc::new(FixedFetcher(tree)), settings);
        let result = analyzer
            .analyze(&EntityRef::from("component:default/e"), Some(&location()))
            .await
            .unwrap();
        assert_eq!(result.unit, StatUnit::Lines);
        assert_eq!(result.total_lines, Some(6));
        // Three lines each: tie broken by name
        assert_eq!(result.stats[0].language, "python");
        assert_eq!(result.stats[0].lines, Some(3));
        assert_eq!(result.stats[1].language, "rust");
        assert!((result.stats[0].percentage - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn empty_tree_yields_empty_breakdown() {
        let analyzer = analyzer_with(
            Arc::new(FixedFetcher(FileTree::default())),
            AnalysisSettings::default(),
        );
        let result = analyzer
            .analyze(&EntityRef::from("component:default/e"), Some(&location()))
            .await
            .unwrap();
        assert!(result.stats.is_empty());
        assert_eq!(result.total_bytes, 0);
    }

    #[test]
    fn line_counting() {
        assert_eq!(count_lines(b""), 0);
        assert_eq!(count_lines(b"a"), 1);
        assert_eq!(count_lines(b"a\n"), 1);
        assert_eq!(count_lines(b"a\nb"), 2);
    }

    #[test]
    fn share_rounds_to_two_decimals() {
        assert!((share(1, 3) - 33.33).abs() < 1e-9);
        assert!((share(0, 0)).abs() < f64::EPSILON);
    }
}
