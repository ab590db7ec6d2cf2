use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Entities ───────────────────────────────────────────────────────

/// Opaque identifier of a trackable unit, e.g. `component:default/web`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRef(String);

impl EntityRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Resolved address of an entity's source: a directory or git repository,
/// optionally pinned to a git revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl SourceLocation {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reference: None,
        }
    }

    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reference {
            Some(reference) => write!(f, "{}#{reference}", self.target),
            None => f.write_str(&self.target),
        }
    }
}

/// An entity as enumerated by the catalog, with its resolved location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub entity_ref: EntityRef,
    pub kind: String,
    pub location: Option<SourceLocation>,
}

// ── Language statistics ────────────────────────────────────────────

/// Unit that language shares are computed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatUnit {
    #[default]
    Bytes,
    Lines,
}

impl StatUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bytes => "bytes",
            Self::Lines => "lines",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bytes" => Some(Self::Bytes),
            "lines" => Some(Self::Lines),
            _ => None,
        }
    }
}

/// Broad language category, as used by linguist-style breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKind {
    Programming,
    Markup,
    Data,
    Prose,
}

/// Aggregated share of one language within an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageStat {
    pub language: String,
    pub kind: LanguageKind,
    pub bytes: u64,
    /// Only populated when the unit is [`StatUnit::Lines`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<u64>,
    /// Share of the total in the result's unit, rounded to two decimals.
    pub percentage: f64,
}

/// The current language breakdown of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub entity_ref: EntityRef,
    /// Ordered by share descending, then by language name.
    pub stats: Vec<LanguageStat>,
    /// Number of distinct languages in `stats`.
    #[serde(default)]
    pub language_count: usize,
    pub computed_at: DateTime<Utc>,
    pub source_location_used: Option<String>,
    pub unit: StatUnit,
    pub total_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_lines: Option<u64>,
    pub files_analyzed: u64,
    /// Files that could not be read; the breakdown covers the rest.
    pub unreadable_files: u64,
}

impl AnalysisResult {
    pub fn stat(&self, language: &str) -> Option<&LanguageStat> {
        self.stats.iter().find(|s| s.language == language)
    }

    /// Whether some files were skipped as unreadable.
    pub fn is_partial(&self) -> bool {
        self.unreadable_files > 0
    }
}

/// Drop sub-millisecond precision so timestamps survive a store round trip.
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

// ── Store metadata ─────────────────────────────────────────────────

/// Summary statistics about the result store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_results: u64,
    pub partial_results: u64,
    pub oldest_computed_at: Option<DateTime<Utc>>,
    pub newest_computed_at: Option<DateTime<Utc>>,
    pub db_size_bytes: u64,
}
