use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::StatUnit;

/// A duration written as a table of units, e.g. `{ minutes = 2 }` or
/// `{ days = 30 }`. Units are summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DurationSpec {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub milliseconds: u64,
}

impl DurationSpec {
    pub const fn days(days: u64) -> Self {
        Self {
            days,
            hours: 0,
            minutes: 0,
            seconds: 0,
            milliseconds: 0,
        }
    }

    pub const fn minutes(minutes: u64) -> Self {
        Self {
            days: 0,
            hours: 0,
            minutes,
            seconds: 0,
            milliseconds: 0,
        }
    }

    pub const fn seconds(seconds: u64) -> Self {
        Self {
            days: 0,
            hours: 0,
            minutes: 0,
            seconds,
            milliseconds: 0,
        }
    }

    pub fn as_duration(&self) -> Duration {
        let secs = self
            .days
            .saturating_mul(86_400)
            .saturating_add(self.hours.saturating_mul(3_600))
            .saturating_add(self.minutes.saturating_mul(60))
            .saturating_add(self.seconds);
        Duration::from_secs(secs).saturating_add(Duration::from_millis(self.milliseconds))
    }
}

/// What a read does when no result has been stored for an entity yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MissPolicy {
    /// Answer `NotFound`; the next scheduler tick fills the gap.
    #[default]
    NotFound,
    /// Run a one-off analysis on the request path, bounded by the run timeout.
    Compute,
}

/// Top-level Linguist configuration, matching `linguist.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinguistConfig {
    /// Analyze the entity's declared source location instead of its
    /// dedicated linguist location.
    #[serde(default)]
    pub use_source_location: bool,
    #[serde(default)]
    pub schedule: ScheduleSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub analysis: AnalysisSection,
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub query: QuerySection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub store: StoreSection,
}

impl LinguistConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate config text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.frequency.as_duration().is_zero() {
            return Err(ConfigError::Invalid(
                "schedule.frequency must be greater than zero".into(),
            ));
        }
        if self.schedule.timeout.as_duration().is_zero() {
            return Err(ConfigError::Invalid(
                "schedule.timeout must be greater than zero".into(),
            ));
        }
        if self.schedule.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "schedule.batch_size must be at least 1".into(),
            ));
        }
        if self.cache.max_age.as_duration().is_zero() {
            return Err(ConfigError::Invalid(
                "cache.max_age must be greater than zero".into(),
            ));
        }
        if let Some(share) = self.analysis.min_share {
            if !(0.0..100.0).contains(&share) {
                return Err(ConfigError::Invalid(format!(
                    "analysis.min_share must be in [0, 100), got {share}"
                )));
            }
        }
        for pattern in &self.analysis.exclude_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("bad exclude pattern {pattern:?}: {e}"))
            })?;
        }
        for entity in &self.catalog.entities {
            if entity.entity_ref.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "catalog.entities entry with empty ref".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    /// Interval between tick starts.
    pub frequency: DurationSpec,
    /// Maximum duration of one tick (and of one on-demand run).
    pub timeout: DurationSpec,
    /// Delay before the first tick after startup.
    pub initial_delay: DurationSpec,
    /// Maximum number of entities analyzed per tick.
    pub batch_size: usize,
    /// Name of the lease row that serializes ticks across processes.
    pub lease_name: String,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            frequency: DurationSpec::minutes(2),
            timeout: DurationSpec::minutes(15),
            initial_delay: DurationSpec::seconds(15),
            batch_size: 20,
            lease_name: "linguist:tick".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Results older than this are stale and get recomputed.
    pub max_age: DurationSpec,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_age: DurationSpec::days(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    pub unit: StatUnit,
    /// Drop languages whose share (percent) is below this value.
    pub min_share: Option<f64>,
    /// Files larger than this are classified by name only, without reading content.
    pub max_file_bytes: u64,
    pub exclude_patterns: Vec<String>,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            unit: StatUnit::Bytes,
            min_share: None,
            max_file_bytes: 1024 * 1024,
            exclude_patterns: vec![
                "**/node_modules/**".into(),
                "**/vendor/**".into(),
                "**/.git/**".into(),
                "**/dist/**".into(),
                "**/target/**".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    /// Entity kinds eligible for analysis (case-insensitive).
    pub kinds: Vec<String>,
    /// Base URL of a catalog API; when absent the static entity list is used.
    pub url: Option<String>,
    /// Environment variable holding a bearer token for the catalog API.
    pub token_env: String,
    pub entities: Vec<CatalogEntityConfig>,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            kinds: vec!["API".into(), "Component".into(), "Template".into()],
            url: None,
            token_env: "LINGUIST_CATALOG_TOKEN".into(),
            entities: Vec::new(),
        }
    }
}

/// One statically declared entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntityConfig {
    #[serde(rename = "ref")]
    pub entity_ref: String,
    #[serde(default = "default_entity_kind")]
    pub kind: String,
    /// Declared source location of the entity.
    #[serde(default)]
    pub source_location: Option<String>,
    /// Dedicated location to analyze when `use_source_location` is off.
    #[serde(default, rename = "linguist")]
    pub linguist_location: Option<String>,
    /// Git revision to read instead of `HEAD`.
    #[serde(default)]
    pub reference: Option<String>,
}

fn default_entity_kind() -> String {
    "Component".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySection {
    pub on_miss: MissPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7007,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Database file; an in-memory store is used when absent.
    pub path: Option<PathBuf>,
}
