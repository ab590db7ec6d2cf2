use std::time::Duration;

/// Top-level Linguist error type.
///
/// All fallible operations in `linguist-core` return [`Result<T, LinguistError>`](Result).
/// Callers that care about the failing subsystem match on the variant;
/// everyone else propagates with `?`.
#[derive(thiserror::Error, Debug)]
pub enum LinguistError {
    /// Error from the result store (`SQLite` operations, leases).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error while analyzing an entity's source tree.
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// Error talking to the entity catalog.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl LinguistError {
    /// Whether the failed operation may succeed if simply retried later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Analysis(e) => e.is_retryable(),
            Self::Catalog(e) => !matches!(e, CatalogError::Config(_)),
            Self::Config(_) => false,
        }
    }
}

/// Errors from the SQLite-backed result store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Underlying `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The store cannot serve requests right now (lock poisoned, connection lost).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Schema setup failed (version mismatch or DDL error).
    #[error("Migration failed: {0}")]
    Migration(String),

    /// JSON serialization/deserialization of stored stats failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Sqlite(_) | Self::Unavailable(_))
    }
}

/// Failures of a single entity analysis run.
///
/// None of these mutate the store: the previous result, if any, stays visible.
#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    /// The entity has no resolvable source location.
    #[error("No source location for {entity}")]
    LocationUnavailable {
        /// Entity whose location could not be resolved.
        entity: String,
    },

    /// Reading the source tree failed (network, filesystem, git).
    #[error("Fetching {location} failed: {source}")]
    FetchFailed {
        /// Location that was being fetched.
        location: String,
        /// Underlying fetch failure.
        #[source]
        source: FetchError,
    },

    /// The run did not finish within the per-run timeout and was abandoned.
    #[error("Analysis of {entity} timed out after {after:?}")]
    Timeout {
        /// Entity whose run was abandoned.
        entity: String,
        /// Budget that was exceeded.
        after: Duration,
    },
}

impl AnalysisError {
    /// `LocationUnavailable` only clears when entity metadata changes.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::LocationUnavailable { .. })
    }

    /// Short machine-readable kind, used in logs and tick reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LocationUnavailable { .. } => "location_unavailable",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::Timeout { .. } => "timeout",
        }
    }
}

/// Errors from a [`SourceFetcher`](crate::fetch::SourceFetcher).
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// Filesystem I/O error while walking or reading the tree.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Git repository could not be opened or read.
    #[error("Git error: {0}")]
    Git(String),

    /// The location does not exist.
    #[error("Location not found: {0}")]
    NotFound(String),

    /// No fetcher handles this kind of location.
    #[error("Unsupported location: {0}")]
    Unsupported(String),

    /// The blocking fetch task panicked or was cancelled.
    #[error("Fetch task failed: {0}")]
    Task(String),
}

/// Errors from the entity catalog.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// Network-level failure reaching the catalog.
    #[error("Network error: {0}")]
    Network(String),

    /// Catalog API returned a non-success HTTP status.
    #[error("Catalog API error (HTTP {status}): {body}")]
    Api {
        /// HTTP status code from the catalog.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Catalog response could not be parsed.
    #[error("Response parse error: {0}")]
    Parse(String),

    /// Catalog configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors in Linguist configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience alias for `Result<T, LinguistError>`.
pub type Result<T> = std::result::Result<T, LinguistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_unavailable_is_not_retryable() {
        let err = AnalysisError::LocationUnavailable {
            entity: "component:default/web".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "location_unavailable");
    }

    #[test]
    fn fetch_and_timeout_are_retryable() {
        let fetch = AnalysisError::FetchFailed {
            location: "/srv/repo".into(),
            source: FetchError::NotFound("/srv/repo".into()),
        };
        let timeout = AnalysisError::Timeout {
            entity: "component:default/web".into(),
            after: Duration::from_secs(1),
        };
        assert!(fetch.is_retryable());
        assert!(timeout.is_retryable());
        assert!(LinguistError::from(fetch).is_retryable());
    }

    #[test]
    fn config_errors_are_fatal() {
        let err = LinguistError::from(ConfigError::Invalid("timeout is zero".into()));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("timeout is zero"));
    }
}
