// Entity catalog: which entities are tracked and where their source lives.

pub mod http;

pub use http::HttpCatalog;

use crate::config::{CatalogEntityConfig, LinguistConfig};
use crate::error::CatalogError;
use crate::types::{EntityRef, SourceLocation, TrackedEntity};

/// Annotation holding an entity's declared source location.
pub const SOURCE_LOCATION_ANNOTATION: &str = "backstage.io/source-location";
/// Annotation holding a dedicated location to analyze.
pub const LINGUIST_ANNOTATION: &str = "backstage.io/linguist";

/// Enumerates tracked entities and resolves them to source locations.
#[async_trait::async_trait]
pub trait EntityCatalog: Send + Sync + std::fmt::Debug {
    /// All entities eligible for analysis, with their resolved locations.
    async fn list_tracked_entities(&self) -> Result<Vec<TrackedEntity>, CatalogError>;

    /// Look up a single entity.
    async fn resolve(&self, entity_ref: &EntityRef) -> Result<Option<TrackedEntity>, CatalogError> {
        Ok(self
            .list_tracked_entities()
            .await?
            .into_iter()
            .find(|e| &e.entity_ref == entity_ref))
    }
}

/// The configured catalog: HTTP when `catalog.url` is set, static otherwise.
pub fn from_config(config: &LinguistConfig) -> std::sync::Arc<dyn EntityCatalog> {
    match HttpCatalog::from_config(config) {
        Some(http) => std::sync::Arc::new(http),
        None => std::sync::Arc::new(StaticCatalog::from_config(config)),
    }
}

/// Pick the location to analyze for an entity.
///
/// With `use_source_location` the declared source location is used;
/// otherwise only the dedicated linguist location counts.
pub fn select_location(
    source_location: Option<&str>,
    linguist_location: Option<&str>,
    use_source_location: bool,
    reference: Option<&str>,
) -> Option<SourceLocation> {
    let target = if use_source_location {
        source_location
    } else {
        linguist_location
    }?;
    let target = target.trim();
    if target.is_empty() {
        return None;
    }
    let mut location = SourceLocation::new(target);
    if let Some(reference) = reference {
        location = location.with_reference(reference);
    }
    Some(location)
}

/// Case-insensitive kind filter; an empty filter admits every kind.
pub fn kind_matches(kinds: &[String], kind: &str) -> bool {
    kinds.is_empty() || kinds.iter().any(|k| k.eq_ignore_ascii_case(kind))
}

/// Catalog declared in the config file.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    entities: Vec<TrackedEntity>,
}

impl StaticCatalog {
    pub fn new(entities: Vec<TrackedEntity>) -> Self {
        Self { entities }
    }

    pub fn from_config(config: &LinguistConfig) -> Self {
        let entities = config
            .catalog
            .entities
            .iter()
            .filter(|e| kind_matches(&config.catalog.kinds, &e.kind))
            .map(|e| tracked_from_config(e, config.use_source_location))
            .collect();
        Self { entities }
    }
}

fn tracked_from_config(entry: &CatalogEntityConfig, use_source_location: bool) -> TrackedEntity {
    TrackedEntity {
        entity_ref: EntityRef::new(entry.entity_ref.trim()),
        kind: entry.kind.clone(),
        location: select_location(
            entry.source_location.as_deref(),
            entry.linguist_location.as_deref(),
            use_source_location,
            entry.reference.as_deref(),
        ),
    }
}

#[async_trait::async_trait]
impl EntityCatalog for StaticCatalog {
    async fn list_tracked_entities(&self) -> Result<Vec<TrackedEntity>, CatalogError> {
        Ok(self.entities.clone())
    }
}
