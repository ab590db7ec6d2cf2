// Catalog client for a Backstage-style `GET {base}/entities` endpoint.

use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::LinguistConfig;
use crate::error::CatalogError;
use crate::types::{EntityRef, TrackedEntity};

use super::{
    EntityCatalog, LINGUIST_ANNOTATION, SOURCE_LOCATION_ANNOTATION, kind_matches, select_location,
};

/// Catalog backed by a remote catalog API.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    base_url: String,
    token: Option<String>,
    kinds: Vec<String>,
    use_source_location: bool,
    client: Client,
}

impl HttpCatalog {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        kinds: Vec<String>,
        use_source_location: bool,
    ) -> Self {
        install_crypto_provider();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            kinds,
            use_source_location,
            client: Client::new(),
        }
    }

    /// Build from `[catalog]`; `None` when no URL is configured.
    pub fn from_config(config: &LinguistConfig) -> Option<Self> {
        let url = config.catalog.url.as_ref()?;
        let token = std::env::var(&config.catalog.token_env).ok();
        Some(Self::new(
            url.clone(),
            token,
            config.catalog.kinds.clone(),
            config.use_source_location,
        ))
    }
}

/// reqwest is built without a bundled TLS provider; install aws-lc-rs once.
pub fn install_crypto_provider() {
    // Err means a provider is already installed, which is fine.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

#[derive(Debug, Deserialize)]
struct CatalogEntity {
    kind: String,
    metadata: CatalogMetadata,
}

#[derive(Debug, Deserialize)]
struct CatalogMetadata {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    annotations: HashMap<String, String>,
}

/// Parse a catalog `/entities` response into tracked entities.
pub fn parse_entities(
    body: &str,
    kinds: &[String],
    use_source_location: bool,
) -> Result<Vec<TrackedEntity>, CatalogError> {
    let entities: Vec<CatalogEntity> =
        serde_json::from_str(body).map_err(|e| CatalogError::Parse(e.to_string()))?;

    Ok(entities
        .into_iter()
        .filter(|e| kind_matches(kinds, &e.kind))
        .map(|e| {
            let namespace = e.metadata.namespace.as_deref().unwrap_or("default");
            let entity_ref = format!("{}:{}/{}", e.kind, namespace, e.metadata.name).to_lowercase();
            let annotations = &e.metadata.annotations;
            TrackedEntity {
                entity_ref: EntityRef::new(entity_ref),
                location: select_location(
                    annotations.get(SOURCE_LOCATION_ANNOTATION).map(String::as_str),
                    annotations.get(LINGUIST_ANNOTATION).map(String::as_str),
                    use_source_location,
                    None,
                ),
                kind: e.kind,
            }
        })
        .collect())
}

#[async_trait::async_trait]
impl EntityCatalog for HttpCatalog {
    #[instrument(skip_all, name = "catalog_list", fields(url = %self.base_url))]
    async fn list_tracked_entities(&self) -> Result<Vec<TrackedEntity>, CatalogError> {
        let mut request = self.client.get(format!("{}/entities", self.base_url));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(CatalogError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let entities = parse_entities(&body, &self.kinds, self.use_source_location)?;
        debug!(count = entities.len(), "Catalog entities listed");
        Ok(entities)
    }
}
