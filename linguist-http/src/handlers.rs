//! Request handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use linguist_core::query::{CachedResult, QueryOutcome};
use linguist_core::scheduler::ScheduleSnapshot;
use linguist_core::types::EntityRef;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub scheduler: ScheduleSnapshot,
}

/// Liveness probe with a scheduler summary.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        scheduler: state.facade.scheduler().snapshot(),
    })
}

async fn lookup(state: &AppState, raw: &str) -> Result<Json<CachedResult>, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::BadRequest("entityRef must not be empty".into()));
    }
    let entity_ref = EntityRef::from(raw);
    match state.facade.get(&entity_ref).await? {
        QueryOutcome::Found(cached) => Ok(Json(cached)),
        QueryOutcome::NotFound => Err(ApiError::NotFound(entity_ref.to_string())),
    }
}

/// `GET /entities/{entity_ref}/languages`
pub async fn get_languages(
    State(state): State<AppState>,
    Path(entity_ref): Path<String>,
) -> Result<Json<CachedResult>, ApiError> {
    lookup(&state, &entity_ref).await
}

#[derive(Debug, Deserialize)]
pub struct EntityLanguagesParams {
    #[serde(rename = "entityRef")]
    pub entity_ref: Option<String>,
}

/// `GET /entity-languages?entityRef=...`
pub async fn entity_languages(
    State(state): State<AppState>,
    Query(params): Query<EntityLanguagesParams>,
) -> Result<Json<CachedResult>, ApiError> {
    let Some(entity_ref) = params.entity_ref else {
        return Err(ApiError::BadRequest("missing entityRef query parameter".into()));
    };
    lookup(&state, &entity_ref).await
}

/// `GET /entities/languages`
pub async fn list_languages(
    State(state): State<AppState>,
) -> Result<Json<Vec<CachedResult>>, ApiError> {
    Ok(Json(state.facade.list().await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub entity_ref: EntityRef,
    /// False when the refresh queue was full.
    pub queued: bool,
}

/// `POST /entities/{entity_ref}/languages/refresh`
pub async fn refresh_languages(
    State(state): State<AppState>,
    Path(entity_ref): Path<String>,
) -> (StatusCode, Json<RefreshResponse>) {
    let entity_ref = EntityRef::from(entity_ref.trim());
    let queued = state.facade.refresh(&entity_ref);
    debug!(entity = %entity_ref, queued, "Refresh requested");
    (
        StatusCode::ACCEPTED,
        Json(RefreshResponse { entity_ref, queued }),
    )
}
