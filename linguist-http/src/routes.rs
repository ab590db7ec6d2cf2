//! Route table.
//!
//! Entity refs contain `/` (`component:default/web`); clients percent-encode
//! them in path segments or use the `entityRef` query form.

use axum::Router;
use axum::routing::{get, post};

use crate::{AppState, handlers};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/entities/languages", get(handlers::list_languages))
        .route(
            "/entities/{entity_ref}/languages",
            get(handlers::get_languages),
        )
        .route(
            "/entities/{entity_ref}/languages/refresh",
            post(handlers::refresh_languages),
        )
        .route("/entity-languages", get(handlers::entity_languages))
}
