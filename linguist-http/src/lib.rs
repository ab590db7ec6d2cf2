//! HTTP API for Linguist.
//!
//! Exposes the query facade over axum: cached per-entity breakdowns, a bulk
//! listing, refresh requests, and a health probe.

pub mod error;
pub mod handlers;
pub mod routes;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use linguist_core::query::QueryFacade;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub facade: Arc<QueryFacade>,
}

impl AppState {
    pub fn new(facade: Arc<QueryFacade>) -> Self {
        Self { facade }
    }
}

/// Create the application router with request tracing.
pub fn create_app(state: AppState) -> Router {
    routes::api_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "HTTP API listening");
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown)
        .await
}
