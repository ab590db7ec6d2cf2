use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use linguist_core::error::LinguistError;
use serde_json::json;
use tracing::warn;

/// Errors returned by handlers, rendered as `{ "error", "message" }` JSON.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No result stored for the entity.
    #[error("No language data for {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The result store could not be reached; worth retrying.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LinguistError> for ApiError {
    fn from(e: LinguistError) -> Self {
        match e {
            LinguistError::Store(_) => Self::Unavailable(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }
        let body = Json(json!({
            "error": code,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
