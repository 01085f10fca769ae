use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use concilia_core::{DateRangeError, MatchError};
use concilia_import::import::ImportError;
use concilia_import::NormalizeError;
use concilia_storage::StorageError;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    DateRange(#[from] DateRangeError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Reconciliation {0} not found")]
    SessionNotFound(Uuid),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Match(_)
            | ApiError::Normalize(_)
            | ApiError::Import(_)
            | ApiError::DateRange(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
