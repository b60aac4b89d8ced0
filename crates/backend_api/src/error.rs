use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use data_import::ImportError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid query parameter: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("Snapshot sync is not configured")]
    SyncNotConfigured,

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Import(ImportError::UnknownFormat { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Import(ImportError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Import(_) => StatusCode::BAD_REQUEST,
            ApiError::SyncNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = json!({ "error": self.to_string() });
        if let ApiError::Import(ImportError::UnknownFormat { headers }) = &self {
            body["headers"] = json!(headers);
        }

        (status, Json(body)).into_response()
    }
}
