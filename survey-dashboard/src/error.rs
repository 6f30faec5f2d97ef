//! Error type for HTTP handlers
//!
//! Every error renders as JSON with an `error` message; some variants add
//! detail keys (`missing_columns`, `line`/`column`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use survey_common::ingest::IngestError;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Upload rejected by the ingestion normalizer (400, or 500 for storage)
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// survey-common error
    #[error(transparent)]
    Common(#[from] survey_common::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Common(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::Ingest(IngestError::MissingColumns(columns)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "missing_columns": columns }),
            ),
            ApiError::Ingest(IngestError::InvalidCell { line, column, .. }) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "line": line, "column": column }),
            ),
            ApiError::Ingest(IngestError::Format(_)) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ApiError::Common(survey_common::Error::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ApiError::Common(survey_common::Error::RespondentNotFound(_)) => {
                (StatusCode::NOT_FOUND, json!({ "error": message }))
            }
            ApiError::Ingest(IngestError::Store(_)) | ApiError::Internal(_) | ApiError::Common(_) => {
                tracing::error!(error = %message, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
