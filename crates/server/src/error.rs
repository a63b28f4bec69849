use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use sqlx::error::ErrorKind;
use services::services::{
    database_validator::DatabaseValidationError, funnel::FunnelError, validation::ValidationError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Funnel(#[from] FunnelError),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    DatabaseValidation(#[from] DatabaseValidationError),
}

/// Machine-readable part of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) | ApiError::Funnel(FunnelError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            ApiError::NotFound(_)
            | ApiError::Funnel(
                FunnelError::ClientNotFound(_)
                | FunnelError::StageNotFound(_)
                | FunnelError::SourceNotFound { .. },
            ) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Database(e) => match e.as_database_error().map(|d| d.kind()) {
                Some(ErrorKind::UniqueViolation) => (StatusCode::CONFLICT, "CONFLICT"),
                Some(ErrorKind::ForeignKeyViolation) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                Some(ErrorKind::CheckViolation | ErrorKind::NotNullViolation) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            ApiError::Funnel(FunnelError::Database(_)) | ApiError::DatabaseValidation(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            _ if status.is_server_error() => {
                tracing::error!(error = %self, "Request failed");
                "Internal server error".to_string()
            }
            ApiError::Database(_) if status == StatusCode::CONFLICT => {
                "A record with the same key already exists".to_string()
            }
            ApiError::Database(_) if status == StatusCode::NOT_FOUND => {
                "Referenced record not found".to_string()
            }
            ApiError::Database(_) => "Value violates a database constraint".to_string(),
            _ => self.to_string(),
        };
        let body: ApiResponse<(), ErrorDetail> =
            ApiResponse::error_with_data(ErrorDetail { code }, &message);
        (status, Json(body)).into_response()
    }
}
