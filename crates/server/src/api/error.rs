//! Error responses for API handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use transmute_core::{ConverterKind, DownloadError, OrchestratorError};

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown converter kind: {0}")]
    UnknownKind(String),

    #[error("converter {0} is disabled")]
    KindDisabled(ConverterKind),

    #[error("invalid file id: {0}")]
    InvalidFileId(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownKind(_) | ApiError::KindDisabled(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidFileId(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Orchestrator(e) => match e {
                OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
                OrchestratorError::NotRemovable { .. } | OrchestratorError::Transition(_) => {
                    StatusCode::CONFLICT
                }
                OrchestratorError::Download(DownloadError::NotCompleted { .. }) => {
                    StatusCode::CONFLICT
                }
                OrchestratorError::Download(DownloadError::InvalidReference { .. }) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                OrchestratorError::Download(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
