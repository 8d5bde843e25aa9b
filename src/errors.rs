use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::{devices::IntakeError, notifications::DispatchFailure, storage::StorageError};

/// Why an HTTP request failed. Rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The subscription is stored, but the push service refused the greeting.
    #[error("subscription saved but confirmation push failed: {0}")]
    Confirmation(DispatchFailure),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Intake(_) | AppError::Storage(StorageError::InvalidDeviceName(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Confirmation(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Filesystem details stay in the log.
            AppError::Storage(e) if status.is_server_error() => {
                error!(device = %e.key(), "Storage failure: {e}");
                "Internal server error".to_string()
            }
            AppError::Confirmation(_) => {
                error!("{self}");
                self.to_string()
            }
            _ => {
                warn!(status = status.as_u16(), "Rejected request: {self}");
                self.to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
