use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::application::AppError;

use super::types::ErrorResponse;

/// Literal 404 text expected by existing clients.
pub const NOT_FOUND_MESSAGE: &str = "Maison non trouvée";

/// Literal 500 text; store details are logged, never returned.
pub const INTERNAL_ERROR_MESSAGE: &str = "Erreur serveur";

#[derive(Debug)]
pub enum ApiError {
    App(AppError),
    /// Path segment that cannot name any house.
    UnknownHouse(String),
    BadRequest(String),
    /// The handler did not finish in time and was dropped.
    Timeout(Duration),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError::App(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::App(AppError::HouseNotFound(_)) | ApiError::UnknownHouse(_) => {
                (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE.to_string())
            }
            ApiError::App(AppError::InvalidAmount(message)) | ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, message)
            }
            ApiError::App(AppError::HouseAlreadyExists(number)) => (
                StatusCode::CONFLICT,
                format!("House already exists: {number}"),
            ),
            ApiError::App(err @ (AppError::TransactionFailed(_) | AppError::Database(_))) => {
                error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
            ApiError::Timeout(limit) => {
                warn!(timeout = ?limit, "request timed out, work rolled back");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
