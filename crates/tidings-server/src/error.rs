use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use tidings_core::error::AppError;

use crate::dto::ErrorResponse;

pub enum ApiError {
    App(AppError),
    UnknownFeed(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::UnknownFeed(feed) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("No news feed named '{feed}'"),
            ),
            ApiError::App(err) => {
                let (status, error_type) = match &err {
                    AppError::DatabaseError(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "database_error")
                    }
                    AppError::ConfigError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
                    AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
                };
                (status, error_type, err.to_string())
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}
