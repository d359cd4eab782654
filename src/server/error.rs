use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::game::GameError;

const LOG_TARGET: &str = "server::error";

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        let message = err.to_string();
        match err {
            GameError::NotFound(_) => ApiError::NotFound(message),
            GameError::Unauthorized(_) => ApiError::Unauthorized(message),
            GameError::Conflict(_) => ApiError::Conflict(message),
            GameError::BadRequest(_) => ApiError::BadRequest(message),
            GameError::Internal(_) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(message) => {
                error!(target = LOG_TARGET, %message, "internal server error");
                message
            }
            ApiError::NotFound(message)
            | ApiError::Unauthorized(message)
            | ApiError::Conflict(message)
            | ApiError::BadRequest(message) => message,
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}
