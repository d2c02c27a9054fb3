//! Error responses for the console API.
//!
//! Every error body is `{ "success": false, "message": "..." }`.

use assignment_engine::EngineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors that can occur while serving a console request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Assignment core error.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Engine(err) => {
                let status = match err {
                    EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
                    EngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
                    EngineError::ConflictingAssignment { .. } => StatusCode::CONFLICT,
                    EngineError::AgentUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    EngineError::Conversation(_) => StatusCode::BAD_GATEWAY,
                    EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!("request failed: {}", err);
                } else {
                    tracing::debug!("request rejected: {}", err);
                }
                (status, err.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = serde_json::json!({
            "success": false,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for console handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
