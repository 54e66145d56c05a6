//! Error types and handling for the gateway.
//!
//! This module provides a unified error type [`AppError`] that wraps the
//! error sources of the request path and converts them into Anthropic-shape
//! JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed client request (invalid JSON, missing required field)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No credential found on the request and no fallback configured
    #[error("Unauthorized")]
    Unauthorized,

    /// Upstream returned a non-2xx response; status and body are forwarded verbatim
    #[error("Upstream error: {status}")]
    Upstream {
        status: StatusCode,
        body: bytes::Bytes,
    },

    /// Transport errors from the reqwest client
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error", msg)
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "Missing API key: pass it via 'Authorization: Bearer <key>' or 'x-api-key'"
                    .to_string(),
            ),
            AppError::Upstream { status, body } => {
                // The upstream status and JSON body pass through untouched.
                return Response::builder()
                    .status(status)
                    .header("Content-Type", "application/json")
                    .body(axum::body::Body::from(body))
                    .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response());
            }
            AppError::Request(e) => {
                let status = if e.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                };
                (status, "api_error", e.to_string())
            }
            AppError::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "api_error",
                e.to_string(),
            ),
        };

        let body = Json(json!({
            "type": "error",
            "error": {
                "type": error_type,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
