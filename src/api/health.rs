//! Health probe endpoint.

use axum::{response::IntoResponse, Json};
use serde_json::json;

/// Handle `GET /health`.
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
