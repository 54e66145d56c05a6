//! Messages endpoint handler.
//!
//! The gateway shell: parse the Anthropic-shape request, pick the branch
//! (stream vs not), forward headers and the caller's credential, pipe bytes.

use crate::core::{AppConfig, AppError, Result};
use crate::transformer::anthropic::MessagesRequest;
use crate::transformer::openai::ChatResponse;
use crate::transformer::{
    anthropic_to_openai_request, convert_openai_stream, openai_to_anthropic_response,
};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use std::sync::Arc;

/// Headers forwarded to the upstream when the client supplies them.
const FORWARDED_HEADERS: &[&str] = &["x-real-ip", "user-agent", "referer"];

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig, http_client: reqwest::Client) -> Self {
        AppState {
            config,
            http_client,
        }
    }
}

/// Handle `POST /v1/messages`.
#[tracing::instrument(skip(state, headers, body))]
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let request: MessagesRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;

    let api_key = extract_api_key(&headers)
        .or_else(|| state.config.openai_api_key.clone())
        .ok_or(AppError::Unauthorized)?;

    let payload = anthropic_to_openai_request(&request);

    let mut upstream_request = state
        .http_client
        .post(state.config.chat_completions_url())
        .bearer_auth(&api_key)
        .json(&payload);
    for name in FORWARDED_HEADERS {
        if let Some(value) = headers.get(*name) {
            upstream_request = upstream_request.header(*name, value.clone());
        }
    }

    tracing::debug!(
        model = %request.model,
        stream = request.stream,
        "Forwarding request to upstream"
    );

    let response = upstream_request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        tracing::warn!(status = %status, "Upstream returned an error response");
        return Err(AppError::Upstream {
            status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            body,
        });
    }

    if request.stream {
        handle_streaming_response(response, request.model)
    } else {
        handle_non_streaming_response(response, &request.model).await
    }
}

/// Pipe the upstream SSE stream through the transformer.
fn handle_streaming_response(response: reqwest::Response, original_model: String) -> Result<Response> {
    let upstream = Box::pin(response.bytes_stream());
    let events = convert_openai_stream(upstream, original_model)
        .map(|event| Ok::<_, std::io::Error>(Bytes::from(event)));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .body(Body::from_stream(events))
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(response)
}

/// Map the upstream JSON reply to an Anthropic message.
async fn handle_non_streaming_response(
    response: reqwest::Response,
    original_model: &str,
) -> Result<Response> {
    let upstream: ChatResponse = response.json().await?;
    let message = openai_to_anthropic_response(&upstream, original_model)?;
    Ok(Json(message).into_response())
}

/// Extract the caller's credential from `Authorization: Bearer <k>` or
/// `x-api-key`.
fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(key) = auth.strip_prefix("Bearer ") {
            if !key.trim().is_empty() {
                return Some(key.trim().to_string());
            }
        }
    }
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_api_key_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer sk-test"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_extract_api_key_x_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("sk-other"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("sk-other"));
    }

    #[test]
    fn test_bearer_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer first"));
        headers.insert("x-api-key", HeaderValue::from_static("second"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("first"));
    }

    #[test]
    fn test_missing_key() {
        let headers = HeaderMap::new();
        assert!(extract_api_key(&headers).is_none());

        // A bare "Bearer" with nothing behind it does not count
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert!(extract_api_key(&headers).is_none());
    }
}
