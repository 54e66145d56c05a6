//! claude-bridge — a protocol-translation gateway for LLM APIs.
//!
//! Accepts requests in the Anthropic Messages shape on `POST /v1/messages`
//! and forwards them to an OpenAI-compatible `POST /chat/completions`
//! upstream, translating the request on the way out and the response on the
//! way back. Tool calls, multimodal input, interleaved thinking blocks, and
//! streaming all survive the round trip.
//!
//! # Architecture
//!
//! - [`core`]: configuration and error handling
//! - [`api`]: HTTP handlers and the router
//! - [`transformer`]: the translation cores — request/response converters,
//!   the schema sanitizer, id minting, and the streaming state machine

pub mod api;
pub mod core;
pub mod transformer;

// Re-export commonly used types for convenience
pub use api::{build_router, AppState};
pub use core::{AppConfig, AppError, Result};
