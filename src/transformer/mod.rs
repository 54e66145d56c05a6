//! Protocol translation between the Anthropic Messages API and
//! OpenAI-compatible chat completions.
//!
//! The translation runs in both directions:
//!
//! ```text
//! Client (Anthropic shape)                Upstream (OpenAI shape)
//!     MessagesRequest  ── request.rs ──►  chat completions payload
//!     MessagesResponse ◄─ response.rs ──  chat completion JSON
//!     SSE event stream ◄─ stream.rs ────  chat completion chunk stream
//! ```
//!
//! `schema.rs` cleans tool input schemas on the way out; `ids.rs` derives
//! stable client-facing message ids and thinking-block signatures from
//! upstream ids.

pub mod anthropic;
pub mod ids;
pub mod openai;
pub mod request;
pub mod response;
pub mod schema;
pub mod stream;

pub use request::anthropic_to_openai_request;
pub use response::openai_to_anthropic_response;
pub use schema::sanitize_schema;
pub use stream::{convert_openai_stream, StreamState};
