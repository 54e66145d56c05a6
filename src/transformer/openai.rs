//! OpenAI chat completions wire types.
//!
//! Only the upstream-facing shapes the gateway actually reads are modeled:
//! the non-streaming response and the streaming chunk envelope. Outbound
//! request payloads are assembled as raw JSON by the request converter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Non-streaming response
// ============================================================================

/// Chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<UsageInfo>,
}

/// Response choice.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant message in a response choice.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub thinking_blocks: Option<Vec<ThinkingBlock>>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Structured thinking fragment, possibly carrying a signature.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ThinkingBlock {
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

/// Completed tool call.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

/// Function name and JSON-serialized arguments.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// Token usage block.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UsageInfo {
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
}

// ============================================================================
// Streaming chunks
// ============================================================================

/// One streaming chunk (`data: {...}` payload).
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<UsageInfo>,
}

/// Streaming choice carrying the delta.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental delta payload. Any combination of fields may be present.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub thinking_blocks: Option<Vec<ThinkingBlock>>,
    #[serde(default)]
    pub tool_calls: Option<Vec<DeltaToolCall>>,
}

/// Incremental tool-call fragment, keyed by `index`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeltaToolCall {
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<DeltaFunction>,
}

/// Incremental function name / arguments fragments.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeltaFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Map an OpenAI `finish_reason` to an Anthropic stop reason.
///
/// Exhaustive over the closed domain; anything unexpected maps to `end_turn`.
pub fn map_finish_reason(finish_reason: &str) -> &'static str {
    use super::anthropic::constants;
    match finish_reason {
        "stop" => constants::STOP_END_TURN,
        "length" => constants::STOP_MAX_TOKENS,
        "tool_calls" => constants::STOP_TOOL_USE,
        _ => constants::STOP_END_TURN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_finish_reason() {
        assert_eq!(map_finish_reason("stop"), "end_turn");
        assert_eq!(map_finish_reason("length"), "max_tokens");
        assert_eq!(map_finish_reason("tool_calls"), "tool_use");
        assert_eq!(map_finish_reason("content_filter"), "end_turn");
        assert_eq!(map_finish_reason(""), "end_turn");
    }

    #[test]
    fn test_stream_chunk_deserialization() {
        let raw = json!({
            "id": "chatcmpl-abc",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": "Hel"}, "finish_reason": null}]
        });
        let chunk: StreamChunk = serde_json::from_value(raw).unwrap();
        assert_eq!(chunk.id.as_deref(), Some("chatcmpl-abc"));
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hel"));
        assert!(chunk.choices[0].finish_reason.is_none());
    }

    #[test]
    fn test_usage_only_chunk() {
        // Final chunk under stream_options.include_usage has empty choices.
        let raw = json!({
            "id": "chatcmpl-abc",
            "choices": [],
            "usage": {"prompt_tokens": 10, "completion_tokens": 7, "total_tokens": 17}
        });
        let chunk: StreamChunk = serde_json::from_value(raw).unwrap();
        assert!(chunk.choices.is_empty());
        assert_eq!(chunk.usage.unwrap().completion_tokens, 7);
    }

    #[test]
    fn test_delta_tool_call_fragments() {
        let raw = json!({
            "choices": [{"delta": {"tool_calls": [
                {"index": 0, "id": "call_1", "function": {"name": "lookup"}}
            ]}}]
        });
        let chunk: StreamChunk = serde_json::from_value(raw).unwrap();
        let tc = &chunk.choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(tc.index, 0);
        assert_eq!(tc.id.as_deref(), Some("call_1"));
        assert_eq!(
            tc.function.as_ref().unwrap().name.as_deref(),
            Some("lookup")
        );
        assert!(tc.function.as_ref().unwrap().arguments.is_none());
    }

    #[test]
    fn test_thinking_blocks_delta() {
        let raw = json!({
            "choices": [{"delta": {"thinking_blocks": [
                {"type": "thinking", "thinking": "hmm", "signature": "s1"}
            ]}}]
        });
        let chunk: StreamChunk = serde_json::from_value(raw).unwrap();
        let blocks = chunk.choices[0].delta.thinking_blocks.as_ref().unwrap();
        assert_eq!(blocks[0].thinking.as_deref(), Some("hmm"));
        assert_eq!(blocks[0].signature.as_deref(), Some("s1"));
    }
}
