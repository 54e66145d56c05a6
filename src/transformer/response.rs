//! Response conversion: OpenAI chat completions → Anthropic Messages.
//!
//! Handles the non-streaming branch. Output block ordering is fixed as
//! thinking, then text, then tool uses, mirroring the streaming side.

use super::anthropic::{constants, ContentBlock, MessagesResponse, Usage};
use super::ids;
use super::openai::{map_finish_reason, ChatResponse};
use crate::core::{AppError, Result};
use serde_json::{json, Value};

/// Convert an upstream chat completion response into an Anthropic message.
pub fn openai_to_anthropic_response(
    response: &ChatResponse,
    original_model: &str,
) -> Result<MessagesResponse> {
    let choice = response
        .choices
        .first()
        .ok_or_else(|| AppError::BadRequest("No choices in upstream response".to_string()))?;
    let message = &choice.message;

    let mut content: Vec<ContentBlock> = Vec::new();

    // Thinking first. Structured thinking_blocks win over reasoning_content.
    let has_thinking_blocks = message
        .thinking_blocks
        .as_ref()
        .map(|blocks| !blocks.is_empty())
        .unwrap_or(false);

    if has_thinking_blocks {
        for block in message.thinking_blocks.as_ref().unwrap() {
            content.push(ContentBlock::thinking(
                block.thinking.clone().unwrap_or_default(),
                block.signature.clone(),
            ));
        }
    } else if let Some(ref reasoning) = message.reasoning_content {
        if !reasoning.is_empty() {
            let signature = response.id.as_deref().map(ids::signature_for);
            content.push(ContentBlock::thinking(reasoning.clone(), signature));
        }
    }

    // Then text.
    if let Some(ref text) = message.content {
        if !text.is_empty() {
            content.push(ContentBlock::text(text.clone()));
        }
    }

    // Then tool uses.
    if let Some(ref tool_calls) = message.tool_calls {
        for call in tool_calls {
            content.push(ContentBlock::tool_use(
                &call.id,
                &call.function.name,
                parse_tool_arguments(&call.function.arguments),
            ));
        }
    }

    let stop_reason = choice
        .finish_reason
        .as_deref()
        .map(map_finish_reason)
        .unwrap_or(constants::STOP_END_TURN);

    let usage = response
        .usage
        .as_ref()
        .map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(MessagesResponse::new(
        ids::mint_message_id(response.id.as_deref()),
        original_model,
        content,
        Some(stop_reason.to_string()),
        usage,
    ))
}

/// Parse a tool call's JSON-serialized arguments. A parse failure never
/// fails the response; the raw string is surfaced instead.
pub fn parse_tool_arguments(arguments: &str) -> Value {
    if arguments.is_empty() {
        return json!({});
    }
    match serde_json::from_str(arguments) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse tool call arguments");
            json!({"_raw": arguments})
        }
    }
}
