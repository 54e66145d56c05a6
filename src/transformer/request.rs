//! Request conversion: Anthropic Messages → OpenAI chat completions.
//!
//! Flattens the turn structure of a Messages request into the flat
//! `system | user | assistant | tool` message list the upstream expects,
//! converts tool definitions and tool choice, and forwards the sampling
//! knobs that have an OpenAI analogue.

use super::anthropic::{ContentBlock, Message, MessageContent, MessagesRequest, SystemPrompt};
use super::schema::sanitize_schema;
use serde_json::{json, Value};

/// Convert an Anthropic Messages request into an OpenAI chat completions
/// payload.
pub fn anthropic_to_openai_request(request: &MessagesRequest) -> Value {
    let mut messages: Vec<Value> = Vec::new();

    // Leading system message
    if let Some(ref system) = request.system {
        let system_text = extract_system_text(system);
        if !system_text.trim().is_empty() {
            messages.push(json!({
                "role": "system",
                "content": system_text
            }));
        }
    }

    for msg in &request.messages {
        match msg.role.as_str() {
            "user" => convert_user_message(msg, &mut messages),
            "assistant" => messages.push(convert_assistant_message(msg)),
            other => {
                tracing::warn!(role = other, "Skipping message with unknown role");
            }
        }
    }

    let mut payload = json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request.max_tokens,
        "stream": request.stream,
    });

    if let Some(temperature) = request.temperature {
        payload["temperature"] = json!(temperature);
    }
    if let Some(top_p) = request.top_p {
        payload["top_p"] = json!(top_p);
    }
    if let Some(ref stop_sequences) = request.stop_sequences {
        payload["stop"] = json!(stop_sequences);
    }
    if request.top_k.is_some() {
        // No OpenAI analogue.
        tracing::debug!("Dropping top_k: not supported by chat completions");
    }

    if let Some(ref tools) = request.tools {
        if !tools.is_empty() {
            let converted: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description.as_deref().unwrap_or(""),
                            "parameters": sanitize_schema(&tool.input_schema)
                        }
                    })
                })
                .collect();
            payload["tools"] = json!(converted);
        }
    }

    if let Some(ref tool_choice) = request.tool_choice {
        payload["tool_choice"] = convert_tool_choice(tool_choice);
    }

    if let Some(ref thinking) = request.thinking {
        payload["thinking"] = json!(thinking);
    }

    if request.stream {
        // Ask the upstream for a final usage chunk.
        payload["stream_options"] = json!({"include_usage": true});
    }

    tracing::debug!(
        model = %request.model,
        message_count = messages_len(&payload),
        stream = request.stream,
        "Converted Messages request to chat completions format"
    );

    payload
}

fn messages_len(payload: &Value) -> usize {
    payload["messages"].as_array().map(|m| m.len()).unwrap_or(0)
}

/// Extract the system prompt text from a string or block list.
fn extract_system_text(system: &SystemPrompt) -> String {
    match system {
        SystemPrompt::Text(text) => text.clone(),
        SystemPrompt::Blocks(blocks) => blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Convert a user turn.
///
/// Each `tool_result` block becomes a standalone `tool` message; the
/// remaining text and image blocks become one `user` message.
fn convert_user_message(msg: &Message, out: &mut Vec<Value>) {
    let blocks = match &msg.content {
        MessageContent::Text(text) => {
            out.push(json!({"role": "user", "content": text}));
            return;
        }
        MessageContent::Blocks(blocks) => blocks,
    };

    let mut parts: Vec<Value> = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => {
                out.push(json!({
                    "role": "tool",
                    "tool_call_id": tool_use_id,
                    "content": stringify_tool_result(content)
                }));
            }
            ContentBlock::Text { text } => {
                parts.push(json!({"type": "text", "text": text}));
            }
            ContentBlock::Image { source } => {
                let url = format!("data:{};base64,{}", source.media_type, source.data);
                parts.push(json!({
                    "type": "image_url",
                    "image_url": {"url": url}
                }));
            }
            // thinking / tool_use blocks do not occur in user turns
            _ => {}
        }
    }

    if parts.is_empty() {
        return;
    }

    // Single text part collapses to a plain string
    if parts.len() == 1 {
        if let Some(text) = parts[0].get("text").and_then(|t| t.as_str()) {
            out.push(json!({"role": "user", "content": text}));
            return;
        }
    }

    out.push(json!({"role": "user", "content": parts}));
}

/// Convert an assistant turn.
///
/// Text and thinking blocks become the content (a plain string when the only
/// block is one text block, the empty string when there are none); tool_use
/// blocks become the `tool_calls` array.
fn convert_assistant_message(msg: &Message) -> Value {
    let blocks = match &msg.content {
        MessageContent::Text(text) => {
            return json!({"role": "assistant", "content": text});
        }
        MessageContent::Blocks(blocks) => blocks,
    };

    let mut content_parts: Vec<Value> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => {
                content_parts.push(json!({"type": "text", "text": text}));
            }
            ContentBlock::Thinking {
                thinking,
                signature,
            } => {
                let mut part = json!({"type": "thinking", "thinking": thinking});
                if let Some(sig) = signature {
                    part["signature"] = json!(sig);
                }
                content_parts.push(part);
            }
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(json!({
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": serde_json::to_string(input).unwrap_or_default()
                    }
                }));
            }
            // image / tool_result blocks do not occur in assistant turns
            _ => {}
        }
    }

    let content = if content_parts.is_empty() {
        json!("")
    } else if content_parts.len() == 1 && content_parts[0]["type"] == "text" {
        content_parts[0]["text"].clone()
    } else {
        json!(content_parts)
    };

    let mut message = json!({"role": "assistant", "content": content});
    if !tool_calls.is_empty() {
        message["tool_calls"] = json!(tool_calls);
    }
    message
}

/// Stringify tool result content: strings pass through, structured content
/// has its text parts joined, anything else is JSON-serialized.
fn stringify_tool_result(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| {
                    if let Some(obj) = item.as_object() {
                        if obj.get("type").and_then(|t| t.as_str()) == Some("text") {
                            return obj
                                .get("text")
                                .and_then(|t| t.as_str())
                                .map(|s| s.to_string());
                        }
                    }
                    if let Some(s) = item.as_str() {
                        return Some(s.to_string());
                    }
                    serde_json::to_string(item).ok()
                })
                .collect();
            parts.join("\n")
        }
        other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Convert an Anthropic tool_choice directive to the OpenAI form.
fn convert_tool_choice(tool_choice: &Value) -> Value {
    match tool_choice.get("type").and_then(|t| t.as_str()) {
        Some("auto") | Some("any") => json!("auto"),
        Some("tool") => match tool_choice.get("name").and_then(|n| n.as_str()) {
            Some(name) => json!({
                "type": "function",
                "function": {"name": name}
            }),
            None => json!("auto"),
        },
        _ => json!("auto"),
    }
}
