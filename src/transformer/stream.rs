//! Streaming conversion: OpenAI chat completion chunks → Anthropic SSE events.
//!
//! The upstream speaks `data: <json>` lines terminated by `data: [DONE]`;
//! the client expects the Anthropic event grammar
//! `message_start (content_block_start content_block_delta* content_block_stop)*
//! message_delta message_stop`. [`StreamState`] is the per-request machine
//! that bridges the two: it frames lines out of arbitrary byte chunks,
//! detects transitions between content kinds (thinking → text → tool use),
//! assigns strictly increasing block indices, accumulates partial tool-call
//! JSON, and tracks token usage as a running maximum.
//!
//! Everything inside one request is strictly sequential: bytes in, events
//! out, no locking.

use super::anthropic::constants;
use super::ids;
use super::openai::{map_finish_reason, DeltaToolCall, StreamChunk, ThinkingBlock};
use futures::stream::{Stream, StreamExt};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};

/// Conventional upstream index of the single in-progress thinking stream.
const THINKING_STREAM_INDEX: i64 = 0;

/// State for one structured thinking block.
#[derive(Debug, Clone, Default)]
struct ThinkingState {
    claude_index: i64,
    started: bool,
    stopped: bool,
    signature: Option<String>,
}

/// State for one tool call, keyed by its upstream index.
#[derive(Debug, Clone, Default)]
struct ToolCallState {
    id: Option<String>,
    name: Option<String>,
    args_buffer: String,
    args_emitted: bool,
    claude_index: i64,
    started: bool,
    stopped: bool,
}

/// Per-request streaming translation state.
#[derive(Debug)]
pub struct StreamState {
    original_model: String,
    /// Has `message_start` been emitted?
    initialized: bool,
    /// Client-facing message id, minted from the first chunk's upstream id.
    message_id: String,
    /// Original upstream id, retained for signature derivation.
    request_id: Option<String>,
    /// Next content block index to assign; -1 until the first block opens.
    content_block_index: i64,
    thinking: HashMap<i64, ThinkingState>,
    reasoning_started: bool,
    reasoning_stopped: bool,
    reasoning_index: i64,
    text_started: bool,
    text_stopped: bool,
    text_index: i64,
    tool_calls: HashMap<i64, ToolCallState>,
    /// Running maxima over usages seen in the stream.
    input_tokens: i64,
    output_tokens: i64,
    stop_reason: &'static str,
    /// Partial trailing line carried between chunks.
    line_buffer: String,
    finished: bool,
}

impl StreamState {
    /// Create the state for a new request. `original_model` is echoed back
    /// to the client in `message_start`.
    pub fn new(original_model: impl Into<String>) -> Self {
        StreamState {
            original_model: original_model.into(),
            initialized: false,
            message_id: String::new(),
            request_id: None,
            content_block_index: -1,
            thinking: HashMap::new(),
            reasoning_started: false,
            reasoning_stopped: false,
            reasoning_index: 0,
            text_started: false,
            text_stopped: false,
            text_index: 0,
            tool_calls: HashMap::new(),
            input_tokens: 0,
            output_tokens: 0,
            stop_reason: constants::STOP_END_TURN,
            line_buffer: String::new(),
            finished: false,
        }
    }

    /// Whether the terminal events have been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one upstream byte chunk, returning the Anthropic SSE events it
    /// produces. Lines may span chunk boundaries; the partial tail is held
    /// until the next call.
    pub fn process_chunk(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }

        self.line_buffer.push_str(&String::from_utf8_lossy(bytes));

        while let Some(pos) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=pos).collect();
            self.process_line(line.trim_end_matches(['\n', '\r']), &mut out);
            if self.finished {
                break;
            }
        }

        out
    }

    /// Close any open blocks and emit the terminal `message_delta` +
    /// `message_stop`. Safe to call once; later calls are no-ops.
    pub fn finalize(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.finished = true;

        // A stream that died before any parseable chunk still terminates
        // with a well-formed event sequence.
        if !self.initialized {
            self.message_id = ids::mint_message_id(None);
            self.emit_message_start(&mut out);
        }

        self.close_reasoning_block(&mut out);
        self.close_thinking_blocks(&mut out);
        self.close_text_block(&mut out);
        self.close_tool_blocks(&mut out);

        out.push(sse_event(
            constants::EVENT_MESSAGE_DELTA,
            &json!({
                "type": constants::EVENT_MESSAGE_DELTA,
                "delta": {"stop_reason": self.stop_reason, "stop_sequence": null},
                "usage": {"input_tokens": self.input_tokens, "output_tokens": self.output_tokens}
            }),
        ));
        out.push(sse_event(
            constants::EVENT_MESSAGE_STOP,
            &json!({"type": constants::EVENT_MESSAGE_STOP}),
        ));

        out
    }

    /// Terminal path for an upstream that errored or closed before `[DONE]`.
    /// This termination always reports `end_turn`, even when a
    /// `finish_reason` had already been seen mid-stream.
    pub fn finalize_early(&mut self) -> Vec<String> {
        if !self.finished {
            self.stop_reason = constants::STOP_END_TURN;
        }
        self.finalize()
    }

    // ------------------------------------------------------------------
    // Line and chunk handling
    // ------------------------------------------------------------------

    fn process_line(&mut self, line: &str, out: &mut Vec<String>) {
        let line = line.trim();
        let Some(payload) = line.strip_prefix("data: ") else {
            return;
        };

        if payload.trim() == "[DONE]" {
            let events = self.finalize();
            out.extend(events);
            return;
        }

        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => self.handle_chunk(chunk, out),
            Err(e) => {
                // Malformed payloads are dropped; the stream continues.
                tracing::warn!(error = %e, "Skipping unparseable stream chunk");
            }
        }
    }

    fn handle_chunk(&mut self, chunk: StreamChunk, out: &mut Vec<String>) {
        if let Some(ref usage) = chunk.usage {
            self.input_tokens = self.input_tokens.max(usage.prompt_tokens);
            self.output_tokens = self.output_tokens.max(usage.completion_tokens);
        }

        if !self.initialized {
            let upstream_id = chunk.id.as_deref().filter(|id| !id.is_empty());
            self.message_id = ids::mint_message_id(upstream_id);
            self.request_id = upstream_id.map(|id| id.to_string());
            self.emit_message_start(out);
        }

        let Some(choice) = chunk.choices.first() else {
            return;
        };

        if let Some(ref reason) = choice.finish_reason {
            self.stop_reason = map_finish_reason(reason);
        }

        let delta = &choice.delta;
        let has_thinking_blocks = delta
            .thinking_blocks
            .as_ref()
            .map(|b| !b.is_empty())
            .unwrap_or(false);
        let has_content = delta.content.is_some();
        let has_tool_calls = delta
            .tool_calls
            .as_ref()
            .map(|t| !t.is_empty())
            .unwrap_or(false);

        // Transitions between content kinds close the blocks left behind.
        if has_thinking_blocks {
            // The structured pathway supersedes reasoning_content.
            self.close_reasoning_block(out);
        }
        if has_content || has_tool_calls {
            self.close_reasoning_block(out);
            self.close_thinking_blocks(out);
        }
        if has_tool_calls && !has_content {
            self.close_text_block(out);
        }

        if has_thinking_blocks {
            let blocks = delta.thinking_blocks.clone().unwrap_or_default();
            self.handle_thinking_blocks(&blocks, out);
        } else if let Some(ref reasoning) = delta.reasoning_content {
            self.handle_reasoning(reasoning, out);
        }

        if let Some(ref content) = delta.content {
            self.handle_text(content, out);
        }

        if let Some(tool_calls) = delta.tool_calls.clone() {
            self.handle_tool_calls(&tool_calls, out);
        }
    }

    // ------------------------------------------------------------------
    // Delta handlers
    // ------------------------------------------------------------------

    fn handle_thinking_blocks(&mut self, blocks: &[ThinkingBlock], out: &mut Vec<String>) {
        for block in blocks {
            let already_open = self
                .thinking
                .get(&THINKING_STREAM_INDEX)
                .map(|s| s.started)
                .unwrap_or(false);

            {
                let state = self.thinking.entry(THINKING_STREAM_INDEX).or_default();
                if let Some(ref sig) = block.signature {
                    state.signature = Some(sig.clone());
                }
            }

            if !already_open && (block.thinking.is_some() || block.signature.is_some()) {
                let index = self.claim_index();
                let state = self.thinking.get_mut(&THINKING_STREAM_INDEX).unwrap();
                state.claude_index = index;
                state.started = true;

                let mut content_block = json!({"type": "thinking", "thinking": ""});
                if let Some(ref sig) = state.signature {
                    content_block["signature"] = json!(sig);
                }
                out.push(sse_event(
                    constants::EVENT_CONTENT_BLOCK_START,
                    &json!({
                        "type": constants::EVENT_CONTENT_BLOCK_START,
                        "index": index,
                        "content_block": content_block
                    }),
                ));
            }

            let (index, live) = match self.thinking.get(&THINKING_STREAM_INDEX) {
                Some(s) => (s.claude_index, s.started && !s.stopped),
                None => continue,
            };
            if !live {
                continue;
            }

            if let Some(ref text) = block.thinking {
                out.push(sse_event(
                    constants::EVENT_CONTENT_BLOCK_DELTA,
                    &json!({
                        "type": constants::EVENT_CONTENT_BLOCK_DELTA,
                        "index": index,
                        "delta": {"type": constants::DELTA_THINKING, "thinking": text}
                    }),
                ));
            }

            // A signature for a block that was already open streams out as
            // its own delta; one known at open time rode along in the start.
            if already_open {
                if let Some(ref sig) = block.signature {
                    out.push(sse_event(
                        constants::EVENT_CONTENT_BLOCK_DELTA,
                        &json!({
                            "type": constants::EVENT_CONTENT_BLOCK_DELTA,
                            "index": index,
                            "delta": {"type": constants::DELTA_SIGNATURE, "signature": sig}
                        }),
                    ));
                }
            }
        }
    }

    fn handle_reasoning(&mut self, text: &str, out: &mut Vec<String>) {
        if self.reasoning_stopped {
            return;
        }
        if !self.reasoning_started {
            let index = self.claim_index();
            self.reasoning_index = index;
            self.reasoning_started = true;
            out.push(sse_event(
                constants::EVENT_CONTENT_BLOCK_START,
                &json!({
                    "type": constants::EVENT_CONTENT_BLOCK_START,
                    "index": index,
                    "content_block": {"type": "thinking", "thinking": ""}
                }),
            ));
        }
        out.push(sse_event(
            constants::EVENT_CONTENT_BLOCK_DELTA,
            &json!({
                "type": constants::EVENT_CONTENT_BLOCK_DELTA,
                "index": self.reasoning_index,
                "delta": {"type": constants::DELTA_THINKING, "thinking": text}
            }),
        ));
    }

    fn handle_text(&mut self, text: &str, out: &mut Vec<String>) {
        if self.text_stopped {
            return;
        }
        if !self.text_started {
            let index = self.claim_index();
            self.text_index = index;
            self.text_started = true;
            out.push(sse_event(
                constants::EVENT_CONTENT_BLOCK_START,
                &json!({
                    "type": constants::EVENT_CONTENT_BLOCK_START,
                    "index": index,
                    "content_block": {"type": "text", "text": ""}
                }),
            ));
        }
        out.push(sse_event(
            constants::EVENT_CONTENT_BLOCK_DELTA,
            &json!({
                "type": constants::EVENT_CONTENT_BLOCK_DELTA,
                "index": self.text_index,
                "delta": {"type": constants::DELTA_TEXT, "text": text}
            }),
        ));
    }

    fn handle_tool_calls(&mut self, tool_calls: &[DeltaToolCall], out: &mut Vec<String>) {
        for tc in tool_calls {
            let upstream_index = tc.index;
            self.tool_calls.entry(upstream_index).or_default();

            // Accumulate id / name fragments.
            {
                let state = self.tool_calls.get_mut(&upstream_index).unwrap();
                if let Some(ref id) = tc.id {
                    match state.id {
                        Some(ref mut existing) => existing.push_str(id),
                        None => state.id = Some(id.clone()),
                    }
                }
                if let Some(ref function) = tc.function {
                    if let Some(ref name) = function.name {
                        match state.name {
                            Some(ref mut existing) => existing.push_str(name),
                            None => state.name = Some(name.clone()),
                        }
                    }
                }
            }

            // The block opens once both id and name are known.
            let ready = {
                let state = &self.tool_calls[&upstream_index];
                !state.started && state.id.is_some() && state.name.is_some()
            };
            if ready {
                // A block still open from earlier content closes first so
                // indices stay strictly increasing.
                self.close_text_block(out);
                self.close_open_tool_blocks_except(upstream_index, out);

                let index = self.claim_index();
                let state = self.tool_calls.get_mut(&upstream_index).unwrap();
                state.claude_index = index;
                state.started = true;
                out.push(sse_event(
                    constants::EVENT_CONTENT_BLOCK_START,
                    &json!({
                        "type": constants::EVENT_CONTENT_BLOCK_START,
                        "index": index,
                        "content_block": {
                            "type": "tool_use",
                            "id": state.id,
                            "name": state.name,
                            "input": {}
                        }
                    }),
                ));

                // Argument fragments that arrived before the block could
                // open flush as one catch-up delta.
                if !state.args_buffer.is_empty() {
                    let buffered = state.args_buffer.clone();
                    state.args_emitted = true;
                    out.push(input_json_delta(index, &buffered));
                }
            }

            if let Some(ref function) = tc.function {
                if let Some(ref arguments) = function.arguments {
                    let state = self.tool_calls.get_mut(&upstream_index).unwrap();
                    state.args_buffer.push_str(arguments);
                    if state.started && !state.stopped {
                        state.args_emitted = true;
                        out.push(input_json_delta(state.claude_index, arguments));
                    } else if state.stopped {
                        tracing::warn!(
                            tool_index = upstream_index,
                            fragment_len = arguments.len(),
                            "Dropping argument fragment for an already-closed tool block"
                        );
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Block lifecycle helpers
    // ------------------------------------------------------------------

    /// Index for a block being opened. The -1 sentinel bumps to 0 on the
    /// first open; afterwards each close advances the counter.
    fn claim_index(&mut self) -> i64 {
        if self.content_block_index < 0 {
            self.content_block_index = 0;
        }
        self.content_block_index
    }

    fn advance_index(&mut self) {
        self.content_block_index += 1;
    }

    fn emit_message_start(&mut self, out: &mut Vec<String>) {
        self.initialized = true;
        out.push(sse_event(
            constants::EVENT_MESSAGE_START,
            &json!({
                "type": constants::EVENT_MESSAGE_START,
                "message": {
                    "id": self.message_id,
                    "type": "message",
                    "role": "assistant",
                    "model": self.original_model,
                    "content": [],
                    "stop_reason": null,
                    "usage": {"input_tokens": 0, "output_tokens": 0}
                }
            }),
        ));
    }

    /// Close the reasoning-content block, emitting its derived signature
    /// before the stop.
    fn close_reasoning_block(&mut self, out: &mut Vec<String>) {
        if !self.reasoning_started || self.reasoning_stopped {
            return;
        }
        let signature = self
            .request_id
            .as_deref()
            .map(ids::signature_for)
            .unwrap_or_default();
        out.push(sse_event(
            constants::EVENT_CONTENT_BLOCK_DELTA,
            &json!({
                "type": constants::EVENT_CONTENT_BLOCK_DELTA,
                "index": self.reasoning_index,
                "delta": {"type": constants::DELTA_SIGNATURE, "signature": signature}
            }),
        ));
        out.push(content_block_stop(self.reasoning_index));
        self.reasoning_stopped = true;
        self.advance_index();
    }

    fn close_thinking_blocks(&mut self, out: &mut Vec<String>) {
        let mut open: Vec<i64> = self
            .thinking
            .iter()
            .filter(|(_, s)| s.started && !s.stopped)
            .map(|(k, _)| *k)
            .collect();
        open.sort_unstable();
        for key in open {
            let index = self.thinking[&key].claude_index;
            out.push(content_block_stop(index));
            self.thinking.get_mut(&key).unwrap().stopped = true;
            self.advance_index();
        }
    }

    fn close_text_block(&mut self, out: &mut Vec<String>) {
        if !self.text_started || self.text_stopped {
            return;
        }
        out.push(content_block_stop(self.text_index));
        self.text_stopped = true;
        self.advance_index();
    }

    fn close_open_tool_blocks_except(&mut self, keep: i64, out: &mut Vec<String>) {
        let mut open: Vec<i64> = self
            .tool_calls
            .iter()
            .filter(|(k, s)| **k != keep && s.started && !s.stopped)
            .map(|(k, _)| *k)
            .collect();
        open.sort_unstable();
        for key in open {
            self.close_tool_block(key, out);
        }
    }

    /// Terminal close of every started tool block.
    fn close_tool_blocks(&mut self, out: &mut Vec<String>) {
        let mut started: Vec<i64> = self
            .tool_calls
            .iter()
            .filter(|(_, s)| s.started && !s.stopped)
            .map(|(k, _)| *k)
            .collect();
        started.sort_by_key(|k| self.tool_calls[k].claude_index);

        for key in started {
            self.close_tool_block(key, out);
        }
    }

    /// Close one started tool block, validating the accumulated argument
    /// JSON. Every `content_block_stop` for a tool block goes through here,
    /// so the client-visible guarantee — emitted `partial_json` fragments
    /// concatenate to a JSON value, or the failure is surfaced — holds no
    /// matter which path closes the block.
    fn close_tool_block(&mut self, key: i64, out: &mut Vec<String>) {
        let (index, buffer, args_emitted) = {
            let s = &self.tool_calls[&key];
            (s.claude_index, s.args_buffer.clone(), s.args_emitted)
        };

        if !buffer.is_empty() {
            if let Err(e) = serde_json::from_str::<Value>(&buffer) {
                tracing::warn!(
                    error = %e,
                    tool_index = key,
                    "Tool call arguments did not form valid JSON"
                );
                if !args_emitted {
                    let fallback = json!({"_raw": buffer}).to_string();
                    out.push(input_json_delta(index, &fallback));
                }
            }
        }

        out.push(content_block_stop(index));
        self.tool_calls.get_mut(&key).unwrap().stopped = true;
        self.advance_index();
    }
}

/// Format one SSE event frame.
fn sse_event(event: &str, data: &Value) -> String {
    format!("event: {}\ndata: {}\n\n", event, data)
}

fn content_block_stop(index: i64) -> String {
    sse_event(
        constants::EVENT_CONTENT_BLOCK_STOP,
        &json!({"type": constants::EVENT_CONTENT_BLOCK_STOP, "index": index}),
    )
}

fn input_json_delta(index: i64, partial_json: &str) -> String {
    sse_event(
        constants::EVENT_CONTENT_BLOCK_DELTA,
        &json!({
            "type": constants::EVENT_CONTENT_BLOCK_DELTA,
            "index": index,
            "delta": {"type": constants::DELTA_INPUT_JSON, "partial_json": partial_json}
        }),
    )
}

/// Adapt an upstream byte stream into Anthropic SSE event strings.
///
/// Emission order follows upstream chunk order; when the upstream errors or
/// closes early the accumulated state still produces a well-formed terminal
/// sequence.
pub fn convert_openai_stream<S>(
    upstream: S,
    original_model: impl Into<String>,
) -> impl Stream<Item = String> + Send
where
    S: Stream<Item = reqwest::Result<bytes::Bytes>> + Send + Unpin + 'static,
{
    let state = StreamState::new(original_model);

    futures::stream::unfold(
        (upstream, state, VecDeque::<String>::new()),
        |(mut upstream, mut state, mut pending)| async move {
            loop {
                if let Some(event) = pending.pop_front() {
                    return Some((event, (upstream, state, pending)));
                }
                if state.is_finished() {
                    return None;
                }
                match upstream.next().await {
                    Some(Ok(bytes)) => {
                        pending.extend(state.process_chunk(&bytes));
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Upstream stream error; closing downstream");
                        pending.extend(state.finalize_early());
                    }
                    None => {
                        pending.extend(state.finalize_early());
                    }
                }
            }
        },
    )
}

// ============================================================================
// Tests
// ============================================================================
