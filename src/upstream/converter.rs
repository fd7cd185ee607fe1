//! Chat-completions chunk to event conversion
//!
//! Upstream deltas map to transcript events as follows:
//!
//! | chunk field                              | event                   |
//! |------------------------------------------|-------------------------|
//! | `delta.reasoning_content` / `reasoning`  | `reasoning-delta`       |
//! | `delta.content`                          | `text-delta`            |
//! | `delta.tool_calls[i]` (accumulated)      | `tool-input-available`  |
//!
//! Tool call fragments are only released once the choice reports a
//! `finish_reason` or the stream ends, since their arguments arrive in
//! pieces.

use std::collections::BTreeMap;

use serde_json::Value;

use super::errors::UpstreamError;
use super::sse::{SseDecoder, SseFrame};
use super::types::{ChatCompletionChunk, ChatMessage, FunctionCall, ToolCall, Usage};
use crate::transcript::{Event, Message, Part, Role, ToolCallState};

/// Tool call assembled from streamed fragments
#[derive(Debug, Default)]
struct PendingToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl PendingToolCall {
    fn into_event(self) -> Option<Event> {
        if self.name.is_empty() {
            tracing::warn!(call_id = ?self.id, "Dropping streamed tool call without a name");
            return None;
        }
        let call_id = self
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
        Some(Event::tool_input(
            call_id,
            self.name,
            parse_arguments(&self.arguments),
        ))
    }
}

/// Decode tool arguments, keeping the raw text when it is not JSON
pub fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Stateful chunk converter for one streamed completion
#[derive(Debug, Default)]
pub struct ChunkConverter {
    pending: BTreeMap<u32, PendingToolCall>,
    usage: Option<Usage>,
    finish_reason: Option<String>,
}

impl ChunkConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert one chunk, only the first choice is considered
    pub fn convert(&mut self, chunk: &ChatCompletionChunk) -> Vec<Event> {
        let mut events = Vec::new();

        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        let Some(choice) = chunk.choices.first() else {
            return events;
        };
        let delta = &choice.delta;

        if let Some(reasoning) = delta.reasoning_text() {
            events.push(Event::reasoning(reasoning));
        }
        if let Some(content) = delta.content_text() {
            events.push(Event::text(content));
        }

        for fragment in delta.tool_call_deltas() {
            let pending = self.pending.entry(fragment.index).or_default();
            if let Some(id) = fragment.id.as_deref().filter(|id| !id.is_empty()) {
                pending.id = Some(id.to_string());
            }
            if let Some(function) = &fragment.function {
                if let Some(name) = &function.name {
                    pending.name.push_str(name);
                }
                if let Some(arguments) = &function.arguments {
                    pending.arguments.push_str(arguments);
                }
            }
        }

        if let Some(reason) = &choice.finish_reason {
            tracing::debug!(finish_reason = %reason, "Upstream choice finished");
            self.finish_reason = Some(reason.clone());
            events.extend(self.flush_tool_calls());
        }

        events
    }

    fn flush_tool_calls(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
            .into_values()
            .filter_map(PendingToolCall::into_event)
            .collect()
    }

    /// Release tool calls still pending at stream end
    pub fn finish(&mut self) -> Vec<Event> {
        self.flush_tool_calls()
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    pub fn has_pending_tool_calls(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Byte stream to event decoder for one upstream response
pub struct UpstreamDecoder {
    sse: SseDecoder,
    converter: ChunkConverter,
    saw_done: bool,
    chunks: usize,
}

impl Default for UpstreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamDecoder {
    pub fn new() -> Self {
        Self {
            sse: SseDecoder::new(),
            converter: ChunkConverter::new(),
            saw_done: false,
            chunks: 0,
        }
    }

    /// Feed raw response bytes, returning every event they complete
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Event>, UpstreamError> {
        self.sse.feed(bytes)?;

        let mut events = Vec::new();
        loop {
            match self.sse.decode() {
                Ok(Some(frame)) => self.handle_frame(&frame, &mut events)?,
                Ok(None) => break,
                Err(e) if self.sse.is_stopped() => return Err(e.into()),
                Err(e) => tracing::warn!("Skipping undecodable upstream frame: {}", e),
            }
        }
        Ok(events)
    }

    /// Signal the end of the byte stream
    ///
    /// Fails with [`UpstreamError::Truncated`] when neither `[DONE]` nor a
    /// finish reason was seen.
    pub fn finish(&mut self) -> Result<Vec<Event>, UpstreamError> {
        let mut events = Vec::new();
        match self.sse.flush() {
            Ok(Some(frame)) => self.handle_frame(&frame, &mut events)?,
            Ok(None) => {}
            Err(e) => tracing::warn!("Discarding undecodable trailing frame: {}", e),
        }

        if let Some(usage) = self.converter.usage() {
            tracing::info!(
                prompt_tokens = ?usage.prompt_tokens,
                completion_tokens = ?usage.completion_tokens,
                total_tokens = ?usage.total_tokens,
                "Upstream usage"
            );
        }

        if !self.saw_done && self.converter.finish_reason().is_none() {
            tracing::error!(
                chunks = self.chunks,
                pending_tool_calls = self.converter.has_pending_tool_calls(),
                "Upstream stream ended without completion marker"
            );
            return Err(UpstreamError::Truncated);
        }

        events.extend(self.converter.finish());
        Ok(events)
    }

    fn handle_frame(
        &mut self,
        frame: &SseFrame,
        events: &mut Vec<Event>,
    ) -> Result<(), UpstreamError> {
        if self.saw_done {
            return Ok(());
        }
        if frame.is_done() {
            self.saw_done = true;
            return Ok(());
        }
        if frame.data.trim().is_empty() {
            return Ok(());
        }

        let chunk: ChatCompletionChunk = match frame.payload_as_json() {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("Skipping malformed upstream chunk: {}", e);
                return Ok(());
            }
        };

        if let Some(error) = &chunk.error {
            let message = error
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(UpstreamError::Stream(message));
        }

        self.chunks += 1;
        events.extend(self.converter.convert(&chunk));
        Ok(())
    }
}

/// Build the upstream message list for a new turn
///
/// The system prompt comes first. Assistant reasoning is not sent back;
/// each run of tool calls is followed by one `tool` message per call.
pub fn messages_from_transcript(system_prompt: &str, history: &[Message]) -> Vec<ChatMessage> {
    let mut messages = Vec::new();
    if !system_prompt.trim().is_empty() {
        messages.push(ChatMessage::system(system_prompt));
    }

    for message in history {
        match message.role {
            Role::User => messages.push(ChatMessage::user(message.text())),
            Role::Assistant => push_assistant(&mut messages, message),
        }
    }
    messages
}

fn push_assistant(messages: &mut Vec<ChatMessage>, message: &Message) {
    let mut content = String::new();
    let mut calls = Vec::new();

    for part in &message.parts {
        match part {
            Part::Text { text } => {
                if !calls.is_empty() {
                    flush_assistant(messages, &mut content, &mut calls);
                }
                content.push_str(text);
            }
            Part::Reasoning { .. } => {}
            Part::ToolCall(call) => calls.push(call),
        }
    }
    flush_assistant(messages, &mut content, &mut calls);
}

fn flush_assistant(
    messages: &mut Vec<ChatMessage>,
    content: &mut String,
    calls: &mut Vec<&crate::transcript::ToolCallPart>,
) {
    if content.is_empty() && calls.is_empty() {
        return;
    }

    let mut assistant = ChatMessage::assistant(std::mem::take(content));
    if assistant.content.as_deref() == Some("") {
        assistant.content = None;
    }
    assistant.tool_calls = calls
        .iter()
        .map(|call| ToolCall {
            id: call.call_id.clone(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: call.tool_name.clone(),
                arguments: match &call.input {
                    Value::String(raw) => raw.clone(),
                    other => other.to_string(),
                },
            },
        })
        .collect();
    messages.push(assistant);

    for call in calls.drain(..) {
        let result = match call.state {
            ToolCallState::OutputAvailable => call
                .output
                .as_ref()
                .map(|output| match output {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default(),
            ToolCallState::OutputError => {
                format!("Error: {}", call.error_text.as_deref().unwrap_or_default())
            }
            ToolCallState::InputAvailable => "Error: tool call did not complete".to_string(),
        };
        messages.push(ChatMessage::tool(call.call_id.clone(), result));
    }
}
