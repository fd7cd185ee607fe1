//! Transcript data model
//!
//! Parts, messages and the append-only transcript

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ProtocolViolation;

/// Kind of an accumulating text segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Text,
    Reasoning,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Reasoning => "reasoning",
        }
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tool call lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCallState {
    InputAvailable,
    OutputAvailable,
    OutputError,
}

impl ToolCallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputAvailable => "input-available",
            Self::OutputAvailable => "output-available",
            Self::OutputError => "output-error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InputAvailable)
    }
}

impl std::fmt::Display for ToolCallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tool invocation and its current lifecycle state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPart {
    pub call_id: String,
    pub tool_name: String,
    pub input: serde_json::Value,
    pub state: ToolCallState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl ToolCallPart {
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            input,
            state: ToolCallState::InputAvailable,
            output: None,
            error_text: None,
        }
    }
}

/// Atomic unit of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    Text { text: String },
    Reasoning { text: String },
    ToolCall(ToolCallPart),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning { text: text.into() }
    }

    /// Build a text or reasoning part from a closed segment
    pub fn segment(kind: SegmentKind, text: String) -> Self {
        match kind {
            SegmentKind::Text => Self::Text { text },
            SegmentKind::Reasoning => Self::Reasoning { text },
        }
    }

    #[cfg(test)]
    pub fn as_tool_call(&self) -> Option<&ToolCallPart> {
        match self {
            Self::ToolCall(part) => Some(part),
            _ => None,
        }
    }
}

/// Message author role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// How a message stopped receiving content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "lowercase")]
pub enum FinishReason {
    /// Event source was exhausted normally
    Completed,
    /// Consumer aborted the turn
    Cancelled,
    /// Event source failed before its natural end
    Interrupted { error: String },
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Interrupted { .. } => "interrupted",
        }
    }

    pub fn is_incomplete(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

fn default_finish() -> FinishReason {
    FinishReason::Completed
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default = "new_message_id")]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_finish")]
    pub finish: FinishReason,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<ProtocolViolation>,
}

pub fn new_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

impl Message {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            id: new_message_id(),
            role,
            parts,
            created_at: Utc::now(),
            finish: FinishReason::Completed,
            violations: Vec::new(),
        }
    }

    /// Create a single-part user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// Whether presentation should indicate truncation
    pub fn is_incomplete(&self) -> bool {
        self.finish.is_incomplete()
    }

    /// Concatenated answer text, reasoning and tool calls excluded
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[cfg(test)]
    pub fn tool_call(&self, call_id: &str) -> Option<&ToolCallPart> {
        self.parts
            .iter()
            .filter_map(Part::as_tool_call)
            .find(|part| part.call_id == call_id)
    }

    /// Violations recorded against one tool call
    #[cfg(test)]
    pub fn violations_for<'a>(
        &'a self,
        call_id: &'a str,
    ) -> impl Iterator<Item = &'a ProtocolViolation> + 'a {
        self.violations
            .iter()
            .filter(move |v| v.call_id.as_deref() == Some(call_id))
    }
}

/// Append-only history of finalized messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
