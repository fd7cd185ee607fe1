//! Generation events
//!
//! Defines the event taxonomy that drives the transcript builder

use serde::{Deserialize, Serialize};

use super::error::ViolationKind;

/// Event type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    TextDelta,
    ReasoningDelta,
    ToolInputAvailable,
    ToolOutputAvailable,
    ToolOutputError,
}

impl EventType {
    /// Convert to wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextDelta => "text-delta",
            Self::ReasoningDelta => "reasoning-delta",
            Self::ToolInputAvailable => "tool-input-available",
            Self::ToolOutputAvailable => "tool-output-available",
            Self::ToolOutputError => "tool-output-error",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified event enum
///
/// One low-level generation event for a single assistant turn. Tool
/// `input` / `output` payloads are opaque and never inspected.
///
/// # Example
///
/// ```rust,ignore
/// let json = r#"{"type":"text-delta","text":"Hello"}"#;
/// let event: Event = serde_json::from_str(json)?;
/// assert_eq!(event.event_type(), EventType::TextDelta);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    /// Incremental chunk of answer text
    TextDelta { text: String },
    /// Incremental chunk of reasoning text
    ReasoningDelta { text: String },
    /// A tool invocation was decided and its input is ready
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        call_id: String,
        tool_name: String,
        input: serde_json::Value,
    },
    /// The invocation completed successfully
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable {
        call_id: String,
        output: serde_json::Value,
    },
    /// The invocation failed
    #[serde(rename_all = "camelCase")]
    ToolOutputError { call_id: String, error_text: String },
}

impl Event {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::ReasoningDelta { text: text.into() }
    }

    pub fn tool_input(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self::ToolInputAvailable {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            input,
        }
    }

    pub fn tool_output(call_id: impl Into<String>, output: serde_json::Value) -> Self {
        Self::ToolOutputAvailable {
            call_id: call_id.into(),
            output,
        }
    }

    pub fn tool_error(call_id: impl Into<String>, error_text: impl Into<String>) -> Self {
        Self::ToolOutputError {
            call_id: call_id.into(),
            error_text: error_text.into(),
        }
    }

    /// Get event type
    pub fn event_type(&self) -> EventType {
        match self {
            Self::TextDelta { .. } => EventType::TextDelta,
            Self::ReasoningDelta { .. } => EventType::ReasoningDelta,
            Self::ToolInputAvailable { .. } => EventType::ToolInputAvailable,
            Self::ToolOutputAvailable { .. } => EventType::ToolOutputAvailable,
            Self::ToolOutputError { .. } => EventType::ToolOutputError,
        }
    }

    /// Tool call ID this event refers to, if it is a tool event
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::ToolInputAvailable { call_id, .. }
            | Self::ToolOutputAvailable { call_id, .. }
            | Self::ToolOutputError { call_id, .. } => Some(call_id),
            _ => None,
        }
    }

    /// Structural validation independent of prior events
    pub fn validate(&self) -> Result<(), ViolationKind> {
        if let Some(call_id) = self.call_id() {
            if call_id.trim().is_empty() {
                return Err(ViolationKind::EmptyCallId);
            }
        }
        if let Self::ToolInputAvailable { tool_name, .. } = self {
            if tool_name.trim().is_empty() {
                return Err(ViolationKind::EmptyToolName);
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextDelta { text } | Self::ReasoningDelta { text } => {
                write!(f, "{}[{} chars]", self.event_type(), text.chars().count())
            }
            Self::ToolInputAvailable {
                call_id, tool_name, ..
            } => write!(f, "{}[{}] (id={})", self.event_type(), tool_name, call_id),
            Self::ToolOutputAvailable { call_id, .. } | Self::ToolOutputError { call_id, .. } => {
                write!(f, "{} (id={})", self.event_type(), call_id)
            }
        }
    }
}

/// Item yielded by an event source
///
/// A turn that sends tool results back to the model spans several backend
/// requests; `StepBoundary` marks the end of one request's output.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceItem {
    Event(Event),
    StepBoundary,
}

impl From<Event> for SourceItem {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}
