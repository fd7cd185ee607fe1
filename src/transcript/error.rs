//! Transcript error definitions

use std::fmt;

use serde::{Deserialize, Serialize};

use super::event::EventType;
use super::part::{SegmentKind, ToolCallState};

/// Segment accumulator misuse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    /// `append` called while no segment of that kind is open
    NotOpen { kind: SegmentKind },
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOpen { kind } => write!(f, "No open {} segment to append to", kind),
        }
    }
}

impl std::error::Error for SegmentError {}

/// Tool-call lifecycle error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCallError {
    /// `begin` with a call ID that is already tracked
    DuplicateCallId(String),
    /// Terminal transition for a call ID that was never begun
    UnknownCallId(String),
    /// Terminal transition for a call that is already terminal
    AlreadyTerminal {
        call_id: String,
        state: ToolCallState,
    },
}

impl ToolCallError {
    pub fn call_id(&self) -> &str {
        match self {
            Self::DuplicateCallId(id) | Self::UnknownCallId(id) => id,
            Self::AlreadyTerminal { call_id, .. } => call_id,
        }
    }

    pub fn kind(&self) -> ViolationKind {
        match self {
            Self::DuplicateCallId(_) => ViolationKind::DuplicateCallId,
            Self::UnknownCallId(_) => ViolationKind::UnknownCallId,
            Self::AlreadyTerminal { .. } => ViolationKind::AlreadyTerminal,
        }
    }
}

impl fmt::Display for ToolCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateCallId(id) => write!(f, "Duplicate tool call ID: {}", id),
            Self::UnknownCallId(id) => write!(f, "Unknown tool call ID: {}", id),
            Self::AlreadyTerminal { call_id, state } => {
                write!(f, "Tool call {} is already terminal ({})", call_id, state)
            }
        }
    }
}

impl std::error::Error for ToolCallError {}

/// Protocol violation category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    DuplicateCallId,
    UnknownCallId,
    AlreadyTerminal,
    EmptyCallId,
    EmptyToolName,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateCallId => "duplicate-call-id",
            Self::UnknownCallId => "unknown-call-id",
            Self::AlreadyTerminal => "already-terminal",
            Self::EmptyCallId => "empty-call-id",
            Self::EmptyToolName => "empty-tool-name",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rejected event, recorded on the message it arrived in
///
/// `call_id` links the violation to the tool-call part it concerns; it is
/// `None` when the event carried no usable ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolViolation {
    pub kind: ViolationKind,
    pub event: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub message: String,
}

impl ProtocolViolation {
    pub fn from_tool_error(event: EventType, error: &ToolCallError) -> Self {
        Self {
            kind: error.kind(),
            event,
            call_id: Some(error.call_id().to_string()),
            message: error.to_string(),
        }
    }

    pub fn invalid_event(event: EventType, kind: ViolationKind, call_id: Option<&str>) -> Self {
        let message = match kind {
            ViolationKind::EmptyCallId => format!("{} event has an empty call ID", event),
            ViolationKind::EmptyToolName => format!("{} event has an empty tool name", event),
            other => format!("{} event rejected: {}", event, other),
        };
        Self {
            kind,
            event,
            call_id: call_id.filter(|id| !id.trim().is_empty()).map(str::to_string),
            message,
        }
    }
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Protocol violation ({}): {}", self.kind, self.message)
    }
}

impl std::error::Error for ProtocolViolation {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_to_violation() {
        let error = ToolCallError::AlreadyTerminal {
            call_id: "c1".to_string(),
            state: ToolCallState::OutputAvailable,
        };
        let violation = ProtocolViolation::from_tool_error(EventType::ToolOutputError, &error);

        assert_eq!(violation.kind, ViolationKind::AlreadyTerminal);
        assert_eq!(violation.call_id.as_deref(), Some("c1"));
        assert_eq!(
            violation.message,
            "Tool call c1 is already terminal (output-available)"
        );
    }

    #[test]
    fn test_invalid_event_drops_blank_call_id() {
        let violation = ProtocolViolation::invalid_event(
            EventType::ToolOutputAvailable,
            ViolationKind::EmptyCallId,
            Some(" "),
        );
        assert!(violation.call_id.is_none());
        assert!(violation.to_string().contains("empty-call-id"));
    }
}
