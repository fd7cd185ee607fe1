//! SSE framing of transcript updates
//!
//! Only events the builder accepted are re-emitted, so a client replaying
//! the frames reconstructs the same message. Frame kinds:
//!
//! | update                      | frame                                   |
//! |-----------------------------|-----------------------------------------|
//! | `Started`                   | `start`                                 |
//! | `SegmentAppended`           | `text-delta` / `reasoning-delta`        |
//! | `ToolCallStarted`           | `tool-input-available`                  |
//! | `ToolCallUpdated`           | `tool-output-available` / `-error`      |
//! | `Rejected`                  | `error`                                 |
//! | `StepFinished`              | `finish-step`                           |
//! | `Finalized`                 | `finish`                                |

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use super::types::{FinishFrame, StartFrame};
use crate::transcript::{Event, SegmentKind, ToolCallPart, ToolCallState, TranscriptUpdate};

/// One outgoing SSE frame
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: Value,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            event: event.into(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    /// Format as SSE string
    pub fn to_sse_string(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_sse_string())
    }
}

/// Frame for one update, `None` for purely structural updates
pub fn frame_for_update(update: &TranscriptUpdate) -> Option<SseEvent> {
    match update {
        TranscriptUpdate::Started { message_id } => Some(SseEvent::new(
            "start",
            StartFrame {
                message_id: message_id.clone(),
            },
        )),
        TranscriptUpdate::SegmentAppended { kind, text, .. } => {
            let event = match kind {
                SegmentKind::Text => Event::text(text.clone()),
                SegmentKind::Reasoning => Event::reasoning(text.clone()),
            };
            Some(event_frame(event))
        }
        TranscriptUpdate::ToolCallStarted { part, .. } => Some(event_frame(Event::tool_input(
            part.call_id.clone(),
            part.tool_name.clone(),
            part.input.clone(),
        ))),
        TranscriptUpdate::ToolCallUpdated { part, .. } => terminal_event(part).map(event_frame),
        TranscriptUpdate::Rejected(violation) => Some(SseEvent::new("error", violation)),
        TranscriptUpdate::StepFinished => {
            Some(SseEvent::new("finish-step", Value::Object(Default::default())))
        }
        TranscriptUpdate::Finalized { finish } => {
            Some(SseEvent::new("finish", FinishFrame::from(finish)))
        }
        TranscriptUpdate::SegmentOpened { .. } | TranscriptUpdate::SegmentClosed { .. } => None,
    }
}

fn event_frame(event: Event) -> SseEvent {
    SseEvent::new(event.event_type().as_str(), &event)
}

fn terminal_event(part: &ToolCallPart) -> Option<Event> {
    match part.state {
        ToolCallState::OutputAvailable => Some(Event::tool_output(
            part.call_id.clone(),
            part.output.clone().unwrap_or(Value::Null),
        )),
        ToolCallState::OutputError => Some(Event::tool_error(
            part.call_id.clone(),
            part.error_text.clone().unwrap_or_default(),
        )),
        ToolCallState::InputAvailable => None,
    }
}
