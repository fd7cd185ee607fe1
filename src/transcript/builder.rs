//! Transcript builder
//!
//! Top-level state machine for one turn. Text/reasoning deltas go to the
//! segment accumulator, tool lifecycle events to the tool-call tracker; the
//! builder owns the order in which parts first appeared.
//!
//! ```text
//! Idle ──first event──▶ Streaming ──finish(reason)──▶ Finalized
//! ```
//!
//! Finishing an idle builder still reports `Started` first, so observers
//! always learn the message id.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::error::{ProtocolViolation, ToolCallError};
use super::event::{Event, EventType};
use super::part::{
    FinishReason, Message, Part, Role, SegmentKind, ToolCallPart, new_message_id,
};
use super::segment::SegmentAccumulator;
use super::tool_call::ToolCallTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuilderState {
    /// No event received yet
    Idle,
    /// Accepting events
    Streaming,
    /// Message is immutable
    Finalized,
}

/// Observable change produced by applying an event
///
/// `index` is the part's position in the message, fixed at first
/// appearance.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptUpdate {
    Started {
        message_id: String,
    },
    SegmentOpened {
        index: usize,
        kind: SegmentKind,
    },
    SegmentAppended {
        index: usize,
        kind: SegmentKind,
        text: String,
    },
    SegmentClosed {
        index: usize,
        part: Part,
    },
    ToolCallStarted {
        index: usize,
        part: ToolCallPart,
    },
    ToolCallUpdated {
        index: usize,
        part: ToolCallPart,
    },
    Rejected(ProtocolViolation),
    /// One backend request of a multi-request turn ended
    StepFinished,
    Finalized {
        finish: FinishReason,
    },
}

/// Position holder in the part sequence
#[derive(Debug)]
enum Slot {
    Closed(Part),
    /// The accumulator's open segment
    Open,
    /// Tool call owned by the tracker
    Tool(String),
}

/// Folds generation events into one message
#[derive(Debug)]
pub struct TranscriptBuilder {
    state: BuilderState,
    role: Role,
    message_id: String,
    created_at: DateTime<Utc>,
    slots: Vec<Slot>,
    open_slot: Option<usize>,
    segments: SegmentAccumulator,
    tools: ToolCallTracker,
    tool_slots: HashMap<String, usize>,
    violations: Vec<ProtocolViolation>,
    message: Option<Message>,
}

impl Default for TranscriptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptBuilder {
    /// Create a builder for an assistant turn
    pub fn new() -> Self {
        Self {
            state: BuilderState::Idle,
            role: Role::Assistant,
            message_id: new_message_id(),
            created_at: Utc::now(),
            slots: Vec::new(),
            open_slot: None,
            segments: SegmentAccumulator::new(),
            tools: ToolCallTracker::new(),
            tool_slots: HashMap::new(),
            violations: Vec::new(),
            message: None,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Apply one event in arrival order
    pub fn apply(&mut self, event: Event) -> Vec<TranscriptUpdate> {
        let mut updates = Vec::new();

        match self.state {
            BuilderState::Finalized => {
                tracing::debug!(event = %event, "Ignoring event after finalization");
                return updates;
            }
            BuilderState::Idle => updates.push(self.start()),
            BuilderState::Streaming => {}
        }

        let event_type = event.event_type();
        if let Err(kind) = event.validate() {
            let violation = ProtocolViolation::invalid_event(event_type, kind, event.call_id());
            updates.push(self.reject(violation));
            return updates;
        }

        match event {
            Event::TextDelta { text } => self.push_delta(SegmentKind::Text, &text, &mut updates),
            Event::ReasoningDelta { text } => {
                self.push_delta(SegmentKind::Reasoning, &text, &mut updates)
            }
            Event::ToolInputAvailable {
                call_id,
                tool_name,
                input,
            } => match self.tools.begin(&call_id, &tool_name, input) {
                Ok(part) => {
                    let part = part.clone();
                    let index = self.slots.len();
                    self.slots.push(Slot::Tool(call_id.clone()));
                    self.tool_slots.insert(call_id, index);
                    updates.push(TranscriptUpdate::ToolCallStarted { index, part });
                }
                Err(e) => updates.push(self.reject_tool(event_type, &e)),
            },
            Event::ToolOutputAvailable { call_id, output } => {
                let result = self.tools.complete(&call_id, output).map(Clone::clone);
                updates.push(self.tool_transition(event_type, result));
            }
            Event::ToolOutputError {
                call_id,
                error_text,
            } => {
                let result = self.tools.fail(&call_id, &error_text).map(Clone::clone);
                updates.push(self.tool_transition(event_type, result));
            }
        }

        updates
    }

    fn start(&mut self) -> TranscriptUpdate {
        self.state = BuilderState::Streaming;
        self.created_at = Utc::now();
        TranscriptUpdate::Started {
            message_id: self.message_id.clone(),
        }
    }

    /// Close the open segment at the end of one backend request
    ///
    /// Deltas from the next request start a new part after any tool calls
    /// made in between. Tool calls are unaffected.
    pub fn end_step(&mut self) -> Vec<TranscriptUpdate> {
        let mut updates = Vec::new();
        if self.state != BuilderState::Streaming {
            return updates;
        }
        if let Some(closed) = self.segments.close() {
            updates.extend(self.fill_open_slot(closed));
        }
        updates.push(TranscriptUpdate::StepFinished);
        updates
    }

    fn push_delta(&mut self, kind: SegmentKind, text: &str, updates: &mut Vec<TranscriptUpdate>) {
        if text.is_empty() {
            return;
        }

        if self.segments.open_kind() != Some(kind) {
            if let Some(closed) = self.segments.open(kind) {
                updates.extend(self.fill_open_slot(closed));
            }
            let index = self.slots.len();
            self.slots.push(Slot::Open);
            self.open_slot = Some(index);
            updates.push(TranscriptUpdate::SegmentOpened { index, kind });
        }

        let Some(index) = self.open_slot else {
            return;
        };
        if let Err(e) = self.segments.append(kind, text) {
            tracing::error!("Segment append failed: {}", e);
            return;
        }
        updates.push(TranscriptUpdate::SegmentAppended {
            index,
            kind,
            text: text.to_string(),
        });
    }

    fn fill_open_slot(&mut self, part: Part) -> Option<TranscriptUpdate> {
        let index = self.open_slot.take()?;
        self.slots[index] = Slot::Closed(part.clone());
        Some(TranscriptUpdate::SegmentClosed { index, part })
    }

    fn tool_transition(
        &mut self,
        event_type: EventType,
        result: Result<ToolCallPart, ToolCallError>,
    ) -> TranscriptUpdate {
        match result {
            Ok(part) => match self.tool_slots.get(&part.call_id) {
                Some(&index) => TranscriptUpdate::ToolCallUpdated { index, part },
                None => {
                    let e = ToolCallError::UnknownCallId(part.call_id);
                    self.reject_tool(event_type, &e)
                }
            },
            Err(e) => self.reject_tool(event_type, &e),
        }
    }

    fn reject_tool(&mut self, event_type: EventType, error: &ToolCallError) -> TranscriptUpdate {
        self.reject(ProtocolViolation::from_tool_error(event_type, error))
    }

    fn reject(&mut self, violation: ProtocolViolation) -> TranscriptUpdate {
        tracing::warn!(
            message_id = %self.message_id,
            kind = %violation.kind,
            call_id = violation.call_id.as_deref().unwrap_or("-"),
            "{}",
            violation.message
        );
        self.violations.push(violation.clone());
        TranscriptUpdate::Rejected(violation)
    }

    /// Current part sequence, including the open segment
    #[cfg(test)]
    pub fn parts(&self) -> Vec<Part> {
        if let Some(message) = &self.message {
            return message.parts.clone();
        }
        self.slots.iter().filter_map(|slot| self.resolve(slot)).collect()
    }

    fn resolve(&self, slot: &Slot) -> Option<Part> {
        match slot {
            Slot::Closed(part) => Some(part.clone()),
            Slot::Open => self.segments.peek(),
            Slot::Tool(call_id) => self.tools.get(call_id).cloned().map(Part::ToolCall),
        }
    }

    /// Close any open segment and freeze the message
    ///
    /// Only the first call has an effect.
    fn finish(&mut self, finish: FinishReason) -> Vec<TranscriptUpdate> {
        let mut updates = Vec::new();
        match self.state {
            BuilderState::Finalized => return updates,
            BuilderState::Idle => updates.push(self.start()),
            BuilderState::Streaming => {}
        }

        if let Some(closed) = self.segments.close() {
            updates.extend(self.fill_open_slot(closed));
        }

        let outstanding = self.tools.outstanding();
        if outstanding > 0 {
            tracing::warn!(
                message_id = %self.message_id,
                outstanding,
                "Finalizing with tool calls still awaiting output"
            );
        }

        let parts = self.slots.iter().filter_map(|slot| self.resolve(slot)).collect();
        self.message = Some(Message {
            id: self.message_id.clone(),
            role: self.role,
            parts,
            created_at: self.created_at,
            finish: finish.clone(),
            violations: std::mem::take(&mut self.violations),
        });
        self.slots.clear();
        self.tool_slots.clear();
        self.state = BuilderState::Finalized;

        tracing::debug!(message_id = %self.message_id, finish = finish.as_str(), "Message finalized");
        updates.push(TranscriptUpdate::Finalized { finish });
        updates
    }

    /// Finish after natural stream exhaustion
    pub fn finalize(&mut self) -> Vec<TranscriptUpdate> {
        self.finish(FinishReason::Completed)
    }

    /// Finish after the consumer aborted the turn
    pub fn cancel(&mut self) -> Vec<TranscriptUpdate> {
        self.finish(FinishReason::Cancelled)
    }

    /// Finish after the event source failed
    pub fn interrupt(&mut self, error: impl Into<String>) -> Vec<TranscriptUpdate> {
        self.finish(FinishReason::Interrupted {
            error: error.into(),
        })
    }

    /// Finalized message, if any
    #[cfg(test)]
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Finalize if needed and take the message
    pub fn into_message(mut self) -> Message {
        self.finalize();
        let role = self.role;
        self.message
            .take()
            .unwrap_or_else(|| Message::new(role, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::error::ViolationKind;
    use crate::transcript::part::ToolCallState;
    use serde_json::json;

    fn build(events: Vec<Event>) -> Message {
        let mut builder = TranscriptBuilder::new();
        for event in events {
            builder.apply(event);
        }
        builder.into_message()
    }

    #[test]
    fn test_text_deltas_accumulate() {
        let message = build(vec![
            Event::text("Hel"),
            Event::text("lo, "),
            Event::text("world"),
        ]);
        assert_eq!(message.parts, vec![Part::text("Hello, world")]);
        assert_eq!(message.finish, FinishReason::Completed);
    }

    #[test]
    fn test_kind_switch_closes_segment() {
        let message = build(vec![Event::reasoning("think"), Event::text("answer")]);
        assert_eq!(
            message.parts,
            vec![Part::reasoning("think"), Part::text("answer")]
        );
    }

    #[test]
    fn test_alternating_kinds_create_new_parts() {
        let message = build(vec![
            Event::reasoning("a"),
            Event::text("b"),
            Event::reasoning("c"),
            Event::reasoning("d"),
        ]);
        assert_eq!(
            message.parts,
            vec![Part::reasoning("a"), Part::text("b"), Part::reasoning("cd")]
        );
    }

    #[test]
    fn test_tool_call_keeps_begin_position() {
        let message = build(vec![
            Event::reasoning("need to search"),
            Event::tool_input("1", "search", json!({"query": "x"})),
            Event::text("Searching"),
            Event::text("..."),
            Event::tool_output("1", json!({"results": []})),
            Event::text(" done"),
        ]);

        assert_eq!(message.parts.len(), 3);
        assert_eq!(message.parts[0], Part::reasoning("need to search"));
        let call = message.parts[1].as_tool_call().unwrap();
        assert_eq!(call.state, ToolCallState::OutputAvailable);
        assert_eq!(call.output, Some(json!({"results": []})));
        assert_eq!(call.input, json!({"query": "x"}));
        assert_eq!(message.parts[2], Part::text("Searching... done"));
    }

    #[test]
    fn test_tool_event_does_not_close_open_segment() {
        let message = build(vec![
            Event::reasoning("thinking"),
            Event::tool_input("1", "search", json!({})),
            Event::tool_error("1", "offline"),
            Event::reasoning(" more"),
        ]);
        assert_eq!(message.parts[0], Part::reasoning("thinking more"));
        let call = message.parts[1].as_tool_call().unwrap();
        assert_eq!(call.state, ToolCallState::OutputError);
        assert_eq!(call.error_text.as_deref(), Some("offline"));
    }

    #[test]
    fn test_concurrent_tool_calls_ordered_by_begin() {
        let message = build(vec![
            Event::tool_input("a", "search", json!({})),
            Event::tool_input("b", "fetch", json!({})),
            Event::tool_output("b", json!(2)),
            Event::text("x"),
            Event::tool_output("a", json!(1)),
        ]);
        let ids: Vec<_> = message
            .parts
            .iter()
            .map(|p| match p {
                Part::ToolCall(call) => call.call_id.as_str(),
                _ => "text",
            })
            .collect();
        assert_eq!(ids, ["a", "b", "text"]);
    }

    #[test]
    fn test_duplicate_call_id_rejected() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(Event::tool_input("1", "search", json!({"q": 1})));
        let updates = builder.apply(Event::tool_input("1", "search", json!({"q": 2})));

        assert!(matches!(
            &updates[..],
            [TranscriptUpdate::Rejected(v)] if v.kind == ViolationKind::DuplicateCallId
        ));
        let message = builder.into_message();
        assert_eq!(message.parts.len(), 1);
        assert_eq!(message.tool_call("1").unwrap().input, json!({"q": 1}));
        assert_eq!(message.violations_for("1").count(), 1);
    }

    #[test]
    fn test_unknown_call_id_rejected() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(Event::text("hi"));
        let updates = builder.apply(Event::tool_output("99", json!({})));
        assert!(matches!(
            &updates[..],
            [TranscriptUpdate::Rejected(v)] if v.kind == ViolationKind::UnknownCallId
        ));

        builder.apply(Event::text(" there"));
        let message = builder.into_message();
        assert_eq!(message.parts, vec![Part::text("hi there")]);
        assert_eq!(message.violations.len(), 1);
        assert_eq!(message.violations[0].call_id.as_deref(), Some("99"));
    }

    #[test]
    fn test_double_terminal_rejected_without_mutation() {
        let message = build(vec![
            Event::tool_input("1", "search", json!({})),
            Event::tool_output("1", json!("first")),
            Event::tool_error("1", "second"),
            Event::tool_output("1", json!("third")),
        ]);
        let call = message.tool_call("1").unwrap();
        assert_eq!(call.state, ToolCallState::OutputAvailable);
        assert_eq!(call.output, Some(json!("first")));
        assert!(call.error_text.is_none());
        assert_eq!(message.violations_for("1").count(), 2);
    }

    #[test]
    fn test_invalid_event_rejected() {
        let message = build(vec![
            Event::tool_input("", "search", json!({})),
            Event::tool_input("1", " ", json!({})),
        ]);
        assert!(message.parts.is_empty());
        let kinds: Vec<_> = message.violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            [ViolationKind::EmptyCallId, ViolationKind::EmptyToolName]
        );
    }

    #[test]
    fn test_state_transitions() {
        let mut builder = TranscriptBuilder::new();
        assert!(builder.end_step().is_empty());

        let updates = builder.apply(Event::text("a"));
        assert_eq!(
            updates,
            vec![
                TranscriptUpdate::Started {
                    message_id: builder.message_id().to_string()
                },
                TranscriptUpdate::SegmentOpened {
                    index: 0,
                    kind: SegmentKind::Text
                },
                TranscriptUpdate::SegmentAppended {
                    index: 0,
                    kind: SegmentKind::Text,
                    text: "a".to_string()
                },
            ]
        );

        assert_eq!(builder.apply(Event::text("b")).len(), 1);

        let updates = builder.finalize();
        assert_eq!(
            updates,
            vec![
                TranscriptUpdate::SegmentClosed {
                    index: 0,
                    part: Part::text("ab")
                },
                TranscriptUpdate::Finalized {
                    finish: FinishReason::Completed
                },
            ]
        );
        assert!(builder.end_step().is_empty());
    }

    #[test]
    fn test_finalization_is_idempotent() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(Event::text("done"));
        builder.finalize();
        let first = builder.message().cloned().unwrap();

        assert!(builder.finalize().is_empty());
        assert!(builder.cancel().is_empty());
        assert!(builder.apply(Event::text("late")).is_empty());
        assert!(builder
            .apply(Event::tool_input("1", "search", json!({})))
            .is_empty());

        assert_eq!(builder.message(), Some(&first));
        assert_eq!(builder.parts(), vec![Part::text("done")]);
    }

    #[test]
    fn test_cancellation_keeps_partial_reasoning() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(Event::reasoning("partial"));
        builder.cancel();

        let message = builder.into_message();
        assert_eq!(message.parts, vec![Part::reasoning("partial")]);
        assert_eq!(message.finish, FinishReason::Cancelled);
        assert!(message.is_incomplete());
    }

    #[test]
    fn test_interrupt_marks_incomplete() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(Event::text("half"));
        builder.apply(Event::tool_input("1", "search", json!({})));
        builder.interrupt("connection reset");

        let message = builder.into_message();
        assert_eq!(message.parts[0], Part::text("half"));
        assert_eq!(
            message.tool_call("1").unwrap().state,
            ToolCallState::InputAvailable
        );
        assert_eq!(
            message.finish,
            FinishReason::Interrupted {
                error: "connection reset".to_string()
            }
        );
    }

    #[test]
    fn test_live_parts_include_open_segment() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(Event::text("par"));
        builder.apply(Event::tool_input("1", "search", json!({})));
        builder.apply(Event::text("tial"));

        let parts = builder.parts();
        assert_eq!(parts[0], Part::text("partial"));
        assert_eq!(
            parts[1].as_tool_call().unwrap().state,
            ToolCallState::InputAvailable
        );
    }

    #[test]
    fn test_empty_deltas_ignored() {
        let message = build(vec![Event::reasoning("r"), Event::text(""), Event::reasoning("s")]);
        assert_eq!(message.parts, vec![Part::reasoning("rs")]);
    }

    #[test]
    fn test_finish_while_idle_yields_empty_message() {
        let message = TranscriptBuilder::new().into_message();
        assert!(message.parts.is_empty());
        assert_eq!(message.role, Role::Assistant);
    }

    #[test]
    fn test_interrupt_before_first_event_still_starts() {
        let mut builder = TranscriptBuilder::new();
        let message_id = builder.message_id().to_string();
        let updates = builder.interrupt("connection refused");
        assert_eq!(
            updates,
            vec![
                TranscriptUpdate::Started {
                    message_id: message_id.clone()
                },
                TranscriptUpdate::Finalized {
                    finish: FinishReason::Interrupted {
                        error: "connection refused".to_string()
                    }
                },
            ]
        );
        assert!(builder.cancel().is_empty());

        let message = builder.into_message();
        assert_eq!(message.id, message_id);
        assert!(message.is_incomplete());
    }

    #[test]
    fn test_step_boundary_splits_text_around_tool_calls() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(Event::text("Let me check."));
        builder.apply(Event::tool_input("c1", "current_time", json!({})));
        builder.apply(Event::tool_output("c1", json!({"utc": "12:00"})));

        let updates = builder.end_step();
        assert_eq!(
            updates,
            vec![
                TranscriptUpdate::SegmentClosed {
                    index: 0,
                    part: Part::text("Let me check.")
                },
                TranscriptUpdate::StepFinished,
            ]
        );

        let updates = builder.apply(Event::text("It is noon."));
        assert!(matches!(
            updates[0],
            TranscriptUpdate::SegmentOpened {
                index: 2,
                kind: SegmentKind::Text
            }
        ));

        let message = builder.into_message();
        assert_eq!(message.parts.len(), 3);
        assert_eq!(message.parts[0], Part::text("Let me check."));
        assert_eq!(message.parts[1].as_tool_call().unwrap().call_id, "c1");
        assert_eq!(message.parts[2], Part::text("It is noon."));
    }

    #[test]
    fn test_step_boundary_without_open_segment() {
        let mut builder = TranscriptBuilder::new();
        builder.apply(Event::tool_input("c1", "search", json!({})));
        assert_eq!(builder.end_step(), vec![TranscriptUpdate::StepFinished]);
    }
}
