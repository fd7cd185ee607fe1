//! Debug utilities module
//!
//! Verbose event printing for `ask --debug-events`. Everything goes to
//! stderr so the rendered answer on stdout stays clean.

use serde_json::Value;

use crate::transcript::{Event, TranscriptUpdate};

/// Longest text payload shown before truncation
const MAX_DEBUG_TEXT: usize = 200;

/// Event in verbose format (event type plus every field)
pub fn format_event_verbose(event: &Event) -> String {
    let mut out = format!("[Event] {}\n", event.event_type());
    match event {
        Event::TextDelta { text } | Event::ReasoningDelta { text } => {
            out.push_str(&format!("  text: {:?}\n", truncate(text)));
        }
        Event::ToolInputAvailable {
            call_id,
            tool_name,
            input,
        } => {
            out.push_str(&format!("  call_id: {:?}\n", call_id));
            out.push_str(&format!("  tool_name: {:?}\n", tool_name));
            out.push_str(&format!("  input: {}\n", json(input)));
        }
        Event::ToolOutputAvailable { call_id, output } => {
            out.push_str(&format!("  call_id: {:?}\n", call_id));
            out.push_str(&format!("  output: {}\n", json(output)));
        }
        Event::ToolOutputError {
            call_id,
            error_text,
        } => {
            out.push_str(&format!("  call_id: {:?}\n", call_id));
            out.push_str(&format!("  error_text: {:?}\n", error_text));
        }
    }
    out
}

/// Print event in verbose format
pub fn print_event_verbose(event: &Event) {
    eprint!("{}", format_event_verbose(event));
}

/// Print the updates that carry information beyond the raw event
pub fn print_update_verbose(update: &TranscriptUpdate) {
    match update {
        TranscriptUpdate::Started { message_id } => eprintln!("[Started] {}", message_id),
        TranscriptUpdate::SegmentClosed { index, part } => {
            eprintln!("[Part {}] closed: {}", index, json(&serde_json::to_value(part).unwrap_or(Value::Null)))
        }
        TranscriptUpdate::Rejected(violation) => {
            eprintln!("[Rejected] {}: {}", violation.kind, violation.message)
        }
        TranscriptUpdate::StepFinished => eprintln!("[Step finished]"),
        TranscriptUpdate::Finalized { finish } => eprintln!("[Finalized] {}", finish.as_str()),
        _ => {}
    }
}

fn json(value: &Value) -> String {
    truncate(&value.to_string())
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_DEBUG_TEXT {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_DEBUG_TEXT).collect();
    format!("{}... ({} chars)", cut, text.chars().count())
}
