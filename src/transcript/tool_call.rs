//! Tool-call tracker
//!
//! Correlates input/output events of concurrently outstanding tool
//! invocations by call ID.

use std::collections::HashMap;

use super::error::ToolCallError;
use super::part::{ToolCallPart, ToolCallState};

/// Lifecycle tracker for the tool calls of one message
#[derive(Debug, Default)]
pub struct ToolCallTracker {
    calls: HashMap<String, ToolCallPart>,
}

impl ToolCallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a call in `input-available` state
    pub fn begin(
        &mut self,
        call_id: &str,
        tool_name: &str,
        input: serde_json::Value,
    ) -> Result<&ToolCallPart, ToolCallError> {
        if self.calls.contains_key(call_id) {
            return Err(ToolCallError::DuplicateCallId(call_id.to_string()));
        }
        let part = self
            .calls
            .entry(call_id.to_string())
            .or_insert_with(|| ToolCallPart::new(call_id, tool_name, input));
        Ok(part)
    }

    /// Transition to `output-available`
    pub fn complete(
        &mut self,
        call_id: &str,
        output: serde_json::Value,
    ) -> Result<&ToolCallPart, ToolCallError> {
        let part = self.pending_mut(call_id)?;
        part.state = ToolCallState::OutputAvailable;
        part.output = Some(output);
        Ok(part)
    }

    /// Transition to `output-error`
    pub fn fail(&mut self, call_id: &str, error_text: &str) -> Result<&ToolCallPart, ToolCallError> {
        let part = self.pending_mut(call_id)?;
        part.state = ToolCallState::OutputError;
        part.error_text = Some(error_text.to_string());
        Ok(part)
    }

    fn pending_mut(&mut self, call_id: &str) -> Result<&mut ToolCallPart, ToolCallError> {
        let part = self
            .calls
            .get_mut(call_id)
            .ok_or_else(|| ToolCallError::UnknownCallId(call_id.to_string()))?;
        if part.state.is_terminal() {
            return Err(ToolCallError::AlreadyTerminal {
                call_id: call_id.to_string(),
                state: part.state,
            });
        }
        Ok(part)
    }

    pub fn get(&self, call_id: &str) -> Option<&ToolCallPart> {
        self.calls.get(call_id)
    }

    /// Number of calls still waiting for a terminal event
    pub fn outstanding(&self) -> usize {
        self.calls
            .values()
            .filter(|part| !part.state.is_terminal())
            .count()
    }
}
