//! Panel presentation
//!
//! A UI-style view of one message: every part becomes a panel at the part's
//! index. Reasoning and tool calls are collapsible; tool panels are updated
//! in place as their state advances, so panel order never changes.

use serde::Serialize;
use serde_json::Value;

use crate::transcript::{
    FinishReason, Part, ProtocolViolation, SegmentKind, ToolCallPart, ToolCallState,
    TranscriptUpdate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelKind {
    Text,
    Reasoning,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Panel {
    pub kind: PanelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub title: String,
    /// Shown after the title while work is pending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub body: String,
    pub collapsible: bool,
    pub collapsed: bool,
    /// Part is still receiving content
    pub live: bool,
    pub error: bool,
    /// Protocol violations reported against this panel's tool call
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub badges: Vec<String>,
}

impl Panel {
    fn segment(kind: SegmentKind) -> Self {
        match kind {
            SegmentKind::Text => Self {
                kind: PanelKind::Text,
                call_id: None,
                title: String::new(),
                status: None,
                body: String::new(),
                collapsible: false,
                collapsed: false,
                live: true,
                error: false,
                badges: Vec::new(),
            },
            SegmentKind::Reasoning => Self {
                kind: PanelKind::Reasoning,
                title: "Reasoning".to_string(),
                collapsible: true,
                collapsed: true,
                ..Self::segment(SegmentKind::Text)
            },
        }
    }

    fn tool(part: &ToolCallPart) -> Self {
        let mut panel = Self {
            kind: PanelKind::Tool,
            call_id: Some(part.call_id.clone()),
            title: tool_title(&part.tool_name),
            collapsible: true,
            collapsed: true,
            ..Self::segment(SegmentKind::Text)
        };
        panel.apply_tool(part);
        panel
    }

    fn apply_tool(&mut self, part: &ToolCallPart) {
        match part.state {
            ToolCallState::InputAvailable => {
                self.status = Some("(running...)".to_string());
                self.body = format!("Input: {}", compact(&part.input));
                self.live = true;
            }
            ToolCallState::OutputAvailable => {
                self.status = None;
                self.body = part.output.as_ref().map(pretty).unwrap_or_default();
                self.live = false;
            }
            ToolCallState::OutputError => {
                self.status = None;
                self.body = format!("Error: {}", part.error_text.as_deref().unwrap_or_default());
                self.live = false;
                self.error = true;
            }
        }
    }
}

/// Panel view of one message, rebuilt from transcript updates
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelRenderer {
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    panels: Vec<Panel>,
    /// Violations not tied to a known tool call
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finish: Option<FinishReason>,
}

impl PanelRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_update(&mut self, update: &TranscriptUpdate) {
        match update {
            TranscriptUpdate::Started { message_id } => self.message_id = Some(message_id.clone()),
            TranscriptUpdate::SegmentOpened { index, kind } => {
                self.set(*index, Panel::segment(*kind));
            }
            TranscriptUpdate::SegmentAppended { index, text, .. } => {
                if let Some(panel) = self.panels.get_mut(*index) {
                    panel.body.push_str(text);
                }
            }
            TranscriptUpdate::SegmentClosed { index, part } => {
                if let Some(panel) = self.panels.get_mut(*index) {
                    if let Part::Text { text } | Part::Reasoning { text } = part {
                        panel.body.clone_from(text);
                    }
                    panel.live = false;
                }
            }
            TranscriptUpdate::ToolCallStarted { index, part } => self.set(*index, Panel::tool(part)),
            TranscriptUpdate::ToolCallUpdated { index, part } => {
                if let Some(panel) = self.panels.get_mut(*index) {
                    panel.apply_tool(part);
                }
            }
            TranscriptUpdate::Rejected(violation) => self.reject(violation),
            TranscriptUpdate::StepFinished => {}
            TranscriptUpdate::Finalized { finish } => {
                for panel in &mut self.panels {
                    panel.live = false;
                }
                self.finish = Some(finish.clone());
            }
        }
    }

    fn set(&mut self, index: usize, panel: Panel) {
        if index < self.panels.len() {
            self.panels[index] = panel;
        } else {
            self.panels.push(panel);
        }
    }

    fn reject(&mut self, violation: &ProtocolViolation) {
        let target = violation.call_id.as_deref().and_then(|call_id| {
            self.panels
                .iter_mut()
                .find(|panel| panel.call_id.as_deref() == Some(call_id))
        });
        match target {
            Some(panel) => panel.badges.push(violation.message.clone()),
            None => self.errors.push(violation.message.clone()),
        }
    }

    /// Plain-text rendering; `expand_all` ignores collapsed state
    pub fn to_text(&self, expand_all: bool) -> String {
        let mut out = String::new();
        for panel in &self.panels {
            if !panel.collapsible {
                out.push_str(&panel.body);
                if panel.live {
                    out.push('▌');
                }
                out.push('\n');
                continue;
            }

            let open = expand_all || !panel.collapsed;
            out.push_str(if open { "[-] " } else { "[+] " });
            out.push_str(&panel.title);
            if let Some(status) = &panel.status {
                out.push(' ');
                out.push_str(status);
            }
            for badge in &panel.badges {
                out.push_str(&format!(" [!] {}", badge));
            }
            out.push('\n');
            if open {
                for line in panel.body.lines() {
                    out.push_str("    ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        for error in &self.errors {
            out.push_str(&format!("[!] {}\n", error));
        }
        match &self.finish {
            Some(FinishReason::Cancelled) => out.push_str("[cancelled]\n"),
            Some(FinishReason::Interrupted { error }) => {
                out.push_str(&format!("[interrupted] {}\n", error))
            }
            _ => {}
        }
        out
    }
}

/// `current_time` -> `Current Time`
fn tool_title(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
