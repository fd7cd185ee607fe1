//! Terminal presentation
//!
//! Answer text goes to `out`, reasoning and tool activity to `err`, so the
//! answer can be piped on its own. Reasoning is styled with one ANSI
//! sequence per segment: the style starts when a reasoning segment opens and
//! is reset exactly once when that segment closes, either because the kind
//! changed or because the stream ended.

use std::io::{self, Write};

use serde_json::Value;

use crate::model::config::{Config, ReasoningColor};
use crate::transcript::{FinishReason, Part, SegmentKind, ToolCallPart, ToolCallState, TranscriptUpdate};

const ANSI_RESET: &str = "\x1b[0m";

/// Longest tool input/output echoed on one line
const MAX_TOOL_PREVIEW: usize = 120;

#[derive(Debug, Clone)]
pub struct TerminalOptions {
    pub show_reasoning: bool,
    /// Style sequence, `None` when reasoning is not colored
    pub reasoning_style: Option<&'static str>,
    pub reasoning_prefix: String,
    pub reasoning_suffix: String,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self {
            show_reasoning: true,
            reasoning_style: Some(ReasoningColor::Dim.ansi()),
            reasoning_prefix: String::new(),
            reasoning_suffix: "\n".to_string(),
        }
    }
}

impl TerminalOptions {
    pub fn from_config(config: &Config) -> Self {
        let style = config.reasoning_color.ansi();
        Self {
            show_reasoning: config.show_reasoning,
            reasoning_style: (config.color_reasoning && !style.is_empty()).then_some(style),
            reasoning_prefix: config.reasoning_prefix.clone(),
            reasoning_suffix: config.reasoning_suffix.clone(),
        }
    }
}

/// Streams transcript updates to two writers
pub struct TerminalRenderer<O: Write, E: Write> {
    out: O,
    err: E,
    options: TerminalOptions,
    styled: bool,
    saw_reasoning: bool,
    prefix_written: bool,
    suffix_written: bool,
    wrote_text: bool,
}

impl TerminalRenderer<io::Stdout, io::Stderr> {
    pub fn stdio(options: TerminalOptions) -> Self {
        Self::new(io::stdout(), io::stderr(), options)
    }
}

impl<O: Write, E: Write> TerminalRenderer<O, E> {
    pub fn new(out: O, err: E, options: TerminalOptions) -> Self {
        Self {
            out,
            err,
            options,
            styled: false,
            saw_reasoning: false,
            prefix_written: false,
            suffix_written: false,
            wrote_text: false,
        }
    }

    /// Render one update
    pub fn on_update(&mut self, update: &TranscriptUpdate) -> io::Result<()> {
        match update {
            TranscriptUpdate::SegmentOpened {
                kind: SegmentKind::Reasoning,
                ..
            } => self.begin_reasoning()?,
            TranscriptUpdate::SegmentOpened {
                kind: SegmentKind::Text,
                ..
            } => self.begin_text()?,
            TranscriptUpdate::SegmentAppended { kind, text, .. } => match kind {
                SegmentKind::Reasoning if self.options.show_reasoning => {
                    self.err.write_all(text.as_bytes())?;
                    self.err.flush()?;
                }
                SegmentKind::Reasoning => {}
                SegmentKind::Text => {
                    self.out.write_all(text.as_bytes())?;
                    self.out.flush()?;
                    self.wrote_text = true;
                }
            },
            TranscriptUpdate::SegmentClosed {
                part: Part::Reasoning { .. },
                ..
            } => self.end_reasoning()?,
            TranscriptUpdate::ToolCallStarted { part, .. } => {
                writeln!(self.err, "\n[tool] {}({})", part.tool_name, preview(&part.input))?;
            }
            TranscriptUpdate::ToolCallUpdated { part, .. } => self.tool_result(part)?,
            TranscriptUpdate::Finalized { finish } => self.finish(finish)?,
            TranscriptUpdate::Started { .. }
            | TranscriptUpdate::StepFinished
            | TranscriptUpdate::SegmentClosed { .. }
            | TranscriptUpdate::Rejected(_) => {}
        }
        Ok(())
    }

    fn begin_reasoning(&mut self) -> io::Result<()> {
        if !self.options.show_reasoning {
            return Ok(());
        }
        self.saw_reasoning = true;
        if !self.prefix_written {
            self.prefix_written = true;
            self.err.write_all(self.options.reasoning_prefix.as_bytes())?;
        }
        if let Some(style) = self.options.reasoning_style {
            self.err.write_all(style.as_bytes())?;
            self.styled = true;
        }
        Ok(())
    }

    fn end_reasoning(&mut self) -> io::Result<()> {
        if self.styled {
            self.styled = false;
            self.err.write_all(ANSI_RESET.as_bytes())?;
            self.err.flush()?;
        }
        Ok(())
    }

    fn begin_text(&mut self) -> io::Result<()> {
        if self.saw_reasoning && !self.suffix_written {
            self.suffix_written = true;
            self.err.write_all(self.options.reasoning_suffix.as_bytes())?;
            self.err.flush()?;
        }
        Ok(())
    }

    fn tool_result(&mut self, part: &ToolCallPart) -> io::Result<()> {
        match part.state {
            ToolCallState::OutputAvailable => writeln!(
                self.err,
                "[tool] {} -> {}",
                part.tool_name,
                part.output.as_ref().map(preview).unwrap_or_default()
            ),
            ToolCallState::OutputError => writeln!(
                self.err,
                "[tool] {} failed: {}",
                part.tool_name,
                part.error_text.as_deref().unwrap_or("unknown error")
            ),
            ToolCallState::InputAvailable => Ok(()),
        }
    }

    fn finish(&mut self, finish: &FinishReason) -> io::Result<()> {
        self.end_reasoning()?;
        if self.wrote_text {
            self.out.write_all(b"\n")?;
        }
        match finish {
            FinishReason::Completed => {}
            FinishReason::Cancelled => writeln!(self.err, "[cancelled]")?,
            FinishReason::Interrupted { error } => writeln!(self.err, "[interrupted] {}", error)?,
        }
        self.out.flush()?;
        self.err.flush()
    }
}

fn preview(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= MAX_TOOL_PREVIEW {
        return text;
    }
    let cut: String = text.chars().take(MAX_TOOL_PREVIEW).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{Event, TranscriptBuilder};
    use serde_json::json;

    fn render(options: TerminalOptions, events: Vec<Event>) -> (String, String) {
        let mut builder = TranscriptBuilder::new();
        let mut renderer = TerminalRenderer::new(Vec::new(), Vec::new(), options);
        for event in events {
            for update in builder.apply(event) {
                renderer.on_update(&update).unwrap();
            }
        }
        for update in builder.finalize() {
            renderer.on_update(&update).unwrap();
        }
        let (out, err) = (renderer.out, renderer.err);
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn test_reasoning_then_text() {
        let (out, err) = render(
            TerminalOptions::default(),
            vec![
                Event::reasoning("thi"),
                Event::reasoning("nk"),
                Event::text("answer"),
            ],
        );
        assert_eq!(out, "answer\n");
        assert_eq!(err, "\x1b[2mthink\x1b[0m\n");
    }

    #[test]
    fn test_reset_once_at_end_when_reasoning_open() {
        let (out, err) = render(TerminalOptions::default(), vec![Event::reasoning("partial")]);
        assert_eq!(out, "");
        assert_eq!(err, "\x1b[2mpartial\x1b[0m");
        assert_eq!(err.matches(ANSI_RESET).count(), 1);
    }

    #[test]
    fn test_suffix_written_once_per_turn() {
        let options = TerminalOptions {
            reasoning_prefix: "<think>".to_string(),
            reasoning_suffix: "</think>\n".to_string(),
            reasoning_style: None,
            ..TerminalOptions::default()
        };
        let (out, err) = render(
            options,
            vec![
                Event::reasoning("a"),
                Event::text("b"),
                Event::reasoning("c"),
                Event::text("d"),
            ],
        );
        assert_eq!(out, "bd\n");
        assert_eq!(err, "<think>a</think>\nc");
    }

    #[test]
    fn test_hidden_reasoning() {
        let options = TerminalOptions {
            show_reasoning: false,
            ..TerminalOptions::default()
        };
        let (out, err) = render(options, vec![Event::reasoning("secret"), Event::text("hi")]);
        assert_eq!(out, "hi\n");
        assert_eq!(err, "");
    }

    #[test]
    fn test_tool_lines_do_not_reset_reasoning() {
        let (_, err) = render(
            TerminalOptions::default(),
            vec![
                Event::reasoning("look up"),
                Event::tool_input("1", "search", json!({"query": "x"})),
                Event::tool_error("1", "offline"),
                Event::reasoning(" more"),
            ],
        );
        assert_eq!(err.matches(ANSI_RESET).count(), 1);
        assert!(err.contains("[tool] search({\"query\":\"x\"})"));
        assert!(err.contains("[tool] search failed: offline"));
        assert!(err.ends_with(" more\x1b[0m"));
    }

    #[test]
    fn test_interrupted_notice() {
        let mut builder = TranscriptBuilder::new();
        let mut renderer =
            TerminalRenderer::new(Vec::new(), Vec::new(), TerminalOptions::default());
        for update in builder.apply(Event::text("half")) {
            renderer.on_update(&update).unwrap();
        }
        for update in builder.interrupt("connection reset") {
            renderer.on_update(&update).unwrap();
        }
        let (out, err) = (renderer.out, renderer.err);
        assert_eq!(String::from_utf8(out).unwrap(), "half\n");
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "[interrupted] connection reset\n"
        );
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.reasoning_color = ReasoningColor::None;
        assert_eq!(TerminalOptions::from_config(&config).reasoning_style, None);

        config.reasoning_color = ReasoningColor::Cyan;
        config.color_reasoning = false;
        assert_eq!(TerminalOptions::from_config(&config).reasoning_style, None);

        config.color_reasoning = true;
        assert_eq!(
            TerminalOptions::from_config(&config).reasoning_style,
            Some("\x1b[36m")
        );
    }

    #[test]
    fn test_preview_truncates() {
        let long = Value::String("x".repeat(200));
        assert_eq!(preview(&long).len(), MAX_TOOL_PREVIEW + 3);
    }
}
