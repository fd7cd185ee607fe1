//! SSE frame parsing
//!
//! A frame is a block of `field: value` lines terminated by a blank line:
//!
//! ```text
//! event: message        (optional)
//! id: 42                (optional)
//! data: {"choices":[]}  (one or more, joined with '\n')
//! <blank line>
//! ```

use serde::de::DeserializeOwned;

use super::error::ParseResult;

/// End-of-stream marker used by OpenAI-compatible servers
pub const DONE_MARKER: &str = "[DONE]";

/// One decoded SSE frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

impl SseFrame {
    /// Get event name
    pub fn event_type(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// Whether the frame carries the `[DONE]` marker
    pub fn is_done(&self) -> bool {
        self.data.trim() == DONE_MARKER
    }

    /// Whether the frame carries nothing (comments or keep-alives only)
    pub fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_empty()
    }

    /// Parse data as JSON
    pub fn payload_as_json<T: DeserializeOwned>(&self) -> ParseResult<T> {
        Ok(serde_json::from_str(&self.data)?)
    }
}

/// Find the end of the first frame in `buffer`
///
/// Returns `(block_len, consumed)` where `block_len` excludes the blank-line
/// terminator. Both `\n\n` and `\r\n\r\n` terminate a frame.
pub fn find_frame_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buffer.len() {
        if buffer[i] == b'\n' {
            if buffer.get(i + 1) == Some(&b'\n') {
                return Some((i, i + 2));
            }
            if buffer.get(i + 1) == Some(&b'\r') && buffer.get(i + 2) == Some(&b'\n') {
                let end = if i > 0 && buffer[i - 1] == b'\r' { i - 1 } else { i };
                return Some((end, i + 3));
            }
        }
        i += 1;
    }
    None
}

/// Parse one frame block (without its terminator)
pub fn parse_block(block: &[u8]) -> ParseResult<SseFrame> {
    let text = std::str::from_utf8(block)?;
    let mut frame = SseFrame::default();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => frame.event = Some(value.to_string()),
            "data" => data_lines.push(value),
            "id" => frame.id = Some(value.to_string()),
            _ => {}
        }
    }

    frame.data = data_lines.join("\n");
    Ok(frame)
}

/// Parse the first complete frame in `buffer`
///
/// # Returns
/// - `Ok(Some((frame, consumed)))` - a frame and the bytes it occupied
/// - `Ok(None)` - no complete frame yet
pub fn parse_frame(buffer: &[u8]) -> ParseResult<Option<(SseFrame, usize)>> {
    let Some((block_len, consumed)) = find_frame_boundary(buffer) else {
        return Ok(None);
    };
    let frame = parse_block(&buffer[..block_len])?;
    Ok(Some((frame, consumed)))
}
