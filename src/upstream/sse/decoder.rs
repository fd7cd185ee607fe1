//! SSE streaming decoder
//!
//! Buffers arbitrary byte chunks and yields complete frames, tolerating a
//! bounded number of consecutive corrupt frames.
//!
//! ```text
//! ┌─────────┐ feed()  ┌─────────┐  ok   ┌─────────┐
//! │  Ready  │────────▶│ Parsing │──────▶│  Ready  │
//! └─────────┘         └────┬────┘       └─────────┘
//!                          │ error
//!                          ├─▶ error_count < max_errors → Recovering → Ready
//!                          └─▶ otherwise → Stopped (terminal)
//! ```

use bytes::{Buf, BytesMut};

use super::error::{ParseError, ParseResult};
use super::frame::{SseFrame, find_frame_boundary, parse_block, parse_frame};

/// Default maximum buffer size (4 MB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Default maximum consecutive errors
pub const DEFAULT_MAX_ERRORS: usize = 5;

/// Default initial buffer capacity
pub const DEFAULT_BUFFER_CAPACITY: usize = 8192;

/// Decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Ready, can receive data
    Ready,
    /// Currently parsing frame
    Parsing,
    /// Skipped a corrupt frame, waiting for more data
    Recovering,
    /// Stopped (too many errors)
    Stopped,
}

/// Streaming SSE decoder
///
/// Frames are returned in arrival order; comment-only and empty frames are
/// dropped without counting as output.
///
/// ```rust,ignore
/// let mut decoder = SseDecoder::new();
/// decoder.feed(chunk)?;
/// while let Some(frame) = decoder.decode()? {
///     handle(frame.data);
/// }
/// ```
pub struct SseDecoder {
    buffer: BytesMut,
    state: DecoderState,
    error_count: usize,
    max_errors: usize,
    max_buffer_size: usize,
    bytes_skipped: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_BUFFER_CAPACITY,
            DEFAULT_MAX_ERRORS,
            DEFAULT_MAX_BUFFER_SIZE,
        )
    }

    pub fn with_config(capacity: usize, max_errors: usize, max_buffer_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: DecoderState::Ready,
            error_count: 0,
            max_errors,
            max_buffer_size,
            bytes_skipped: 0,
        }
    }

    /// Feed data to decoder
    pub fn feed(&mut self, data: &[u8]) -> ParseResult<()> {
        let new_size = self.buffer.len() + data.len();
        if new_size > self.max_buffer_size {
            return Err(ParseError::BufferOverflow {
                size: new_size,
                max: self.max_buffer_size,
            });
        }

        self.buffer.extend_from_slice(data);

        if self.state == DecoderState::Recovering {
            self.state = DecoderState::Ready;
        }

        Ok(())
    }

    /// Try to decode next non-empty frame
    ///
    /// # Returns
    /// - `Ok(Some(frame))` - Successfully decoded a frame
    /// - `Ok(None)` - Insufficient data, need more data
    /// - `Err(e)` - Decode error
    pub fn decode(&mut self) -> ParseResult<Option<SseFrame>> {
        if self.state == DecoderState::Stopped {
            return Err(ParseError::TooManyErrors {
                count: self.error_count,
                last_error: "Decoder stopped".to_string(),
            });
        }

        loop {
            if self.buffer.is_empty() {
                self.state = DecoderState::Ready;
                return Ok(None);
            }

            self.state = DecoderState::Parsing;

            match parse_frame(&self.buffer) {
                Ok(Some((frame, consumed))) => {
                    self.buffer.advance(consumed);
                    self.state = DecoderState::Ready;
                    self.error_count = 0;
                    if !frame.is_empty() {
                        return Ok(Some(frame));
                    }
                }
                Ok(None) => {
                    self.state = DecoderState::Ready;
                    return Ok(None);
                }
                Err(e) => return Err(self.on_error(e)),
            }
        }
    }

    fn on_error(&mut self, e: ParseError) -> ParseError {
        self.error_count += 1;
        let error_msg = e.to_string();

        if self.error_count >= self.max_errors {
            self.state = DecoderState::Stopped;
            tracing::error!(
                "SSE decoder stopped: {} consecutive errors, last error: {}",
                self.error_count,
                error_msg
            );
            return ParseError::TooManyErrors {
                count: self.error_count,
                last_error: error_msg,
            };
        }

        self.skip_frame();
        self.state = DecoderState::Recovering;
        e
    }

    /// Drop the corrupt frame at the head of the buffer
    fn skip_frame(&mut self) {
        let skip = find_frame_boundary(&self.buffer)
            .map(|(_, consumed)| consumed)
            .unwrap_or(self.buffer.len());
        self.buffer.advance(skip);
        self.bytes_skipped += skip;
        tracing::warn!(
            "Skipped corrupt SSE frame ({} bytes, total skipped {} bytes)",
            skip,
            self.bytes_skipped
        );
    }

    /// Decode a trailing frame that was not terminated by a blank line
    ///
    /// Called once the byte stream has ended.
    pub fn flush(&mut self) -> ParseResult<Option<SseFrame>> {
        if self.state == DecoderState::Stopped || self.buffer.is_empty() {
            return Ok(None);
        }
        let rest = self.buffer.split();
        let frame = parse_block(&rest)?;
        Ok((!frame.is_empty()).then_some(frame))
    }

    pub fn is_stopped(&self) -> bool {
        self.state == DecoderState::Stopped
    }
}
