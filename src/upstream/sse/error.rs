//! SSE parsing error definitions

use std::fmt;

/// Parse error types
#[derive(Debug)]
pub enum ParseError {
    /// Frame is not valid UTF-8
    InvalidUtf8(std::str::Utf8Error),
    /// Frame data is not the expected JSON
    PayloadDeserialize(serde_json::Error),
    /// Too many consecutive errors, decoder stopped
    TooManyErrors { count: usize, last_error: String },
    /// Buffer overflow
    BufferOverflow { size: usize, max: usize },
}

impl std::error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUtf8(e) => write!(f, "Frame is not valid UTF-8: {}", e),
            Self::PayloadDeserialize(e) => write!(f, "Payload deserialization failed: {}", e),
            Self::TooManyErrors { count, last_error } => {
                write!(
                    f,
                    "Too many consecutive errors ({} times), decoder stopped: {}",
                    count, last_error
                )
            }
            Self::BufferOverflow { size, max } => {
                write!(f, "Buffer overflow: {} bytes (max {})", size, max)
            }
        }
    }
}

impl From<std::str::Utf8Error> for ParseError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::InvalidUtf8(e)
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        Self::PayloadDeserialize(e)
    }
}

/// Parse result type
pub type ParseResult<T> = Result<T, ParseError>;
