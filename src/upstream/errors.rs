//! Upstream error definitions
//!
//! Also turns terse backend error bodies into user-facing messages.

use std::fmt;

use serde_json::Value;

use super::sse::error::ParseError;

/// Failure talking to the model-serving backend
#[derive(Debug)]
pub enum UpstreamError {
    /// Backend URL missing or left at its placeholder
    NotConfigured(String),
    /// Backend answered with a non-success status
    Status { status: u16, message: String },
    /// Transport failure
    Network(reqwest::Error),
    /// Stream framing could not be decoded
    Decode(ParseError),
    /// Backend reported an error inside the event stream
    Stream(String),
    /// Byte stream ended without `[DONE]` or a finish reason
    Truncated,
    /// Every retry attempt failed
    RetriesExhausted { attempts: usize, last_error: String },
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured(msg) => write!(f, "Backend not configured: {}", msg),
            Self::Status { status, message } => {
                write!(f, "Backend returned HTTP {}: {}", status, message)
            }
            Self::Network(e) => write!(f, "Network error: {}", e),
            Self::Decode(e) => write!(f, "Stream decode error: {}", e),
            Self::Stream(msg) => write!(f, "Backend stream error: {}", msg),
            Self::Truncated => write!(f, "Stream ended before completion"),
            Self::RetriesExhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "Backend unavailable after {} attempts: {}",
                attempts, last_error
            ),
        }
    }
}

impl std::error::Error for UpstreamError {}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e)
    }
}

impl From<ParseError> for UpstreamError {
    fn from(e: ParseError) -> Self {
        Self::Decode(e)
    }
}

impl UpstreamError {
    /// Whether a fresh attempt may succeed (startup, overload, flaky connect)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            Self::Network(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Structured information about a backend error
#[derive(Debug, Clone)]
pub struct UpstreamErrorInfo {
    /// Error code or type reported by the backend
    pub reason: String,
    /// Message suitable for end users
    pub user_message: String,
    /// Original message (for logging)
    pub original_message: String,
}

/// Enhance a backend error body
///
/// Understands the OpenAI shape `{"error": {"message", "type", "code"}}` and
/// the flat shape `{"message", "reason"}`.
pub fn enhance_upstream_error(status: u16, error_json: &Value) -> UpstreamErrorInfo {
    let inner = error_json.get("error").filter(|v| v.is_object()).unwrap_or(error_json);

    let original_message = inner
        .get("message")
        .and_then(|v| v.as_str())
        .or_else(|| error_json.get("error").and_then(|v| v.as_str()))
        .unwrap_or("Unknown error")
        .to_string();

    let reason = inner
        .get("code")
        .and_then(|v| v.as_str())
        .or_else(|| inner.get("type").and_then(|v| v.as_str()))
        .or_else(|| inner.get("reason").and_then(|v| v.as_str()))
        .unwrap_or("UNKNOWN")
        .to_string();

    let user_message = match (status, reason.as_str()) {
        (_, "context_length_exceeded") => {
            "Model context limit reached. Conversation size exceeds model capacity.".to_string()
        }
        (429, _) | (_, "rate_limit_exceeded") => {
            "Rate limit exceeded. Please wait a moment before retrying.".to_string()
        }
        (503, _) => {
            "Model backend is starting up or overloaded. Please try again shortly.".to_string()
        }
        (401, _) | (403, _) | (_, "invalid_api_key") => {
            "Backend rejected the API key. Check backendApiKey.".to_string()
        }
        (404, _) | (_, "model_not_found") => {
            format!("Model or endpoint not found: {}", original_message)
        }
        (_, "UNKNOWN") => original_message.clone(),
        _ => format!("{} (reason: {})", original_message, reason),
    };

    UpstreamErrorInfo {
        reason,
        user_message,
        original_message,
    }
}

/// Enhance a raw error body, falling back to the body text
pub fn enhance_error_body(status: u16, body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(error_json) => {
            let info = enhance_upstream_error(status, &error_json);
            tracing::debug!(
                original_message = %info.original_message,
                reason = %info.reason,
                "Backend error enhanced"
            );
            info.user_message
        }
        Err(_) if body.trim().is_empty() => format!("empty response body (HTTP {})", status),
        Err(_) => body.trim().to_string(),
    }
}
