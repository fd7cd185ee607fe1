//! Chat API type definitions

use serde::{Deserialize, Serialize};

use crate::transcript::{FinishReason, Message};

// === Error Response ===

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                error_type: error_type.into(),
                message: message.into(),
            },
        }
    }
}

// === Chat Endpoint Types ===

/// `POST /api/chat` body
///
/// `messages` is the prior transcript followed by the new user message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    /// Replaces the configured system prompt for this request
    #[serde(default)]
    pub system: Option<String>,
}

fn default_stream() -> bool {
    true
}

/// Payload of the `start` frame
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartFrame {
    pub message_id: String,
}

/// Payload of the terminal `finish` frame
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishFrame {
    #[serde(flatten)]
    pub finish: FinishReason,
    pub incomplete: bool,
}

impl From<&FinishReason> for FinishFrame {
    fn from(finish: &FinishReason) -> Self {
        Self {
            finish: finish.clone(),
            incomplete: finish.is_incomplete(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_request_defaults() {
        let request: ChatRequest = serde_json::from_value(json!({
            "messages": [{"role": "user", "parts": [{"type": "text", "text": "hi"}]}]
        }))
        .unwrap();
        assert!(request.stream);
        assert!(request.system.is_none());
        assert_eq!(request.messages[0].text(), "hi");
    }

    #[test]
    fn test_finish_frame_shape() {
        let frame = FinishFrame::from(&FinishReason::Interrupted {
            error: "reset".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"reason": "interrupted", "error": "reset", "incomplete": true})
        );

        let frame = FinishFrame::from(&FinishReason::Completed);
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"reason": "completed", "incomplete": false})
        );
    }
}
