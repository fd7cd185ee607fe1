//! Chat API error type definitions

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

#[derive(Debug)]
pub enum ChatError {
    /// Request body is structurally valid JSON but not a usable conversation
    InvalidRequest(String),
    /// Missing or wrong API key
    Unauthorized,
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ChatError::Unauthorized => write!(f, "Invalid API key"),
        }
    }
}

impl std::error::Error for ChatError {}

impl ChatError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ChatError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ChatError::InvalidRequest(_) => "invalid_request_error",
            ChatError::Unauthorized => "authentication_error",
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new(self.error_type(), self.to_string());
        (self.status_code(), Json(body)).into_response()
    }
}
