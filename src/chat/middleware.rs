//! Chat API middleware

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::common::auth;
use crate::turn::TurnRunner;

use super::error::ChatError;

/// Application shared state
#[derive(Clone)]
pub struct AppState {
    /// API key; `None` leaves `/api/chat` open
    pub api_key: Option<String>,
    pub runner: TurnRunner,
}

impl AppState {
    pub fn new(runner: TurnRunner) -> Self {
        Self {
            api_key: None,
            runner,
        }
    }

    /// Require this key on chat requests; an empty key is ignored
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }
}

/// API Key authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };
    match auth::extract_api_key(request.headers()) {
        Some(key) if auth::constant_time_eq(&key, expected) => next.run(request).await,
        _ => {
            tracing::warn!(path = %request.uri().path(), "Rejected request with missing or invalid API key");
            ChatError::Unauthorized.into_response()
        }
    }
}

/// CORS middleware layer
///
/// Allows any origin so browser front ends on other ports can stream from
/// the server.
pub fn cors_layer() -> tower_http::cors::CorsLayer {
    use tower_http::cors::{Any, CorsLayer};

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
