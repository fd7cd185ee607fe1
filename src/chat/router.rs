//! Chat API routing

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

use super::{
    handlers::{health, post_chat},
    middleware::{AppState, auth_middleware, cors_layer},
};

/// Create the chat API router
///
/// # Endpoints
/// - `POST /api/chat` - Stream one assistant message (SSE or JSON)
/// - `GET /health` - Liveness check, never authenticated
///
/// # Authentication
/// When an API key is configured, `/api` routes accept it through:
/// - `x-api-key` header
/// - `Authorization: Bearer <token>` header
///
/// `max_body_bytes` of 0 disables the request body limit.
pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    let body_limit = if max_body_bytes == 0 {
        DefaultBodyLimit::disable()
    } else {
        DefaultBodyLimit::max(max_body_bytes)
    };

    let api_routes = Router::new()
        .route("/chat", post(post_chat))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(body_limit);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health))
        .layer(cors_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::model::config::Config;
    use crate::tools::ToolRegistry;
    use crate::turn::{TurnRunner, TurnSettings};
    use crate::upstream::provider::ChatProvider;

    async fn spawn_server(api_key: Option<&str>, max_body_bytes: usize) -> String {
        let provider =
            ChatProvider::with_client(reqwest::Client::new(), "http://127.0.0.1:9/v1", None, 1);
        let runner = TurnRunner::new(
            Arc::new(provider),
            Arc::new(ToolRegistry::new()),
            TurnSettings::from_config(&Config::default()),
        );
        let state = AppState::new(runner).with_api_key(api_key.map(str::to_string));
        let app = create_router(state, max_body_bytes);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn body() -> serde_json::Value {
        json!({
            "messages": [{"role": "user", "parts": [{"type": "text", "text": "hi"}]}],
            "stream": false
        })
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let base = spawn_server(Some("secret"), 0).await;
        let response = reqwest::get(format!("{}/health", base)).await.unwrap();
        assert_eq!(response.status(), 200);
        let value: serde_json::Value = response.json().await.unwrap();
        assert_eq!(value["status"], "ok");
    }

    #[tokio::test]
    async fn test_chat_requires_api_key() {
        let base = spawn_server(Some("secret"), 0).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/api/chat", base))
            .json(&body())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
        let value: serde_json::Value = response.json().await.unwrap();
        assert_eq!(value["error"]["type"], "authentication_error");

        let response = client
            .post(format!("{}/api/chat", base))
            .header("x-api-key", "secret")
            .json(&body())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let value: serde_json::Value = response.json().await.unwrap();
        assert_eq!(value["finish"]["reason"], "interrupted");
    }

    #[tokio::test]
    async fn test_bearer_token_accepted() {
        let base = spawn_server(Some("secret"), 0).await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/chat", base))
            .bearer_auth("secret")
            .json(&body())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_invalid_conversation_is_bad_request() {
        let base = spawn_server(None, 0).await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/chat", base))
            .json(&json!({"messages": []}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let value: serde_json::Value = response.json().await.unwrap();
        assert_eq!(value["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let base = spawn_server(None, 64).await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/chat", base))
            .json(&body())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 413);
    }
}
