//! Chat API handlers

use std::convert::Infallible;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::transcript::{Role, TranscriptBuilder, driver};

use super::error::ChatError;
use super::middleware::AppState;
use super::stream::frame_for_update;
use super::types::{ChatRequest, HealthResponse};

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /api/chat
///
/// Streams the assistant message as SSE frames, or returns it as JSON when
/// `stream` is false.
pub async fn post_chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ChatError> {
    validate(&payload)?;

    let request = state
        .runner
        .request(&payload.messages, payload.system.as_deref());
    tracing::info!(
        model = %request.model,
        history = payload.messages.len(),
        stream = payload.stream,
        "Received POST /api/chat request"
    );

    let events = state.runner.start(request);

    if !payload.stream {
        let message = driver::collect(events).await;
        tracing::info!(
            message_id = %message.id,
            parts = message.parts.len(),
            finish = message.finish.as_str(),
            "Chat turn finished"
        );
        return Ok(Json(message).into_response());
    }

    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    let closed = tx.clone();
    tokio::spawn(async move {
        // Client disconnect drops the body, closing the channel
        let cancel = async move { closed.closed().await };
        let message = driver::drive(TranscriptBuilder::new(), events, cancel, |update| {
            if let Some(frame) = frame_for_update(update) {
                let _ = tx.send(frame.to_bytes());
            }
        })
        .await;
        tracing::info!(
            message_id = %message.id,
            parts = message.parts.len(),
            finish = message.finish.as_str(),
            "Chat turn finished"
        );
    });

    let body = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|bytes| (Ok::<_, Infallible>(bytes), rx))
    });

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

fn validate(payload: &ChatRequest) -> Result<(), ChatError> {
    let Some(last) = payload.messages.last() else {
        return Err(ChatError::InvalidRequest("messages must not be empty".to_string()));
    };
    if last.role != Role::User {
        return Err(ChatError::InvalidRequest(
            "the last message must be a user message".to_string(),
        ));
    }
    if last.text().trim().is_empty() {
        return Err(ChatError::InvalidRequest(
            "the user message has no text".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{Router, routing::post};

    use crate::model::config::Config;
    use crate::tools::ToolRegistry;
    use crate::transcript::{FinishReason, Message, Part};
    use crate::turn::{TurnRunner, TurnSettings};
    use crate::upstream::provider::ChatProvider;

    const UPSTREAM_BODY: &str = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"reasoning_content\":\"hm\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    /// Serve a fixed SSE body on a local port, returning its base URL
    async fn fake_backend() -> String {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { ([(header::CONTENT_TYPE, "text/event-stream")], UPSTREAM_BODY) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn state(base_url: &str) -> AppState {
        let provider = ChatProvider::with_client(reqwest::Client::new(), base_url, None, 1);
        let config = Config::default();
        let runner = TurnRunner::new(
            Arc::new(provider),
            Arc::new(ToolRegistry::new()),
            TurnSettings::from_config(&config),
        );
        AppState::new(runner)
    }

    fn chat_request(messages: Vec<Message>, stream: bool) -> ChatRequest {
        ChatRequest {
            messages,
            stream,
            system: None,
        }
    }

    #[test]
    fn test_validate_rejects_bad_history() {
        assert!(validate(&chat_request(vec![], true)).is_err());

        let assistant = Message::new(Role::Assistant, vec![Part::text("hi")]);
        assert!(validate(&chat_request(vec![assistant], true)).is_err());

        assert!(validate(&chat_request(vec![Message::user("  ")], true)).is_err());
        assert!(validate(&chat_request(vec![Message::user("hi")], true)).is_ok());
    }

    #[tokio::test]
    async fn test_post_chat_json() {
        let base_url = fake_backend().await;
        let response = post_chat(
            State(state(&base_url)),
            Json(chat_request(vec![Message::user("hi")], false)),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let message: Message = serde_json::from_slice(&body).unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(
            message.parts,
            vec![Part::reasoning("hm"), Part::text("Hello")]
        );
        assert_eq!(message.finish, FinishReason::Completed);
    }

    #[tokio::test]
    async fn test_post_chat_stream() {
        let base_url = fake_backend().await;
        let response = post_chat(
            State(state(&base_url)),
            Json(chat_request(vec![Message::user("hi")], true)),
        )
        .await
        .unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        let kinds: Vec<_> = body
            .lines()
            .filter_map(|line| line.strip_prefix("event: "))
            .collect();
        assert_eq!(
            kinds,
            vec![
                "start",
                "reasoning-delta",
                "text-delta",
                "text-delta",
                "finish"
            ]
        );
        assert!(body.contains("data: {\"incomplete\":false,\"reason\":\"completed\"}"));
    }

    #[tokio::test]
    async fn test_post_chat_stream_reports_interruption() {
        let response = post_chat(
            State(state("http://127.0.0.1:9/v1")),
            Json(chat_request(vec![Message::user("hi")], true)),
        )
        .await
        .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        let kinds: Vec<_> = body
            .lines()
            .filter_map(|line| line.strip_prefix("event: "))
            .collect();
        assert_eq!(kinds, ["start", "finish"]);
        assert!(body.starts_with("event: start\ndata: {\"messageId\":\"msg_"));
        assert!(body.contains("\"reason\":\"interrupted\""));
        assert!(body.contains("\"incomplete\":true"));
    }
}
