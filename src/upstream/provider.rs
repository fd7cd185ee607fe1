//! Model server provider
//!
//! Sends streaming chat-completions requests to an OpenAI-compatible
//! backend. Retries while the backend is starting up or overloaded.

use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::time::Duration;
use tokio::time::sleep;

use super::errors::{UpstreamError, enhance_error_body};
use super::types::ChatCompletionRequest;
use crate::http_client::{ProxyConfig, build_client};
use crate::model::config::Config;

/// Key sent when none is configured; local servers accept any bearer
const DUMMY_API_KEY: &str = "dummy";

/// Hard limit on attempts regardless of configuration
const MAX_TOTAL_ATTEMPTS: usize = 10;

pub struct ChatProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: usize,
}

impl ChatProvider {
    /// Create a provider from configuration
    pub fn new(config: &Config, proxy: Option<ProxyConfig>) -> anyhow::Result<Self> {
        config.check_backend_url()?;
        let client = build_client(
            proxy.as_ref(),
            config.request_timeout_secs,
            config.tls_backend,
        )?;
        Ok(Self::with_client(
            client,
            &config.backend_url,
            config.backend_api_key.clone(),
            config.max_retries,
        ))
    }

    pub fn with_client(
        client: Client,
        base_url: &str,
        api_key: Option<String>,
        max_retries: usize,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            max_retries,
        }
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_headers(&self) -> Result<HeaderMap, UpstreamError> {
        let key = self.api_key.as_deref().unwrap_or(DUMMY_API_KEY);
        let authorization = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|_| UpstreamError::NotConfigured("backend API key is not a valid header value".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(AUTHORIZATION, authorization);
        Ok(headers)
    }

    /// Send a streaming request, returning the response once headers arrive
    ///
    /// 429/502/503/504 and connection failures are retried with backoff;
    /// any other non-success status fails immediately.
    pub async fn call_api_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<reqwest::Response, UpstreamError> {
        let url = self.completions_url();
        let headers = self.build_headers()?;
        let attempts = self.max_retries.max(1).min(MAX_TOTAL_ATTEMPTS);
        let mut last_error: Option<UpstreamError> = None;

        for attempt in 0..attempts {
            let result = self
                .client
                .post(&url)
                .headers(headers.clone())
                .json(request)
                .send()
                .await;

            let error = match result {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(attempt = attempt + 1, "Upstream stream opened");
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    UpstreamError::Status {
                        status,
                        message: enhance_error_body(status, &body),
                    }
                }
                Err(e) => UpstreamError::Network(e),
            };

            if !error.is_retryable() {
                return Err(error);
            }

            tracing::warn!(
                "Upstream request failed (attempt {}/{}): {}",
                attempt + 1,
                attempts,
                error
            );
            last_error = Some(error);
            if attempt + 1 < attempts {
                sleep(Self::retry_delay(attempt)).await;
            }
        }

        Err(UpstreamError::RetriesExhausted {
            attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        })
    }

    fn retry_delay(attempt: usize) -> Duration {
        const BASE_MS: u64 = 500;
        const MAX_MS: u64 = 8_000;
        let exp = BASE_MS.saturating_mul(2u64.saturating_pow(attempt.min(6) as u32));
        let backoff = exp.min(MAX_MS);
        let jitter_max = (backoff / 4).max(1);
        let jitter = fastrand::u64(0..=jitter_max);
        Duration::from_millis(backoff.saturating_add(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(base_url: &str, api_key: Option<&str>) -> ChatProvider {
        ChatProvider::with_client(
            Client::new(),
            base_url,
            api_key.map(str::to_string),
            3,
        )
    }

    #[test]
    fn test_completions_url_trims_slash() {
        let provider = provider("http://127.0.0.1:8000/v1/", None);
        assert_eq!(
            provider.completions_url(),
            "http://127.0.0.1:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_build_headers_dummy_key() {
        let headers = provider("http://x/v1", None).build_headers().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer dummy");
        assert_eq!(headers.get(ACCEPT).unwrap(), "text/event-stream");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_build_headers_configured_key() {
        let headers = provider("http://x/v1", Some("sk-test")).build_headers().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer sk-test");
    }

    #[test]
    fn test_build_headers_invalid_key() {
        let result = provider("http://x/v1", Some("bad\nkey")).build_headers();
        assert!(matches!(result, Err(UpstreamError::NotConfigured(_))));
    }

    #[test]
    fn test_new_rejects_placeholder() {
        let mut config = Config::default();
        config.backend_url = String::new();
        assert!(ChatProvider::new(&config, None).is_err());
    }

    #[test]
    fn test_retry_delay_bounded() {
        for attempt in 0..20 {
            let delay = ChatProvider::retry_delay(attempt);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(10_000));
        }
    }

    #[tokio::test]
    async fn test_connection_refused_exhausts_retries() {
        let provider = ChatProvider::with_client(Client::new(), "http://127.0.0.1:9/v1", None, 1);
        let request = ChatCompletionRequest {
            model: "llm".to_string(),
            messages: Vec::new(),
            stream: true,
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
            stream_options: None,
        };
        let result = provider.call_api_stream(&request).await;
        assert!(matches!(
            result,
            Err(UpstreamError::RetriesExhausted { attempts: 1, .. })
        ));
    }
}
