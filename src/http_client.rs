//! reqwest client construction for the model backend

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, Proxy};

use crate::model::config::TlsBackend;

/// Upper bound on the TCP/TLS connect phase
const MAX_CONNECT_TIMEOUT_SECS: u64 = 30;

const PROXY_SCHEMES: [&str; 4] = ["http://", "https://", "socks5://", "socks5h://"];

/// Outbound proxy
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    fn to_proxy(&self) -> anyhow::Result<Proxy> {
        let lower = self.url.to_ascii_lowercase();
        if !PROXY_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
            anyhow::bail!(
                "Unsupported proxy URL {:?}, expected one of: {}",
                self.url,
                PROXY_SCHEMES.join(", ")
            );
        }
        let proxy = Proxy::all(&self.url)
            .with_context(|| format!("Invalid proxy URL: {}", self.url))?;
        Ok(match (&self.username, &self.password) {
            (Some(username), Some(password)) => proxy.basic_auth(username, password),
            _ => proxy,
        })
    }
}

/// Build the backend HTTP client
///
/// `timeout_secs` bounds the whole request including the streamed body;
/// connecting is bounded separately so an absent server fails fast.
pub fn build_client(
    proxy: Option<&ProxyConfig>,
    timeout_secs: u64,
    tls_backend: TlsBackend,
) -> anyhow::Result<Client> {
    let mut builder = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs.min(MAX_CONNECT_TIMEOUT_SECS)));

    if tls_backend == TlsBackend::Rustls {
        builder = builder.use_rustls_tls();
    }

    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy.to_proxy()?);
        tracing::debug!(proxy = %proxy.url, auth = proxy.username.is_some(), "Backend client using proxy");
    }

    builder.build().context("Failed to build HTTP client")
}
