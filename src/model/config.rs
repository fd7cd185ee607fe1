use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::http_client::ProxyConfig;

/// Marker left in generated configs until the backend URL is set
pub const BACKEND_URL_PLACEHOLDER: &str = "PLEASE_CONFIGURE_BACKEND_URL";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TlsBackend {
    #[default]
    Rustls,
    NativeTls,
}

/// ANSI styling applied to reasoning text in the terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningColor {
    #[default]
    Dim,
    Gray,
    Cyan,
    Yellow,
    Red,
    None,
}

impl ReasoningColor {
    /// Escape sequence that starts the style, empty for `None`
    pub fn ansi(&self) -> &'static str {
        match self {
            Self::Dim => "\x1b[2m",
            Self::Gray => "\x1b[90m",
            Self::Cyan => "\x1b[36m",
            Self::Yellow => "\x1b[33m",
            Self::Red => "\x1b[31m",
            Self::None => "",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// API key required by `/api/chat` (optional)
    #[serde(default)]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL of the model server, ending in `/v1`
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Bearer key for the model server (optional)
    #[serde(default)]
    pub backend_api_key: Option<String>,

    #[serde(default = "default_upstream_model")]
    pub upstream_model: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub tls_backend: TlsBackend,

    /// HTTP proxy URL (optional)
    /// Supported formats: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    pub proxy_url: Option<String>,

    #[serde(default)]
    pub proxy_username: Option<String>,

    #[serde(default)]
    pub proxy_password: Option<String>,

    /// Whole-request timeout, generous because a cold backend can take minutes
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts for retryable statuses before the stream starts
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_true")]
    pub show_reasoning: bool,

    #[serde(default = "default_true")]
    pub color_reasoning: bool,

    #[serde(default)]
    pub reasoning_color: ReasoningColor,

    /// Written before the first reasoning delta of a turn
    #[serde(default)]
    pub reasoning_prefix: String,

    /// Written once when reasoning gives way to the answer
    #[serde(default = "default_reasoning_suffix")]
    pub reasoning_suffix: String,

    /// Names of built-in tools advertised to the model
    #[serde(default)]
    pub tools: Vec<String>,

    /// Upstream requests per turn while the model keeps calling tools
    #[serde(default = "default_max_tool_steps")]
    pub max_tool_steps: usize,

    /// Upper bound on one tool execution, reported as a tool error when hit
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Maximum request body size in bytes (0 = unlimited, default: 400000)
    #[serde(default = "default_max_request_body_bytes")]
    pub max_request_body_bytes: usize,

    /// Config file path (runtime metadata, not written to JSON)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8000/v1".to_string()
}

fn default_upstream_model() -> String {
    "llm".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant.".to_string()
}

fn default_request_timeout_secs() -> u64 {
    720
}

fn default_max_retries() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_reasoning_suffix() -> String {
    "\n".to_string()
}

fn default_max_tool_steps() -> usize {
    4
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_max_request_body_bytes() -> usize {
    400_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
            backend_url: default_backend_url(),
            backend_api_key: None,
            upstream_model: default_upstream_model(),
            system_prompt: default_system_prompt(),
            temperature: None,
            max_tokens: None,
            tls_backend: TlsBackend::default(),
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            show_reasoning: true,
            color_reasoning: true,
            reasoning_color: ReasoningColor::default(),
            reasoning_prefix: String::new(),
            reasoning_suffix: default_reasoning_suffix(),
            tools: Vec::new(),
            max_tool_steps: default_max_tool_steps(),
            tool_timeout_secs: default_tool_timeout_secs(),
            max_request_body_bytes: default_max_request_body_bytes(),
            config_path: None,
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // Config file doesn't exist, return default config
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Apply `LLM_BACKEND_URL` / `LLM_BACKEND_API_KEY` from the environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("LLM_BACKEND_URL").filter(|v| !v.trim().is_empty()) {
            self.backend_url = url;
        }
        if let Some(key) = lookup("LLM_BACKEND_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.backend_api_key = Some(key);
        }
    }

    /// Reject a missing or placeholder backend URL
    pub fn check_backend_url(&self) -> anyhow::Result<()> {
        let url = self.backend_url.trim();
        if url.is_empty() || url.contains(BACKEND_URL_PLACEHOLDER) {
            anyhow::bail!(
                "Backend URL is not configured.\n\
                 Set it with:\n\
                 \x20    export LLM_BACKEND_URL='https://your-endpoint.com/v1'\n\
                 or set \"backendUrl\" in {}",
                self.config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| Self::default_config_path().to_string())
            );
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("Backend URL must start with http:// or https://: {}", url);
        }
        Ok(())
    }

    /// Proxy settings, if a proxy URL is configured
    pub fn proxy_config(&self) -> Option<ProxyConfig> {
        self.proxy_url.as_ref().map(|url| {
            let mut proxy = ProxyConfig::new(url);
            if let (Some(username), Some(password)) = (&self.proxy_username, &self.proxy_password)
            {
                proxy = proxy.with_auth(username, password);
            }
            proxy
        })
    }

    /// Get config file path (if available)
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
