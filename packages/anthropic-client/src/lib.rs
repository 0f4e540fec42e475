//! Pure Anthropic Messages API client
//!
//! A clean, minimal client for the Anthropic API with no domain-specific logic.
//! Supports the Messages endpoint with system prompts and temperature control.
//!
//! # Example
//!
//! ```rust,ignore
//! use anthropic_client::{AnthropicClient, Message, MessagesRequest};
//!
//! let client = AnthropicClient::from_env()?;
//!
//! let response = client
//!     .messages(
//!         MessagesRequest::new("claude-3-5-haiku-latest", 1024)
//!             .system("You are a technical writer.")
//!             .temperature(0.0)
//!             .message(Message::user("Summarize this page...")),
//!     )
//!     .await?;
//! println!("{}", response.content);
//! ```

pub mod error;
pub mod types;

pub use error::{AnthropicError, Result};
pub use types::*;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Pure Anthropic API client.
///
/// The API key is held as a [`secrecy::SecretString`] so it never shows up
/// in debug output or logs.
#[derive(Clone)]
pub struct AnthropicClient {
    http_client: Client,
    api_key: SecretString,
    base_url: String,
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the `LLM_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| AnthropicError::Config("LLM_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    /// Set a custom base URL (for proxies and tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a Messages request and return the flattened text response.
    pub async fn messages(&self, request: MessagesRequest) -> Result<MessagesResponse> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Anthropic request failed");
                AnthropicError::Network(e.to_string())
            })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            warn!(?retry_after_secs, "Anthropic rate limit hit");
            return Err(AnthropicError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %message, "Anthropic API error");
            return Err(AnthropicError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw: MessagesResponseRaw = response
            .json()
            .await
            .map_err(|e| AnthropicError::Parse(e.to_string()))?;

        let content: String = raw
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();

        if content.is_empty() {
            return Err(AnthropicError::Api {
                status: status.as_u16(),
                message: "No text content in response".into(),
            });
        }

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis(),
            "Anthropic messages completion"
        );

        Ok(MessagesResponse {
            content,
            stop_reason: raw.stop_reason,
            usage: raw.usage,
        })
    }
}
