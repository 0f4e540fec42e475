//! Fetching traits and the fetch response type.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{FetchError, FetchResult};

/// One successfully fetched HTTP response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Response headers (lowercase names)
    pub headers: HashMap<String, String>,

    /// Raw body bytes
    pub body: Vec<u8>,

    /// Time the request took
    pub elapsed: Duration,

    /// Retries that were needed before this response arrived
    pub retries: u32,
}

impl FetchResponse {
    /// Declared content type, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get("content-type")
            .map(|v| v.split(';').next().unwrap_or(v).trim())
    }

    /// Charset parameter of the content type, if declared.
    pub fn charset(&self) -> Option<String> {
        self.headers.get("content-type").and_then(|v| {
            v.split(';')
                .map(str::trim)
                .find_map(|p| p.strip_prefix("charset="))
                .map(|c| c.trim_matches('"').to_ascii_lowercase())
        })
    }
}

/// Fetches single URLs politely.
///
/// Implementations own retries, timeouts, per-host delays, and size caps;
/// callers see either a response or a typed [`FetchError`].
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch a URL.
    async fn fetch(&self, url: &str) -> FetchResult<FetchResponse>;
}

/// Headless rendering fallback for script-heavy pages.
///
/// Returns the rendered HTML. The default deployment ships without a
/// renderer; the pipeline only consults one when it is installed.
#[async_trait]
pub trait Render: Send + Sync {
    /// Render a URL and return the resulting HTML.
    async fn render(&self, url: &str) -> FetchResult<String>;
}

/// Blanket passthrough so `Arc<F>` is usable wherever `F: Fetch` is.
#[async_trait]
impl<F: Fetch + ?Sized> Fetch for std::sync::Arc<F> {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        (**self).fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_content_type(value: &str) -> FetchResponse {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), value.to_string());
        FetchResponse {
            url: "https://example.com".to_string(),
            status: 200,
            headers,
            body: Vec::new(),
            elapsed: Duration::from_millis(1),
            retries: 0,
        }
    }

    #[test]
    fn test_content_type_strips_parameters() {
        let response = response_with_content_type("text/html; charset=UTF-8");
        assert_eq!(response.content_type(), Some("text/html"));
        assert_eq!(response.charset().as_deref(), Some("utf-8"));
    }

    #[test]
    fn test_missing_charset() {
        let response = response_with_content_type("text/html");
        assert_eq!(response.charset(), None);
    }
}
