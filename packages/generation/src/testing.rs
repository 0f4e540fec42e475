//! Mock implementations for testing.
//!
//! `MockFetcher` serves scripted responses keyed by canonical URL;
//! `MockRenderer` returns fixed HTML. Both record the calls they receive.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::crawler::canonicalize;
use crate::error::{FetchError, FetchResult};
use crate::traits::fetch::{Fetch, FetchResponse, Render};

/// Scripted fetcher for unit tests.
///
/// Unregistered URLs return HTTP 404.
#[derive(Default)]
pub struct MockFetcher {
    routes: HashMap<String, MockRoute>,
    calls: Mutex<Vec<String>>,
}

enum MockRoute {
    Html(String),
    Plain(String),
    Error(u16),
}

impl MockFetcher {
    /// Create an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(url: &str) -> String {
        canonicalize(url).unwrap_or_else(|| url.to_string())
    }

    /// Serve an HTML page at a URL.
    pub fn with_html_page(mut self, url: &str, html: &str) -> Self {
        self.routes
            .insert(Self::key(url), MockRoute::Html(html.to_string()));
        self
    }

    /// Serve a plain-text page at a URL.
    pub fn with_plain_page(mut self, url: &str, text: &str) -> Self {
        self.routes
            .insert(Self::key(url), MockRoute::Plain(text.to_string()));
        self
    }

    /// Serve an HTTP error status at a URL.
    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.routes.insert(Self::key(url), MockRoute::Error(status));
        self
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchResponse> {
        self.calls.lock().unwrap().push(url.to_string());

        let route = self.routes.get(&Self::key(url));
        let (content_type, body) = match route {
            Some(MockRoute::Html(html)) => ("text/html; charset=utf-8", html.clone()),
            Some(MockRoute::Plain(text)) => ("text/plain; charset=utf-8", text.clone()),
            Some(MockRoute::Error(status)) => {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    status: *status,
                })
            }
            None => {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    status: 404,
                })
            }
        };

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());

        Ok(FetchResponse {
            url: url.to_string(),
            status: 200,
            headers,
            body: body.into_bytes(),
            elapsed: Duration::from_millis(1),
            retries: 0,
        })
    }
}

/// Renderer returning fixed HTML per URL.
#[derive(Default)]
pub struct MockRenderer {
    pages: HashMap<String, String>,
}

impl MockRenderer {
    /// Create an empty renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve rendered HTML for a URL.
    pub fn with_rendered(mut self, url: &str, html: &str) -> Self {
        self.pages
            .insert(MockFetcher::key(url), html.to_string());
        self
    }
}

#[async_trait]
impl Render for MockRenderer {
    async fn render(&self, url: &str) -> FetchResult<String> {
        self.pages
            .get(&MockFetcher::key(url))
            .cloned()
            .ok_or_else(|| FetchError::Network {
                url: url.to_string(),
                reason: "no rendered fixture".to_string(),
            })
    }
}

/// Build a small documentation page with a title, heading, and enough prose
/// to clear the extraction threshold.
pub fn doc_page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|l| format!("<a href=\"{l}\">{l}</a> "))
        .collect();
    format!(
        "<html lang=\"en\"><head><title>{title}</title></head><body><main>\
         <h1>{title}</h1><p>{}</p><p>{anchors}</p></main></body></html>",
        format!("Reference material for {title}. ").repeat(15)
    )
}
