//! Page types produced by the crawl and extraction stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Outcome of extracting one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// Clean markdown was produced
    Ok,
    /// Cleaned body was below the usefulness threshold
    Empty,
    /// Content came from the headless rendering fallback
    RenderedFallback,
    /// robots.txt disallowed the URL
    SkippedByRobots,
    /// The fetch itself failed
    FetchError,
}

/// A heading in the extracted outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading level, 1..=6
    pub level: u8,

    /// Heading text
    pub text: String,
}

/// A fenced code block preserved from the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Language hint from a `language-*` class, if any
    pub language: Option<String>,

    /// Verbatim code content
    pub code: String,
}

/// A crawled and extracted page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Canonical URL of the page
    pub url: String,

    /// Depth from the seed URL
    pub depth: usize,

    /// Page title (falls back to the URL when the page has none)
    pub title: String,

    /// Cleaned markdown body
    pub markdown: String,

    /// Heading outline in document order
    pub headings: Vec<Heading>,

    /// Code blocks in document order
    pub code_blocks: Vec<CodeBlock>,

    /// Extraction outcome
    pub status: ExtractionStatus,

    /// Priority score used for composition ordering
    pub score: f64,

    /// Declared document language (`<html lang>`), if any
    pub lang: Option<String>,

    /// Declared content type of the response
    pub content_type: Option<String>,

    /// When the page was fetched
    pub fetched_at: DateTime<Utc>,
}

impl Page {
    /// Create a page with the given URL and markdown body.
    pub fn new(url: impl Into<String>, depth: usize, markdown: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            title: url.clone(),
            url,
            depth,
            markdown: markdown.into(),
            headings: Vec::new(),
            code_blocks: Vec::new(),
            status: ExtractionStatus::Ok,
            score: 0.0,
            lang: None,
            content_type: None,
            fetched_at: Utc::now(),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the priority score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// SHA-256 hex digest of the markdown body.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.markdown.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Markdown body length in bytes.
    pub fn byte_len(&self) -> usize {
        self.markdown.len()
    }

    /// Top-level URL path segment this page groups under.
    ///
    /// `https://x.dev/guide/intro` -> `guide`; pages at the site root
    /// group under `overview`.
    pub fn section(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.find(|s| !s.is_empty()))
                    .map(|s| s.to_string())
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "overview".to_string())
    }

    /// Whether this page produced usable content.
    pub fn is_usable(&self) -> bool {
        matches!(
            self.status,
            ExtractionStatus::Ok | ExtractionStatus::RenderedFallback
        ) && !self.markdown.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_from_path() {
        let page = Page::new("https://example.com/guide/intro", 1, "body");
        assert_eq!(page.section(), "guide");

        let root = Page::new("https://example.com/", 0, "body");
        assert_eq!(root.section(), "overview");

        let bare = Page::new("https://example.com", 0, "body");
        assert_eq!(bare.section(), "overview");
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = Page::new("https://example.com/a", 0, "Hello");
        let b = Page::new("https://example.com/b", 1, "Hello");
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_usability() {
        let ok = Page::new("https://example.com/a", 0, "# Title\n\nbody");
        assert!(ok.is_usable());

        let mut empty = Page::new("https://example.com/b", 0, "");
        empty.status = ExtractionStatus::Empty;
        assert!(!empty.is_usable());

        let mut blocked = Page::new("https://example.com/c", 0, "body");
        blocked.status = ExtractionStatus::SkippedByRobots;
        assert!(!blocked.is_usable());
    }
}
