//! Per-job generation inputs.

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Default user agent used when the caller does not configure one.
pub const DEFAULT_USER_AGENT: &str = "llmstxt-generator/0.1.0 (+https://llmstxt.dev)";

/// Inputs for one generation job.
///
/// Validated at the API boundary before a job is admitted; invalid inputs
/// never reach the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Root URL of the documentation site to crawl
    pub url: String,

    /// Maximum number of pages to crawl (1..=1000)
    pub max_pages: usize,

    /// Maximum crawl depth from the seed (1..=10)
    pub max_depth: usize,

    /// Output size budget for llm.txt, in kilobytes
    pub max_kb: usize,

    /// Also generate llms-full.txt
    pub full_version: bool,

    /// Respect robots.txt directives
    pub respect_robots: bool,

    /// Preferred language (e.g. "en"); non-matching locale pages are
    /// deprioritized, never hard-excluded
    pub language: Option<String>,

    /// User agent sent with every fetch
    pub user_agent: String,

    /// Minimum delay between requests to the same host, in seconds
    pub request_delay: f64,
}

impl Default for JobRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_pages: 100,
            max_depth: 3,
            max_kb: 500,
            full_version: false,
            respect_robots: true,
            language: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_delay: 1.0,
        }
    }
}

impl JobRequest {
    /// Create a request for a URL with defaults for everything else.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set maximum pages.
    pub fn with_max_pages(mut self, max: usize) -> Self {
        self.max_pages = max;
        self
    }

    /// Set maximum depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the output size budget in kilobytes.
    pub fn with_max_kb(mut self, kb: usize) -> Self {
        self.max_kb = kb;
        self
    }

    /// Request the full artifact as well.
    pub fn with_full_version(mut self) -> Self {
        self.full_version = true;
        self
    }

    /// Disable robots.txt respect.
    pub fn ignore_robots(mut self) -> Self {
        self.respect_robots = false;
        self
    }

    /// Set the preferred language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the per-host request delay in seconds.
    pub fn with_request_delay(mut self, secs: f64) -> Self {
        self.request_delay = secs;
        self
    }

    /// Validate ranges and the seed URL.
    pub fn validate(&self) -> Result<(), GenerationError> {
        let parsed = url::Url::parse(&self.url).map_err(|_| GenerationError::InvalidRequest {
            reason: format!("invalid URL: {}", self.url),
        })?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(GenerationError::InvalidRequest {
                reason: format!("unsupported URL scheme: {}", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none() {
            return Err(GenerationError::InvalidRequest {
                reason: "URL has no host".to_string(),
            });
        }
        if !(1..=1000).contains(&self.max_pages) {
            return Err(GenerationError::InvalidRequest {
                reason: format!("max_pages must be 1..=1000, got {}", self.max_pages),
            });
        }
        if !(1..=10).contains(&self.max_depth) {
            return Err(GenerationError::InvalidRequest {
                reason: format!("max_depth must be 1..=10, got {}", self.max_depth),
            });
        }
        if self.max_kb == 0 {
            return Err(GenerationError::InvalidRequest {
                reason: "max_kb must be positive".to_string(),
            });
        }
        if self.request_delay < 0.0 || !self.request_delay.is_finite() {
            return Err(GenerationError::InvalidRequest {
                reason: format!("request_delay must be non-negative, got {}", self.request_delay),
            });
        }

        Ok(())
    }
}
