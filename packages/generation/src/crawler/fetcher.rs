//! Polite HTTP fetcher.
//!
//! Wraps a shared `reqwest` client with per-host concurrency and delay
//! limits, bounded retries with jittered exponential backoff, timeouts, a
//! per-page size cap, and a content-type gate.

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use rand::Rng;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::traits::fetch::{Fetch, FetchResponse};

/// Connect timeout for every request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Total timeout for every request.
const TOTAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-page body size cap.
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Retries after the initial attempt, for 5xx and network errors.
const MAX_RETRIES: u32 = 2;

/// Backoff base and cap.
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Concurrent in-flight requests per host.
const PER_HOST_CONCURRENCY: usize = 4;

/// Content types allowed through to extraction.
const CRAWLABLE_TYPES: &[&str] = &["text/html", "application/xhtml+xml", "text/plain"];

type HostLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// One request attempt: a usable response, or an HTTP error status with
/// whatever Retry-After the server sent.
enum Attempt {
    Success(FetchResponse),
    HttpError {
        status: u16,
        retry_after: Option<Duration>,
    },
}

/// HTTP fetcher with politeness controls.
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
    delay_limiter: Option<HostLimiter>,
    host_slots: Mutex<HashMap<String, Arc<Semaphore>>>,
    max_body_bytes: usize,
}

impl HttpFetcher {
    /// Create a fetcher with the given user agent and minimum inter-request
    /// delay per host (the caller passes the max of the configured delay and
    /// any robots.txt `Crawl-delay`).
    pub fn new(user_agent: impl Into<String>, min_delay: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .gzip(true)
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                reason: format!("client build failed: {e}"),
            })?;

        let delay_limiter = if min_delay > Duration::ZERO {
            Quota::with_period(min_delay)
                .map(|quota| quota.allow_burst(NonZeroU32::new(1).unwrap()))
                .map(RateLimiter::keyed)
        } else {
            None
        };

        Ok(Self {
            client,
            user_agent: user_agent.into(),
            delay_limiter,
            host_slots: Mutex::new(HashMap::new()),
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    /// Override the per-page size cap (tests).
    #[cfg(test)]
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    async fn host_slot(&self, host: &str) -> Arc<Semaphore> {
        let mut slots = self.host_slots.lock().await;
        slots
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(PER_HOST_CONCURRENCY)))
            .clone()
    }

    /// One attempt, no retry logic.
    async fn attempt(&self, url: &str) -> FetchResult<Attempt> {
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout { url: url.to_string() }
                } else {
                    FetchError::Network {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        if let Some(length) = headers.get("content-length").and_then(|v| v.parse::<usize>().ok()) {
            if length > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    bytes: length,
                });
            }
        }

        if !(200..300).contains(&status) {
            return Ok(Attempt::HttpError {
                status,
                retry_after: Self::retry_after(&headers),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout { url: url.to_string() }
                } else {
                    FetchError::Network {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?
            .to_vec();

        if body.len() > self.max_body_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                bytes: body.len(),
            });
        }

        let fetched = FetchResponse {
            url: final_url,
            status,
            headers,
            body,
            elapsed: start.elapsed(),
            retries: 0,
        };

        if let Some(content_type) = fetched.content_type() {
            if !CRAWLABLE_TYPES.contains(&content_type) {
                return Err(FetchError::NonHtml {
                    url: url.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        Ok(Attempt::Success(fetched))
    }

    fn backoff(attempt: u32) -> Duration {
        let exp = BACKOFF_BASE * 2u32.pow(attempt);
        let capped = exp.min(BACKOFF_CAP);
        let jitter = rand::thread_rng().gen_range(0..500);
        capped + Duration::from_millis(jitter)
    }

    /// Retry-After seconds, bounded to keep jobs moving.
    fn retry_after(headers: &HashMap<String, String>) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs.min(30)))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchResponse> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl {
                url: url.to_string(),
            })?
            .to_string();

        let slot = self.host_slot(&host).await;
        let _permit = slot.acquire().await.map_err(|_| FetchError::Network {
            url: url.to_string(),
            reason: "fetcher shut down".to_string(),
        })?;

        let mut last_error: Option<FetchError> = None;

        for attempt in 0..=MAX_RETRIES {
            if let Some(limiter) = &self.delay_limiter {
                limiter.until_key_ready(&host).await;
            }

            match self.attempt(url).await {
                Ok(Attempt::Success(mut response)) => {
                    response.retries = attempt;
                    debug!(
                        url = %url,
                        status = response.status,
                        bytes = response.body.len(),
                        retries = response.retries,
                        elapsed_ms = response.elapsed.as_millis(),
                        "fetched"
                    );
                    return Ok(response);
                }
                Ok(Attempt::HttpError { status: 429, retry_after }) if attempt < MAX_RETRIES => {
                    // 429 is retried after whatever the server asked for.
                    let wait = retry_after.unwrap_or(BACKOFF_BASE);
                    warn!(url = %url, attempt, wait_ms = wait.as_millis(), "rate limited, backing off");
                    tokio::time::sleep(wait).await;
                    last_error = Some(FetchError::Http {
                        url: url.to_string(),
                        status: 429,
                    });
                }
                Ok(Attempt::HttpError { status, .. }) if status >= 500 && attempt < MAX_RETRIES => {
                    let wait = Self::backoff(attempt);
                    warn!(url = %url, attempt, status, wait_ms = wait.as_millis(), "retrying after server error");
                    tokio::time::sleep(wait).await;
                    last_error = Some(FetchError::Http {
                        url: url.to_string(),
                        status,
                    });
                }
                Ok(Attempt::HttpError { status, .. }) => {
                    return Err(FetchError::Http {
                        url: url.to_string(),
                        status,
                    });
                }
                Err(e @ (FetchError::Network { .. } | FetchError::Timeout { .. }))
                    if attempt < MAX_RETRIES =>
                {
                    let wait = Self::backoff(attempt);
                    warn!(url = %url, attempt, error = %e, wait_ms = wait.as_millis(), "retrying after error");
                    tokio::time::sleep(wait).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(FetchError::Network {
            url: url.to_string(),
            reason: "retries exhausted".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new("test-agent", Duration::ZERO).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body>hi</body></html>")
                    .insert_header("content-type", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let response = fetcher().fetch(&format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some("text/html"));
        assert!(!response.body.is_empty());
    }

    #[tokio::test]
    async fn test_non_html_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .insert_header("content-type", "application/json"),
            )
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/data.json", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NonHtml { .. }));
    }

    #[tokio::test]
    async fn test_retries_on_500_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html>ok</html>")
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let response = fetcher()
            .fetch(&format!("{}/flaky", server.uri()))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.retries, 2);
    }

    #[tokio::test]
    async fn test_no_retry_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Http { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_too_large_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("x".repeat(2048))
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher().with_max_body_bytes(1024);
        let err = fetcher
            .fetch(&format!("{}/big", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = fetcher().fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}
