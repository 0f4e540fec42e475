//! Typed errors for the generation pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors that can occur while running a generation job.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Request validation failed; the job never starts
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// No page yielded usable content
    #[error("no usable content could be extracted")]
    NoUsableContent,

    /// robots.txt disallows the seed URL
    #[error("seed URL is disallowed by robots.txt")]
    BlockedByRobots,

    /// Composition failed
    #[error("composition failed: {0}")]
    Compose(String),

    /// Artifact store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Job exceeded its wall-clock ceiling
    #[error("job exceeded its time limit")]
    Timeout,

    /// Cancellation was requested and observed
    #[error("job was cancelled")]
    Cancelled,

    /// No job with the given id
    #[error("job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// The job already reached a terminal state
    #[error("job already terminal: {job_id}")]
    AlreadyTerminal { job_id: String },

    /// Requested artifact is not available yet
    #[error("artifact not ready")]
    NotReady,

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl GenerationError {
    /// Stable machine-readable error code for API responses and status files.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::NoUsableContent => "no_usable_content",
            Self::BlockedByRobots => "blocked_by_robots",
            Self::Compose(_) => "compose_error",
            Self::Store(_) => "store_error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::JobNotFound { .. } => "not_found",
            Self::AlreadyTerminal { .. } => "already_terminal",
            Self::NotReady => "not_ready",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Errors from fetching a single URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection failure, DNS error, or protocol error
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// Request exceeded its timeout
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// robots.txt disallows this URL
    #[error("blocked by robots.txt: {url}")]
    BlockedByRobots { url: String },

    /// Response content type is not crawlable
    #[error("non-HTML content ({content_type}) at {url}")]
    NonHtml { url: String, content_type: String },

    /// Response body exceeds the per-page size cap
    #[error("response too large ({bytes} bytes) at {url}")]
    TooLarge { url: String, bytes: usize },

    /// Non-success HTTP status after retries
    #[error("HTTP {status} at {url}")]
    Http { url: String, status: u16 },

    /// URL failed to parse
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    /// Short tag used in processing log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::BlockedByRobots { .. } => "blocked_by_robots",
            Self::NonHtml { .. } => "non_html",
            Self::TooLarge { .. } => "too_large",
            Self::Http { .. } => "http_error",
            Self::InvalidUrl { .. } => "invalid_url",
        }
    }
}

/// Errors from the artifact store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying object store failure
    #[error("object store error: {0}")]
    Backend(#[from] object_store::Error),

    /// Status serialization failed
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Stored bytes were not valid UTF-8
    #[error("stored artifact is not valid UTF-8: {key}")]
    InvalidUtf8 { key: String },
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
