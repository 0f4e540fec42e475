//! llms.txt Generation Pipeline
//!
//! Converts a documentation website into a compact, LLM-optimized text
//! artifact (`llm.txt`) and an optional expanded variant (`llms-full.txt`).
//! Given a root URL the pipeline discovers pages through robots.txt and
//! sitemaps, fetches them politely, extracts clean markdown, summarizes to a
//! size budget, and publishes the artifacts through an asynchronous job API.
//!
//! # Usage
//!
//! ```rust,ignore
//! use generation::{JobManager, JobRequest, MemoryStore, TruncatingSummarizer};
//! use std::sync::Arc;
//!
//! let manager = JobManager::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(TruncatingSummarizer),
//! );
//!
//! let job_id = manager
//!     .create(JobRequest::new("https://docs.example.com").with_max_kb(100))
//!     .await?;
//! let job = manager.wait(&job_id).await?;
//! ```
//!
//! # Modules
//!
//! - [`crawler`] - robots.txt, sitemaps, frontier, and the polite fetcher
//! - [`extract`] - HTML to cleaned markdown
//! - [`summarize`] - LLM-backed section summarization
//! - [`compose`] - prioritized, size-budgeted artifact assembly and scoring
//! - [`jobs`] - job manager, orchestrator, cancellation
//! - [`stores`] - artifact store backends (memory, object store)
//! - [`traits`] - seams for fetching, rendering, summarization, storage
//! - [`testing`] - mock implementations for tests

pub mod compose;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod stores;
pub mod summarize;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export the surface most callers need.
pub use compose::{score, Composer, QualityReport};
pub use crawler::{canonicalize, Frontier, HttpFetcher, RobotsTxt};
pub use error::{FetchError, GenerationError, Result, StoreError};
pub use jobs::{CancelToken, JobManager, PipelineConfig};
pub use stores::{MemoryStore, ObjectBackedStore};
pub use summarize::{LlmSummarizer, TruncatingSummarizer};
pub use traits::{ArtifactStore, Fetch, FetchResponse, Render, Summarize, SummaryOutcome};
pub use types::{
    Artifact, ArtifactKind, ExtractionStatus, Job, JobPhase, JobRequest, JobStatus, Page,
};
