//! Core trait abstractions: fetching, rendering, summarization, storage.

pub mod fetch;
pub mod store;
pub mod summarize;

pub use fetch::{Fetch, FetchResponse, Render};
pub use store::ArtifactStore;
pub use summarize::{Summarize, SummaryOutcome};
