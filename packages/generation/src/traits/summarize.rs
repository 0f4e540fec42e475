//! Summarization trait.

use async_trait::async_trait;

/// Result of summarizing one section.
#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    /// Markdown output, bounded by the target size
    pub markdown: String,

    /// False when the summarizer fell back to truncating the input
    pub summarized: bool,
}

/// Condenses a page or logical section of markdown to a size target.
///
/// Implementations must be deterministic: identical input, model id, and
/// temperature 0 produce identical output. The composer relies on this for
/// reproducible artifacts.
#[async_trait]
pub trait Summarize: Send + Sync {
    /// Summarize `section` down to roughly `target_kb` kilobytes.
    ///
    /// Never fails: on persistent backend errors the input is truncated at
    /// the target instead and the outcome is marked unsummarized.
    async fn summarize(&self, section: &str, target_kb: usize) -> SummaryOutcome;
}

/// Blanket passthrough so `Arc<S>` is usable wherever `S: Summarize` is.
#[async_trait]
impl<S: Summarize + ?Sized> Summarize for std::sync::Arc<S> {
    async fn summarize(&self, section: &str, target_kb: usize) -> SummaryOutcome {
        (**self).summarize(section, target_kb).await
    }
}
