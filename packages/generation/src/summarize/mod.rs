//! Section summarization.
//!
//! The production summarizer wraps the Anthropic Messages API with
//! deterministic settings (temperature 0, fixed system prompt), a token
//! bucket for the shared backend, and bounded retries. Persistent failures
//! degrade to truncation so a job never stalls on the LLM.

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

use anthropic_client::{AnthropicClient, Message, MessagesRequest};

use crate::traits::summarize::{Summarize, SummaryOutcome};

/// Fixed system prompt; part of the determinism contract.
pub const SYSTEM_PROMPT: &str = "You are condensing documentation for an llms.txt artifact. \
Preserve headings and their hierarchy. Keep code blocks verbatim. Compress prose aggressively \
and omit marketing copy. Keep API and CLI signatures exactly as written. Output only Markdown \
with no preamble.";

/// Input larger than this is cut before prompting.
const MAX_PROMPT_CHARS: usize = 50_000;

/// Retries after the first attempt on transient failures.
const MAX_RETRIES: u32 = 2;

/// Marker appended when content is cut at the size target.
const TRUNCATION_MARKER: &str = "\n\n[... truncated to fit size budget ...]\n";

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Truncate markdown to a kilobyte budget at a line boundary.
///
/// The result, marker included, never exceeds `target_kb * 1024` bytes
/// (except for a degenerate budget smaller than the marker itself).
pub fn truncate_to_kb(text: &str, target_kb: usize) -> String {
    let budget = target_kb * 1024;
    if text.len() <= budget {
        return text.to_string();
    }

    let reserve = TRUNCATION_MARKER.len();
    let mut kept = 0;
    let mut out = String::new();
    for line in text.lines() {
        let line_size = line.len() + 1;
        if kept + line_size + reserve > budget {
            break;
        }
        out.push_str(line);
        out.push('\n');
        kept += line_size;
    }
    out.push_str(TRUNCATION_MARKER.trim_start_matches('\n'));
    out
}

/// Summarizer that only truncates.
///
/// Used in tests and when no LLM credentials are configured; fully
/// deterministic.
#[derive(Debug, Default)]
pub struct TruncatingSummarizer;

#[async_trait]
impl Summarize for TruncatingSummarizer {
    async fn summarize(&self, section: &str, target_kb: usize) -> SummaryOutcome {
        if section.len() <= target_kb * 1024 {
            SummaryOutcome {
                markdown: section.to_string(),
                summarized: true,
            }
        } else {
            SummaryOutcome {
                markdown: truncate_to_kb(section, target_kb),
                summarized: false,
            }
        }
    }
}

/// LLM-backed summarizer with deterministic settings.
pub struct LlmSummarizer {
    client: AnthropicClient,
    model: String,
    limiter: DirectRateLimiter,
}

impl LlmSummarizer {
    /// Create a summarizer for the given client and model.
    pub fn new(client: AnthropicClient, model: impl Into<String>) -> Self {
        Self::with_rate(client, model, 2)
    }

    /// Create with a custom sustained request rate (per second).
    pub fn with_rate(
        client: AnthropicClient,
        model: impl Into<String>,
        requests_per_second: u32,
    ) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second.max(1)).expect("non-zero rate"),
        );
        Self {
            client,
            model: model.into(),
            limiter: RateLimiter::direct(quota),
        }
    }

    fn request(&self, section: &str, target_kb: usize) -> MessagesRequest {
        // Rough 4 bytes/token budget, bounded to keep responses tractable.
        let max_tokens = ((target_kb * 256) as u32).clamp(256, 4096);

        let input: String = section.chars().take(MAX_PROMPT_CHARS).collect();
        let prompt = format!(
            "Condense the following documentation section to at most {target_kb} KB of Markdown.\n\n{input}"
        );

        MessagesRequest::new(&self.model, max_tokens)
            .system(SYSTEM_PROMPT)
            .temperature(0.0)
            .message(Message::user(prompt))
    }
}

#[async_trait]
impl Summarize for LlmSummarizer {
    async fn summarize(&self, section: &str, target_kb: usize) -> SummaryOutcome {
        if section.trim().is_empty() {
            return SummaryOutcome {
                markdown: String::new(),
                summarized: true,
            };
        }
        // Already under budget; no call needed and output stays deterministic.
        if section.len() <= target_kb * 1024 {
            return SummaryOutcome {
                markdown: section.to_string(),
                summarized: true,
            };
        }

        for attempt in 0..=MAX_RETRIES {
            self.limiter.until_ready().await;

            match self.client.messages(self.request(section, target_kb)).await {
                Ok(response) => {
                    debug!(target_kb, attempt, "section summarized");
                    // The budget is a hard bound even when the model overshoots.
                    return SummaryOutcome {
                        markdown: truncate_to_kb(response.content.trim(), target_kb),
                        summarized: true,
                    };
                }
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    let wait = e
                        .retry_after_secs()
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| Duration::from_secs(1 << attempt));
                    warn!(attempt, error = %e, wait_s = wait.as_secs(), "summarizer retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    warn!(error = %e, "summarizer failed, falling back to truncation");
                    break;
                }
            }
        }

        SummaryOutcome {
            markdown: truncate_to_kb(section, target_kb),
            summarized: false,
        }
    }
}
