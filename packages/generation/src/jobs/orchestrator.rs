//! Single-job pipeline driver.
//!
//! Wires robots/sitemap discovery, the frontier, fetching, extraction,
//! summarization, and composition into one run, reporting progress to the
//! job handle and persisting status along the way. Cancellation and the
//! wall-clock ceiling are observed at checkpoints only.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::compose::Composer;
use crate::crawler::{
    discover_sitemap, fetch_robots, frontier::score_url, EnqueueOutcome, Frontier, HttpFetcher,
};
use crate::error::{FetchError, GenerationError};
use crate::extract;
use crate::jobs::cancel::CancelToken;
use crate::jobs::manager::{JobHandle, PipelineConfig};
use crate::traits::fetch::{Fetch, Render};
use crate::traits::store::ArtifactStore;
use crate::traits::summarize::Summarize;
use crate::types::{ArtifactKind, ExtractionStatus, Job, JobPhase, JobRequest, JobStatus, Page};

/// Drives one job through the pipeline.
pub(crate) struct Orchestrator {
    pub handle: Arc<JobHandle>,
    pub store: Arc<dyn ArtifactStore>,
    pub summarizer: Arc<dyn Summarize>,
    pub fetcher_override: Option<Arc<dyn Fetch>>,
    pub renderer: Option<Arc<dyn Render>>,
    pub config: PipelineConfig,
}

struct PageResult {
    page: Page,
    links: Vec<String>,
    retries: u32,
    error: Option<FetchError>,
}

impl Orchestrator {
    /// Run the job to a terminal state. Never panics the task.
    pub async fn run(self, request: JobRequest) {
        let cancel = CancelToken::new(self.handle.cancel_flag(), Some(self.config.job_timeout));

        match self.execute(&request, &cancel).await {
            Ok(()) => {}
            Err(e) => self.finalize_error(e).await,
        }
    }

    async fn execute(
        &self,
        request: &JobRequest,
        cancel: &CancelToken,
    ) -> Result<(), GenerationError> {
        let job_id = self.handle.job_id().to_string();

        self.update(|job| {
            job.set_status(JobStatus::Running, "Starting crawl");
            job.set_phase(JobPhase::Initializing);
        })
        .await;

        let seed = Url::parse(&request.url).map_err(|_| GenerationError::InvalidRequest {
            reason: format!("invalid URL: {}", request.url),
        })?;

        let discovery_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GenerationError::Internal(format!("http client: {e}")))?;

        // robots.txt is fetched regardless of the respect flag: sitemap
        // discovery reads its Sitemap entries either way.
        let robots = fetch_robots(&discovery_client, &seed, &request.user_agent).await;

        if request.respect_robots && !robots.is_allowed(&request.user_agent, seed.path()) {
            return Err(GenerationError::BlockedByRobots);
        }

        let delay = if request.respect_robots {
            robots
                .crawl_delay(&request.user_agent)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0)
                .max(request.request_delay)
        } else {
            request.request_delay
        };

        let fetcher: Arc<dyn Fetch> = match &self.fetcher_override {
            Some(fetcher) => fetcher.clone(),
            None => Arc::new(
                HttpFetcher::new(&request.user_agent, Duration::from_secs_f64(delay))
                    .map_err(|e| GenerationError::Internal(format!("fetcher init: {e}")))?,
            ),
        };

        let sitemap_entries =
            discover_sitemap(&discovery_client, &seed, &robots, &request.user_agent).await;

        let mut frontier = Frontier::new(
            seed.clone(),
            request.max_depth,
            request.language.clone(),
            request.user_agent.clone(),
            robots,
            request.respect_robots,
        );

        frontier.enqueue(seed.as_str(), 0);

        let mut not_crawled = 0usize;
        for entry in &sitemap_entries {
            frontier.mark_from_sitemap(&entry.url);
            if frontier.discovered() >= request.max_pages {
                not_crawled += 1;
                continue;
            }
            let depth = path_depth(&seed, &entry.url).min(request.max_depth);
            frontier.enqueue(&entry.url, depth);
        }

        self.update(|job| {
            job.pages_discovered = frontier.discovered();
            job.log(format!(
                "discovered {} URLs ({} from sitemap)",
                frontier.discovered(),
                sitemap_entries.len()
            ));
            job.set_phase(JobPhase::Crawling);
        })
        .await;

        let mut pages: Vec<Page> = Vec::new();
        let mut processed = 0usize;

        while !frontier.is_empty() && processed < request.max_pages {
            // Checkpoint between frontier pops.
            cancel.check()?;

            let batch_cap = self
                .config
                .concurrency
                .min(request.max_pages - processed)
                .max(1);
            let mut batch: Vec<(String, usize)> = Vec::new();
            while batch.len() < batch_cap {
                match frontier.pop() {
                    Some(entry) => batch.push(entry),
                    None => break,
                }
            }
            if batch.is_empty() {
                break;
            }

            let results = join_all(batch.iter().map(|(url, depth)| {
                self.process_page(&fetcher, url, *depth, &frontier, request)
            }))
            .await;

            for ((url, depth), result) in batch.iter().zip(results) {
                processed += 1;

                if let Some(error) = &result.error {
                    self.update(|job| {
                        job.pages_processed = processed;
                        job.current_page_url = Some(url.clone());
                        job.log(format!("{url}: {} ({error})", error.tag()));
                    })
                    .await;
                    pages.push(result.page);
                    continue;
                }

                // Enqueue outgoing links, respecting depth, the page cap,
                // and robots.
                if *depth < request.max_depth {
                    for link in &result.links {
                        if frontier.discovered() >= request.max_pages {
                            not_crawled += 1;
                            continue;
                        }
                        match frontier.enqueue(link, depth + 1) {
                            EnqueueOutcome::Disallowed => {
                                self.update(|job| {
                                    job.log(format!("{link}: skipped_by_robots"));
                                })
                                .await;
                            }
                            EnqueueOutcome::Queued
                            | EnqueueOutcome::AlreadySeen
                            | EnqueueOutcome::TooDeep
                            | EnqueueOutcome::OffSite
                            | EnqueueOutcome::Invalid => {}
                        }
                    }
                }

                let usable = result.page.is_usable();
                let status = result.page.status;
                let retries = result.retries;
                pages.push(result.page);

                let discovered = frontier.discovered();
                let crawled = pages.iter().filter(|p| p.is_usable()).count();
                self.update(|job| {
                    job.pages_discovered = discovered;
                    job.pages_processed = processed;
                    job.pages_crawled = crawled;
                    job.current_page_url = Some(url.clone());
                    if retries > 0 {
                        job.log(format!("{url}: fetched after {retries} retries"));
                    }
                    if usable {
                        job.log(format!("{url}: extracted"));
                    } else {
                        job.log(format!("{url}: {}", status_tag(status)));
                    }

                    let expected = discovered.min(request.max_pages).max(1);
                    let fraction = processed as f64 / expected as f64;
                    job.set_progress(
                        0.10 + 0.60 * fraction,
                        format!("Crawled {processed} of {expected} pages"),
                    );
                })
                .await;
            }
        }

        not_crawled += frontier.len();
        if not_crawled > 0 {
            self.update(|job| {
                job.log(format!("{not_crawled} discovered URLs not crawled (page cap)"));
            })
            .await;
        }

        // Extraction ran interleaved with the crawl; the phase still gets
        // its progress base so observers see the pipeline advance.
        self.update(|job| job.set_phase(JobPhase::Extracting)).await;

        let usable_count = pages.iter().filter(|p| p.is_usable()).count();
        if usable_count == 0 {
            return Err(GenerationError::NoUsableContent);
        }

        // Checkpoint before composition.
        cancel.check()?;
        self.update(|job| job.set_phase(JobPhase::Composing)).await;

        let created_at = { self.handle.state.lock().await.created_at };
        let composer = Composer::new(request.url.clone(), request.max_kb, created_at);

        let mut artifact = composer.compose(&pages, self.summarizer.as_ref(), cancel).await?;
        artifact.job_id = job_id.clone();

        let full_artifact = if request.full_version {
            let mut full = composer.compose_full(&pages)?;
            full.job_id = job_id.clone();
            Some(full)
        } else {
            None
        };

        // Checkpoint before publishing; artifacts are written first, status
        // last, so a completed status always has readable blobs behind it.
        cancel.check()?;

        self.store
            .put_artifact(&job_id, ArtifactKind::LlmTxt, &artifact.content)
            .await?;
        if let Some(full) = &full_artifact {
            self.store
                .put_artifact(&job_id, ArtifactKind::LlmsFullTxt, &full.content)
                .await?;
        }

        let size_kb = artifact.size_kb();
        let final_job = {
            let mut job = self.handle.state.lock().await;
            job.total_size_kb = Some(size_kb);
            job.llm_txt_url = Some(format!("/v1/generations/{job_id}/download/llm.txt"));
            if full_artifact.is_some() {
                job.llms_full_txt_url =
                    Some(format!("/v1/generations/{job_id}/download/llms-full.txt"));
            }
            job.current_page_url = None;
            job.set_progress(1.0, format!("Generated {size_kb:.1} KB of content"));
            job.set_status(
                JobStatus::Completed,
                format!("Generated {size_kb:.1} KB of content"),
            );
            job.clone()
        };
        self.store.put_status(&final_job).await?;

        info!(
            job_id = %job_id,
            pages = usable_count,
            size_kb = format!("{size_kb:.1}"),
            "job completed"
        );
        Ok(())
    }

    async fn process_page(
        &self,
        fetcher: &Arc<dyn Fetch>,
        url: &str,
        depth: usize,
        frontier: &Frontier,
        request: &JobRequest,
    ) -> PageResult {
        let response = match fetcher.fetch(url).await {
            Ok(response) => response,
            Err(error) => {
                let mut page = Page::new(url, depth, "");
                page.status = match error {
                    FetchError::BlockedByRobots { .. } => ExtractionStatus::SkippedByRobots,
                    _ => ExtractionStatus::FetchError,
                };
                return PageResult {
                    page,
                    links: Vec::new(),
                    retries: 0,
                    error: Some(error),
                };
            }
        };

        let body = extract::decode_body(&response.body, response.charset().as_deref());
        let content_type = response.content_type().map(|s| s.to_string());
        let retries = response.retries;

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => {
                let mut page = Page::new(url, depth, "");
                page.status = ExtractionStatus::FetchError;
                return PageResult {
                    page,
                    links: Vec::new(),
                    retries,
                    error: Some(FetchError::InvalidUrl { url: url.to_string() }),
                };
            }
        };

        let mut page = if content_type.as_deref() == Some("text/plain") {
            let markdown = extract::normalize(&body);
            let mut page = Page::new(url, depth, markdown);
            page.status = if page.markdown.chars().count() < extract::MIN_CONTENT_CHARS {
                ExtractionStatus::Empty
            } else {
                ExtractionStatus::Ok
            };
            page
        } else {
            let mut extracted = extract::extract(&body, &parsed);

            // Rendering fallback for script-driven pages, when a renderer
            // is installed.
            if extracted.status == ExtractionStatus::Empty && extract::needs_render(&body) {
                if let Some(renderer) = &self.renderer {
                    match tokio::time::timeout(self.config.render_timeout, renderer.render(url))
                        .await
                    {
                        Ok(Ok(rendered)) => {
                            let re_extracted = extract::extract(&rendered, &parsed);
                            if re_extracted.status == ExtractionStatus::Ok {
                                extracted = re_extracted;
                                extracted.status = ExtractionStatus::RenderedFallback;
                            }
                        }
                        Ok(Err(e)) => {
                            warn!(url = %url, error = %e, "render fallback failed");
                        }
                        Err(_) => {
                            warn!(url = %url, "render fallback timed out");
                        }
                    }
                }
            }

            let mut page = Page::new(url, depth, extracted.markdown);
            if let Some(title) = extracted.title {
                page.title = title;
            }
            page.headings = extracted.headings;
            page.code_blocks = extracted.code_blocks;
            page.lang = extracted.lang;
            page.status = extracted.status;
            page
        };

        page.content_type = content_type;
        page.score = self.score_page(&page, &parsed, depth, frontier, request);

        let links = if content_type_is_html(&page) {
            extract::extract_links(&body, &parsed)
        } else {
            Vec::new()
        };

        PageResult {
            page,
            links,
            retries,
            error: None,
        }
    }

    /// Final page priority: URL score, content-volume bonus, language match.
    fn score_page(
        &self,
        page: &Page,
        parsed: &Url,
        depth: usize,
        frontier: &Frontier,
        request: &JobRequest,
    ) -> f64 {
        let in_sitemap = frontier.is_from_sitemap(parsed.as_str());
        let mut score =
            score_url(parsed, depth, in_sitemap, request.language.as_deref()) as f64;

        score += (page.markdown.len() as f64 / 1000.0).min(5.0);

        if let (Some(preferred), Some(lang)) = (&request.language, &page.lang) {
            if lang.to_ascii_lowercase().starts_with(&preferred.to_ascii_lowercase()) {
                score += 2.0;
            } else {
                score -= 2.0;
            }
        }

        score
    }

    async fn update<F: FnOnce(&mut Job)>(&self, mutate: F) {
        let snapshot = {
            let mut job = self.handle.state.lock().await;
            mutate(&mut job);
            job.clone()
        };
        // Intermediate status writes are best effort; the final transition
        // write is the one that must not fail silently, and it goes through
        // `?` in execute().
        if let Err(e) = self.store.put_status(&snapshot).await {
            warn!(job_id = %snapshot.job_id, error = %e, "status write failed");
        }
    }

    async fn finalize_error(&self, error: GenerationError) {
        let (status, message) = match &error {
            GenerationError::Cancelled => {
                (JobStatus::Cancelled, "Job cancelled by user".to_string())
            }
            GenerationError::Timeout => (
                JobStatus::Failed,
                "Job exceeded its time limit".to_string(),
            ),
            other => (JobStatus::Failed, format!("Job failed: {other}")),
        };

        let snapshot = {
            let mut job = self.handle.state.lock().await;
            job.error_code = Some(error.code().to_string());
            job.current_page_url = None;
            job.set_status(status, message);
            job.clone()
        };

        info!(job_id = %snapshot.job_id, status = %snapshot.status, code = %error.code(), "job finished");

        if let Err(e) = self.store.put_status(&snapshot).await {
            warn!(job_id = %snapshot.job_id, error = %e, "final status write failed");
        }
    }
}

fn content_type_is_html(page: &Page) -> bool {
    matches!(
        page.content_type.as_deref(),
        None | Some("text/html") | Some("application/xhtml+xml")
    )
}

fn status_tag(status: ExtractionStatus) -> &'static str {
    match status {
        ExtractionStatus::Ok => "ok",
        ExtractionStatus::Empty => "empty",
        ExtractionStatus::RenderedFallback => "rendered_fallback",
        ExtractionStatus::SkippedByRobots => "skipped_by_robots",
        ExtractionStatus::FetchError => "fetch_error",
    }
}

/// Depth of a URL below the seed, measured in path segments.
fn path_depth(seed: &Url, url: &str) -> usize {
    let Ok(parsed) = Url::parse(url) else { return 1 };
    let count = |u: &Url| {
        u.path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).count())
            .unwrap_or(0)
    };
    count(&parsed).saturating_sub(count(seed)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_depth() {
        let seed = Url::parse("https://example.com/docs").unwrap();
        assert_eq!(path_depth(&seed, "https://example.com/docs/guide"), 1);
        assert_eq!(path_depth(&seed, "https://example.com/docs/guide/intro"), 2);
        assert_eq!(path_depth(&seed, "https://example.com/other"), 1);
        assert_eq!(path_depth(&seed, "https://example.com/docs/a/b/c"), 3);
        assert_eq!(path_depth(&seed, "::bad::"), 1);
    }
}
