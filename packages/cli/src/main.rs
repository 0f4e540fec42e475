//! Local llms.txt generation.
//!
//! Runs the same pipeline as the service end-to-end and writes the
//! artifacts to the local filesystem.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use anthropic_client::AnthropicClient;
use generation::{
    compose, ArtifactKind, JobManager, JobRequest, JobStatus, MemoryStore, Summarize,
    LlmSummarizer, TruncatingSummarizer,
};

/// Exit codes for scripting.
const EXIT_VALIDATION: u8 = 2;
const EXIT_NO_CONTENT: u8 = 3;
const EXIT_CANCELLED: u8 = 4;
const EXIT_OTHER: u8 = 1;

/// Generate an llm.txt summary from a documentation site.
#[derive(Parser, Debug)]
#[command(name = "llmstxt", version, about)]
struct Args {
    /// URL of the documentation site to crawl
    #[arg(long)]
    url: String,

    /// Maximum pages to crawl
    #[arg(long, default_value_t = 100)]
    max_pages: usize,

    /// Maximum crawl depth
    #[arg(long, default_value_t = 3)]
    max_depth: usize,

    /// Size budget for llm.txt in kilobytes
    #[arg(long, default_value_t = 500)]
    max_kb: usize,

    /// Also generate llms-full.txt
    #[arg(long)]
    full: bool,

    /// Ignore robots.txt
    #[arg(long)]
    no_robots: bool,

    /// Output path for llm.txt
    #[arg(long, short, default_value = "llm.txt")]
    output: PathBuf,

    /// Delay between requests to the same host, in seconds
    #[arg(long, default_value_t = 1.0)]
    delay: f64,

    /// Verbose logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let _ = dotenvy::dotenv();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("generation failed: {e:#}");
            ExitCode::from(EXIT_OTHER)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut request = JobRequest::new(&args.url)
        .with_max_pages(args.max_pages)
        .with_max_depth(args.max_depth)
        .with_max_kb(args.max_kb)
        .with_request_delay(args.delay);
    if args.no_robots {
        request = request.ignore_robots();
    }
    if args.full {
        request = request.with_full_version();
    }

    let summarizer: Arc<dyn Summarize> = match std::env::var("LLM_API_KEY") {
        Ok(key) if !key.is_empty() => {
            let model = std::env::var("LLM_MODEL")
                .unwrap_or_else(|_| "claude-3-5-haiku-latest".to_string());
            Arc::new(LlmSummarizer::new(AnthropicClient::new(key), model))
        }
        _ => {
            eprintln!("note: LLM_API_KEY not set, content will be truncated instead of summarized");
            Arc::new(TruncatingSummarizer)
        }
    };

    let manager = JobManager::new(Arc::new(MemoryStore::new()), summarizer);

    println!("Starting generation for: {}", args.url);
    let job_id = match manager.create(request).await {
        Ok(job_id) => job_id,
        Err(e @ generation::GenerationError::InvalidRequest { .. }) => {
            eprintln!("invalid request: {e}");
            return Ok(ExitCode::from(EXIT_VALIDATION));
        }
        Err(e) => return Err(e.into()),
    };

    let job = manager.wait(&job_id).await?;

    match job.status {
        JobStatus::Completed => {}
        JobStatus::Cancelled => {
            eprintln!("generation cancelled");
            return Ok(ExitCode::from(EXIT_CANCELLED));
        }
        _ => {
            eprintln!("generation failed: {}", job.message);
            let code = match job.error_code.as_deref() {
                Some("no_usable_content") => EXIT_NO_CONTENT,
                _ => EXIT_OTHER,
            };
            return Ok(ExitCode::from(code));
        }
    }

    let content = manager.download(&job_id, ArtifactKind::LlmTxt).await?;
    std::fs::write(&args.output, &content)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!(
        "Wrote {} ({:.1} KB)",
        args.output.display(),
        content.len() as f64 / 1024.0
    );

    if args.full {
        let full = manager.download(&job_id, ArtifactKind::LlmsFullTxt).await?;
        let full_path = args.output.with_file_name("llms-full.txt");
        std::fs::write(&full_path, &full)
            .with_context(|| format!("failed to write {}", full_path.display()))?;
        println!(
            "Wrote {} ({:.1} KB)",
            full_path.display(),
            full.len() as f64 / 1024.0
        );
    }

    let report = compose::score(&content, args.max_kb);
    println!(
        "\nGeneration summary:\n  pages crawled: {}\n  artifact size: {:.1} KB\n  quality score: {}/100 (coverage {}/40, size {}/20, links {}/20, signal {}/20)",
        job.pages_crawled,
        content.len() as f64 / 1024.0,
        report.total,
        report.coverage,
        report.size,
        report.link_health,
        report.signal,
    );

    Ok(ExitCode::SUCCESS)
}
