//! llms.txt generation service.

mod app;
mod config;
mod error;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use object_store::aws::AmazonS3Builder;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use anthropic_client::AnthropicClient;
use generation::{
    ArtifactStore, JobManager, LlmSummarizer, MemoryStore, ObjectBackedStore, Summarize,
    TruncatingSummarizer,
};

use app::{build_app, AppDefaults, AppState};
use config::{Config, StorageBackend};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let store = build_store(&config)?;
    let summarizer = build_summarizer(&config);

    let manager = Arc::new(JobManager::new(store.clone(), summarizer));

    if let Some(ttl_days) = config.job_ttl_days {
        spawn_expiry_sweeper(store, ttl_days);
    }

    let state = AppState {
        manager,
        defaults: Arc::new(AppDefaults {
            max_pages: config.max_pages,
            max_depth: config.max_depth,
            max_kb: config.max_kb,
            request_delay: config.request_delay,
            user_agent: config.user_agent.clone(),
        }),
    };

    let app = build_app(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(addr = %addr, "llms.txt generation service listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn build_store(config: &Config) -> Result<Arc<dyn ArtifactStore>> {
    match config.storage_backend {
        StorageBackend::Memory => {
            info!("using in-memory artifact store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::ObjectStore => {
            let bucket = config
                .object_store_bucket
                .as_deref()
                .context("OBJECT_STORE_BUCKET is required")?;

            let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
            if let Some(region) = &config.object_store_region {
                builder = builder.with_region(region);
            }
            let s3 = builder.build().context("failed to build S3 client")?;

            info!(bucket = %bucket, prefix = %config.object_store_prefix, "using object store backend");
            Ok(Arc::new(ObjectBackedStore::new(
                Arc::new(s3),
                config.object_store_prefix.clone(),
            )))
        }
    }
}

fn build_summarizer(config: &Config) -> Arc<dyn Summarize> {
    match &config.llm_api_key {
        Some(key) => {
            info!(model = %config.llm_model, "summarizer backend configured");
            Arc::new(LlmSummarizer::new(
                AnthropicClient::new(key.clone()),
                config.llm_model.clone(),
            ))
        }
        None => {
            warn!("LLM_API_KEY not set; falling back to truncating summarizer");
            Arc::new(TruncatingSummarizer)
        }
    }
}

/// Daily sweep deleting jobs older than the retention window.
fn spawn_expiry_sweeper(store: Arc<dyn ArtifactStore>, ttl_days: u32) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            interval.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(ttl_days));
            match store.expire_older_than(cutoff).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, ttl_days, "expired old jobs"),
                Err(e) => warn!(error = %e, "job expiry sweep failed"),
            }
        }
    });
}
