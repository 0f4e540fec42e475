//! Application configuration loaded from environment variables.

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Which artifact store backend to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    ObjectStore,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    // Per-job defaults, overridable per request
    pub max_pages: usize,
    pub max_depth: usize,
    pub max_kb: usize,
    pub request_delay: f64,
    pub user_agent: String,

    // Summarizer backend
    pub llm_api_key: Option<String>,
    pub llm_model: String,

    // Artifact store
    pub storage_backend: StorageBackend,
    pub object_store_bucket: Option<String>,
    pub object_store_prefix: String,
    pub object_store_region: Option<String>,
    pub job_ttl_days: Option<u32>,
}

impl Config {
    /// Load configuration from environment variables (and `.env` when
    /// present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let storage_backend = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("object_store") => StorageBackend::ObjectStore,
            Ok("memory") | Err(_) => StorageBackend::Memory,
            Ok(other) => anyhow::bail!("unknown STORAGE_BACKEND: {other}"),
        };

        let config = Self {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("API_PORT must be a valid port number")?,
            max_pages: parse_or("MAX_PAGES", 100)?,
            max_depth: parse_or("MAX_DEPTH", 3)?,
            max_kb: parse_or("MAX_KB", 500)?,
            request_delay: parse_or("REQUEST_DELAY", 1.0)?,
            user_agent: env::var("USER_AGENT")
                .unwrap_or_else(|_| generation::types::request::DEFAULT_USER_AGENT.to_string()),
            llm_api_key: env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "claude-3-5-haiku-latest".to_string()),
            storage_backend,
            object_store_bucket: env::var("OBJECT_STORE_BUCKET").ok(),
            object_store_prefix: env::var("OBJECT_STORE_PREFIX").unwrap_or_default(),
            object_store_region: env::var("OBJECT_STORE_REGION").ok(),
            job_ttl_days: env::var("JOB_TTL_DAYS").ok().and_then(|v| v.parse().ok()),
        };

        if !(1..=1000).contains(&config.max_pages) {
            anyhow::bail!("MAX_PAGES must be 1..=1000, got {}", config.max_pages);
        }
        if !(1..=10).contains(&config.max_depth) {
            anyhow::bail!("MAX_DEPTH must be 1..=10, got {}", config.max_depth);
        }
        if config.storage_backend == StorageBackend::ObjectStore
            && config.object_store_bucket.is_none()
        {
            anyhow::bail!("OBJECT_STORE_BUCKET is required with STORAGE_BACKEND=object_store");
        }

        Ok(config)
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{name} has an invalid value: {value}")),
        Err(_) => Ok(default),
    }
}
