//! Job lifecycle management.
//!
//! Owns the live job registry, validates requests, spawns one orchestrator
//! task per job, and serializes all mutation of a job's state behind its
//! handle. Terminal jobs remain readable through the artifact store after
//! the process that ran them is gone.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::{GenerationError, Result};
use crate::jobs::orchestrator::Orchestrator;
use crate::traits::fetch::{Fetch, Render};
use crate::traits::store::ArtifactStore;
use crate::traits::summarize::Summarize;
use crate::types::{ArtifactKind, Job, JobRequest, JobStatus};

/// Orchestration limits shared by all jobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Concurrent fetches within one job
    pub concurrency: usize,

    /// Per-job wall-clock ceiling
    pub job_timeout: Duration,

    /// Wall-clock limit for one rendering fallback
    pub render_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 16,
            job_timeout: Duration::from_secs(180),
            render_timeout: Duration::from_secs(20),
        }
    }
}

/// Live state of one job: mutable snapshot plus the cancellation flag.
pub struct JobHandle {
    job_id: String,
    cancel_flag: Arc<AtomicBool>,
    pub(crate) state: Mutex<Job>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl JobHandle {
    fn new(job: Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            cancel_flag: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(job),
            task: std::sync::Mutex::new(None),
        }
    }

    /// The job id.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Shared cancellation flag for the orchestrator's token.
    pub(crate) fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }
}

/// Manages generation jobs and their lifecycle.
pub struct JobManager {
    store: Arc<dyn ArtifactStore>,
    summarizer: Arc<dyn Summarize>,
    renderer: Option<Arc<dyn Render>>,
    fetcher_override: Option<Arc<dyn Fetch>>,
    config: PipelineConfig,
    jobs: RwLock<HashMap<String, Arc<JobHandle>>>,
}

impl JobManager {
    /// Create a manager over a store and summarizer.
    pub fn new(store: Arc<dyn ArtifactStore>, summarizer: Arc<dyn Summarize>) -> Self {
        Self {
            store,
            summarizer,
            renderer: None,
            fetcher_override: None,
            config: PipelineConfig::default(),
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Set pipeline limits.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Install a rendering fallback.
    pub fn with_renderer(mut self, renderer: Arc<dyn Render>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Replace the HTTP fetcher (tests).
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.fetcher_override = Some(fetcher);
        self
    }

    /// The artifact store backing this manager.
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Validate inputs, record a pending job, and schedule orchestration.
    pub async fn create(&self, request: JobRequest) -> Result<String> {
        request.validate()?;

        let job_id = uuid::Uuid::new_v4().to_string();
        let job = Job::new(&job_id, request.clone());

        self.store.put_status(&job).await?;

        let handle = Arc::new(JobHandle::new(job));
        self.jobs
            .write()
            .unwrap()
            .insert(job_id.clone(), handle.clone());

        let orchestrator = Orchestrator {
            handle: handle.clone(),
            store: self.store.clone(),
            summarizer: self.summarizer.clone(),
            fetcher_override: self.fetcher_override.clone(),
            renderer: self.renderer.clone(),
            config: self.config.clone(),
        };
        let task = tokio::spawn(orchestrator.run(request));
        *handle.task.lock().unwrap() = Some(task);

        info!(job_id = %job_id, "job created");
        Ok(job_id)
    }

    fn handle(&self, job_id: &str) -> Option<Arc<JobHandle>> {
        self.jobs.read().unwrap().get(job_id).cloned()
    }

    /// Current job state, from memory for live jobs or the store otherwise.
    pub async fn get(&self, job_id: &str) -> Result<Job> {
        if let Some(handle) = self.handle(job_id) {
            return Ok(handle.state.lock().await.clone());
        }
        match self.store.get_status(job_id).await? {
            Some(job) => Ok(job),
            None => Err(GenerationError::JobNotFound {
                job_id: job_id.to_string(),
            }),
        }
    }

    /// Request cancellation.
    ///
    /// Terminal jobs are not reopened; the orchestrator observes the flag
    /// at its next checkpoint.
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        if let Some(handle) = self.handle(job_id) {
            let job = handle.state.lock().await;
            if job.status.is_terminal() {
                return Err(GenerationError::AlreadyTerminal {
                    job_id: job_id.to_string(),
                });
            }
            drop(job);
            handle.cancel_flag.store(true, std::sync::atomic::Ordering::SeqCst);
            info!(job_id = %job_id, "cancellation requested");
            return Ok(());
        }

        // No live handle: the job belongs to a previous process. A
        // non-terminal status there is an orphan; mark it cancelled.
        match self.store.get_status(job_id).await? {
            Some(job) if job.status.is_terminal() => Err(GenerationError::AlreadyTerminal {
                job_id: job_id.to_string(),
            }),
            Some(mut job) => {
                job.set_status(JobStatus::Cancelled, "Job cancelled by user");
                self.store.put_status(&job).await?;
                Ok(())
            }
            None => Err(GenerationError::JobNotFound {
                job_id: job_id.to_string(),
            }),
        }
    }

    /// Read a finished artifact.
    pub async fn download(&self, job_id: &str, kind: ArtifactKind) -> Result<String> {
        let job = self.get(job_id).await?;
        if job.status != JobStatus::Completed {
            return Err(GenerationError::NotReady);
        }
        match self.store.get_artifact(job_id, kind).await? {
            Some(content) => Ok(content),
            None => Err(GenerationError::NotReady),
        }
    }

    /// Wait for a job's orchestrator task to finish and return the final
    /// state. Used by the CLI; the HTTP surface polls instead.
    pub async fn wait(&self, job_id: &str) -> Result<Job> {
        let task = self
            .handle(job_id)
            .and_then(|handle| handle.task.lock().unwrap().take());
        if let Some(task) = task {
            let _ = task.await;
        }
        self.get(job_id).await
    }
}
