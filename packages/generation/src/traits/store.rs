//! Artifact store trait.
//!
//! A small key-value surface keyed by job id with sub-keys for the status
//! document and the output blobs. Both backends (memory, object store) have
//! identical semantics.
//!
//! Consistency contract: writers must put artifact blobs *before* the status
//! document that advertises them, so a reader observing `completed` can
//! always read both blobs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::types::{ArtifactKind, Job};

/// Durable storage for job status and output artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write (or rewrite) the status document for a job.
    async fn put_status(&self, job: &Job) -> StoreResult<()>;

    /// Read the status document for a job.
    async fn get_status(&self, job_id: &str) -> StoreResult<Option<Job>>;

    /// Write an artifact blob.
    async fn put_artifact(
        &self,
        job_id: &str,
        kind: ArtifactKind,
        content: &str,
    ) -> StoreResult<()>;

    /// Read an artifact blob.
    async fn get_artifact(&self, job_id: &str, kind: ArtifactKind) -> StoreResult<Option<String>>;

    /// Delete a job's status and blobs.
    async fn delete_job(&self, job_id: &str) -> StoreResult<()>;

    /// List all stored job ids.
    async fn list_job_ids(&self) -> StoreResult<Vec<String>>;

    /// Delete jobs whose terminal timestamp is older than the cutoff.
    ///
    /// Returns the number of jobs removed. Jobs without a status document
    /// are left alone.
    async fn expire_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut removed = 0;
        for job_id in self.list_job_ids().await? {
            let Some(job) = self.get_status(&job_id).await? else {
                continue;
            };
            let stamp = job.completed_at.unwrap_or(job.created_at);
            if stamp < cutoff {
                self.delete_job(&job_id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
