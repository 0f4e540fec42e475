//! In-memory artifact store for tests and single-instance deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreResult;
use crate::traits::store::ArtifactStore;
use crate::types::{ArtifactKind, Job};

#[derive(Default)]
struct StoredJob {
    status: Option<String>,
    artifacts: HashMap<ArtifactKind, String>,
}

/// Process-wide in-memory store.
///
/// Data is lost on restart; suitable only for single-instance deployments
/// and tests. Status documents are stored as serialized JSON so both
/// backends exercise the same wire format.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<String, StoredJob>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.read().unwrap().len()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put_status(&self, job: &Job) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(job)?;
        self.jobs
            .write()
            .unwrap()
            .entry(job.job_id.clone())
            .or_default()
            .status = Some(json);
        Ok(())
    }

    async fn get_status(&self, job_id: &str) -> StoreResult<Option<Job>> {
        let jobs = self.jobs.read().unwrap();
        match jobs.get(job_id).and_then(|j| j.status.as_deref()) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn put_artifact(
        &self,
        job_id: &str,
        kind: ArtifactKind,
        content: &str,
    ) -> StoreResult<()> {
        self.jobs
            .write()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .artifacts
            .insert(kind, content.to_string());
        Ok(())
    }

    async fn get_artifact(&self, job_id: &str, kind: ArtifactKind) -> StoreResult<Option<String>> {
        Ok(self
            .jobs
            .read()
            .unwrap()
            .get(job_id)
            .and_then(|j| j.artifacts.get(&kind))
            .cloned())
    }

    async fn delete_job(&self, job_id: &str) -> StoreResult<()> {
        self.jobs.write().unwrap().remove(job_id);
        Ok(())
    }

    async fn list_job_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids: Vec<String> = self.jobs.read().unwrap().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
