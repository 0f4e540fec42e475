//! Object-store backed artifact store.
//!
//! Persists job state under `<prefix>/jobs/<job_id>/` in any backend the
//! `object_store` crate supports (S3, local filesystem). Status is written
//! as JSON on each material update; blobs are written once at completion,
//! always before the status that references them.

use async_trait::async_trait;
use futures::StreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::ArtifactStore;
use crate::types::{ArtifactKind, Job};

/// Artifact store writing to a shared object store.
pub struct ObjectBackedStore {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectBackedStore {
    /// Create a store over the given backend with a key prefix.
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_matches('/').to_string();
        Self { store, prefix }
    }

    fn job_root(&self, job_id: &str) -> String {
        if self.prefix.is_empty() {
            format!("jobs/{job_id}")
        } else {
            format!("{}/jobs/{job_id}", self.prefix)
        }
    }

    fn key(&self, job_id: &str, file: &str) -> Path {
        Path::from(format!("{}/{}", self.job_root(job_id), file))
    }

    async fn read_utf8(&self, path: Path) -> StoreResult<Option<String>> {
        match self.store.get(&path).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                String::from_utf8(bytes.to_vec())
                    .map(Some)
                    .map_err(|_| StoreError::InvalidUtf8 {
                        key: path.to_string(),
                    })
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ArtifactStore for ObjectBackedStore {
    async fn put_status(&self, job: &Job) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(job)?;
        let path = self.key(&job.job_id, "status.json");
        self.store
            .put(&path, PutPayload::from(json.into_bytes()))
            .await?;
        debug!(job_id = %job.job_id, "status written");
        Ok(())
    }

    async fn get_status(&self, job_id: &str) -> StoreResult<Option<Job>> {
        match self.read_utf8(self.key(job_id, "status.json")).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_artifact(
        &self,
        job_id: &str,
        kind: ArtifactKind,
        content: &str,
    ) -> StoreResult<()> {
        let path = self.key(job_id, kind.file_name());
        self.store
            .put(&path, PutPayload::from(content.as_bytes().to_vec()))
            .await?;
        debug!(job_id = %job_id, kind = %kind, bytes = content.len(), "artifact written");
        Ok(())
    }

    async fn get_artifact(&self, job_id: &str, kind: ArtifactKind) -> StoreResult<Option<String>> {
        self.read_utf8(self.key(job_id, kind.file_name())).await
    }

    async fn delete_job(&self, job_id: &str) -> StoreResult<()> {
        let prefix = Path::from(self.job_root(job_id));
        let mut objects = self.store.list(Some(&prefix));
        while let Some(meta) = objects.next().await {
            let meta = meta?;
            self.store.delete(&meta.location).await?;
        }
        Ok(())
    }

    async fn list_job_ids(&self) -> StoreResult<Vec<String>> {
        let root = if self.prefix.is_empty() {
            Path::from("jobs")
        } else {
            Path::from(format!("{}/jobs", self.prefix))
        };

        let listing = self.store.list_with_delimiter(Some(&root)).await?;
        let mut ids: Vec<String> = listing
            .common_prefixes
            .iter()
            .filter_map(|p| p.parts().last().map(|part| part.as_ref().to_string()))
            .collect();
        ids.sort();
        Ok(ids)
    }
}
