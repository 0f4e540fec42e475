//! Generation job endpoints.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use generation::{ArtifactKind, GenerationError, Job, JobRequest, JobStatus};

use crate::app::AppState;
use crate::error::ApiError;

/// Body of `POST /v1/generations`.
#[derive(Debug, Deserialize)]
pub struct CreateGenerationRequest {
    pub url: String,
    pub max_pages: Option<usize>,
    pub max_depth: Option<usize>,
    pub max_kb: Option<usize>,
    #[serde(default)]
    pub full_version: bool,
    pub respect_robots: Option<bool>,
    pub language: Option<String>,
}

/// Response of `POST /v1/generations`.
#[derive(Debug, Serialize)]
pub struct CreateGenerationResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

/// Create a new generation job.
pub async fn create_generation(
    State(state): State<AppState>,
    Json(body): Json<CreateGenerationRequest>,
) -> Result<(StatusCode, Json<CreateGenerationResponse>), ApiError> {
    let defaults = &state.defaults;

    let mut request = JobRequest::new(body.url)
        .with_max_pages(body.max_pages.unwrap_or(defaults.max_pages))
        .with_max_depth(body.max_depth.unwrap_or(defaults.max_depth))
        .with_max_kb(body.max_kb.unwrap_or(defaults.max_kb))
        .with_user_agent(defaults.user_agent.clone())
        .with_request_delay(defaults.request_delay);
    request.respect_robots = body.respect_robots.unwrap_or(true);
    request.full_version = body.full_version;
    request.language = body.language;

    let job_id = state.manager.create(request).await?;
    info!(job_id = %job_id, "generation job accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateGenerationResponse {
            job_id,
            status: JobStatus::Pending,
            message: "Generation job created successfully".to_string(),
        }),
    ))
}

/// Get job status.
pub async fn get_generation(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let job = state.manager.get(&job_id).await?;
    Ok(Json(job))
}

/// Request cancellation of a job.
pub async fn cancel_generation(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.manager.cancel(&job_id).await?;
    Ok(Json(json!({ "message": "Job cancellation requested" })))
}

/// Query parameters for downloads.
#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    /// `raw=1` returns the bytes as a text/plain attachment instead of the
    /// JSON envelope.
    #[serde(default)]
    pub raw: Option<u8>,
}

/// Download a finished artifact.
pub async fn download_generation(
    State(state): State<AppState>,
    Path((job_id, file_type)): Path<(String, String)>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    let kind = ArtifactKind::from_file_name(&file_type).ok_or(GenerationError::InvalidRequest {
        reason: format!("invalid file type: {file_type}"),
    })?;

    let content = state.manager.download(&job_id, kind).await?;

    if params.raw == Some(1) {
        let headers = [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", kind.file_name()),
            ),
        ];
        return Ok((headers, content).into_response());
    }

    Ok(Json(json!({ "content": content })).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppDefaults, AppState};
    use generation::{JobManager, MemoryStore, TruncatingSummarizer};
    use std::sync::Arc;

    fn state() -> AppState {
        AppState {
            manager: Arc::new(JobManager::new(
                Arc::new(MemoryStore::new()),
                Arc::new(TruncatingSummarizer),
            )),
            defaults: Arc::new(AppDefaults {
                max_pages: 100,
                max_depth: 3,
                max_kb: 500,
                request_delay: 0.0,
                user_agent: "test-agent".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_url() {
        let body = CreateGenerationRequest {
            url: "not a url".to_string(),
            max_pages: None,
            max_depth: None,
            max_kb: None,
            full_version: false,
            respect_robots: None,
            language: None,
        };

        let result = create_generation(State(state()), Json(body)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_accepts_and_returns_pending() {
        let body = CreateGenerationRequest {
            // Unroutable; the job itself will fail later, but creation is
            // accepted asynchronously.
            url: "https://site.invalid/docs".to_string(),
            max_pages: Some(5),
            max_depth: None,
            max_kb: Some(50),
            full_version: false,
            respect_robots: Some(true),
            language: None,
        };

        let (status, Json(response)) = create_generation(State(state()), Json(body))
            .await
            .expect("create should be accepted");
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(response.status, JobStatus::Pending);
        assert!(!response.job_id.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_job_is_not_found() {
        let result = get_generation(State(state()), Path("missing".to_string())).await;
        assert!(matches!(
            result,
            Err(ApiError(GenerationError::JobNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_download_rejects_unknown_file_type() {
        let result = download_generation(
            State(state()),
            Path(("job".to_string(), "other.txt".to_string())),
            Query(DownloadParams { raw: None }),
        )
        .await;
        assert!(matches!(
            result,
            Err(ApiError(GenerationError::InvalidRequest { .. }))
        ));
    }
}
