//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use generation::ArtifactStore;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    store: String,
}

/// Health check: verifies the artifact store answers.
pub async fn health_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let store_status = match state.manager.store().list_job_ids().await {
        Ok(_) => "ok",
        Err(_) => "error",
    };

    let status_code = if store_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if store_status == "ok" { "healthy" } else { "unhealthy" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: store_status.to_string(),
        }),
    )
}
