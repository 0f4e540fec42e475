//! Application state and router assembly.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use generation::JobManager;

use crate::routes::{
    cancel_generation, create_generation, download_generation, get_generation, health_handler,
};

/// Per-request defaults from configuration.
#[derive(Debug)]
pub struct AppDefaults {
    pub max_pages: usize,
    pub max_depth: usize,
    pub max_kb: usize,
    pub request_delay: f64,
    pub user_agent: String,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<JobManager>,
    pub defaults: Arc<AppDefaults>,
}

/// Build the router.
///
/// The generation routes sit behind a per-IP token bucket (burst 2, one
/// request per 30 s refill); health is unthrottled.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    let rate_limit_config = Arc::new(
        GovernorConfigBuilder::default()
            .period(Duration::from_secs(30))
            .burst_size(2)
            .use_headers()
            .finish()
            .expect("rate limiter configuration is valid"),
    );

    let generation_routes = Router::new()
        .route("/v1/generations", post(create_generation))
        .route("/v1/generations/:job_id", get(get_generation))
        .route("/v1/generations/:job_id", delete(cancel_generation))
        .route(
            "/v1/generations/:job_id/download/:file_type",
            get(download_generation),
        )
        .layer(GovernorLayer {
            config: rate_limit_config,
        });

    Router::new()
        .route("/health", get(health_handler))
        .merge(generation_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
