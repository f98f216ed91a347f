use axum::{Router, http::Method, routing::get};
use tower_http::cors::{Any, CorsLayer};

use super::AppState;
use super::handlers::jobs;

fn build_read_only_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/jobs", get(jobs::get_jobs))
        .route("/api/v1/jobs/succeed", get(jobs::get_succeeded_jobs))
        .route("/api/v1/jobs/failed", get(jobs::get_failed_jobs))
        .layer(build_read_only_cors())
        .with_state(state)
}
