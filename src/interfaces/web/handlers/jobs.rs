use axum::{Json, extract::State};
use serde::Serialize;

use super::super::AppState;
use crate::core::manager::JobMetadata;

#[derive(Serialize)]
pub struct JobsSnapshot {
    running: Vec<JobMetadata>,
    failed: Vec<JobMetadata>,
}

pub async fn get_jobs(State(state): State<AppState>) -> Json<JobsSnapshot> {
    let reg = state.registry.lock().await;
    Json(JobsSnapshot {
        running: reg.running(),
        failed: reg.failed(),
    })
}

pub async fn get_succeeded_jobs(State(state): State<AppState>) -> Json<Vec<JobMetadata>> {
    Json(state.registry.lock().await.running())
}

pub async fn get_failed_jobs(State(state): State<AppState>) -> Json<Vec<JobMetadata>> {
    Json(state.registry.lock().await.failed())
}
