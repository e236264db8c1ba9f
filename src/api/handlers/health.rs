use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};

use super::types::HealthResponse;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    // A missing object still proves the bucket answered
    let storage_status = match state.storage.file_exists("health-check").await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        storage: storage_status.to_string(),
        tracked_jobs: state.jobs.len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
