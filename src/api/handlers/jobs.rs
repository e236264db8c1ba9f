use crate::api::error::AppError;
use crate::services::job_store::{ConversionProgress, UploadProgress};
use crate::services::pipeline::TriggerOutcome;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use super::types::{ConvertQuery, ConvertResponse};

fn parse_job_id(raw: &str) -> Result<Uuid, AppError> {
    // A malformed id can never name a job
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Task not found".to_string()))
}

#[utoipa::path(
    post,
    path = "/convert-pdfs/",
    params(ConvertQuery),
    responses(
        (status = 200, description = "Job started, or nothing to convert", body = ConvertResponse),
        (status = 400, description = "Invalid folder path"),
        (status = 404, description = "Folder not found")
    ),
    tag = "jobs"
)]
pub async fn convert_pdfs(
    State(state): State<crate::AppState>,
    Query(query): Query<ConvertQuery>,
) -> Result<Json<ConvertResponse>, AppError> {
    match state.pipeline.trigger(&query.folder_path).await? {
        TriggerOutcome::Started(job) => Ok(Json(ConvertResponse::Started {
            task_id: job.job_id,
            total_files: job.total_documents,
        })),
        TriggerOutcome::NothingToConvert => Ok(Json(ConvertResponse::NothingToConvert {
            message: "No PDF files found to convert".to_string(),
        })),
    }
}

#[utoipa::path(
    get,
    path = "/conversion-status/{task_id}",
    params(
        ("task_id" = String, Path, description = "Job identifier returned by /convert-pdfs/")
    ),
    responses(
        (status = 200, description = "Conversion progress", body = ConversionProgress),
        (status = 404, description = "Task not found")
    ),
    tag = "jobs"
)]
pub async fn conversion_status(
    State(state): State<crate::AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ConversionProgress>, AppError> {
    let job_id = parse_job_id(&task_id)?;
    state
        .jobs
        .conversion(job_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/s3-upload-status/{task_id}",
    params(
        ("task_id" = String, Path, description = "Job identifier returned by /convert-pdfs/")
    ),
    responses(
        (status = 200, description = "Upload progress", body = UploadProgress),
        (status = 404, description = "Task not found")
    ),
    tag = "jobs"
)]
pub async fn upload_status(
    State(state): State<crate::AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<UploadProgress>, AppError> {
    let job_id = parse_job_id(&task_id)?;
    state
        .jobs
        .upload(job_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}
