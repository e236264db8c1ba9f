use crate::api::error::AppError;
use axum::{
    Json,
    extract::{Multipart, State},
};

use super::types::UploadFilesResponse;

#[utoipa::path(
    post,
    path = "/upload-files/",
    request_body(content = Multipart, description = "Files with their relative paths as file names"),
    responses(
        (status = 200, description = "Files stored in the intake area", body = UploadFilesResponse),
        (status = 400, description = "Invalid file name"),
        (status = 413, description = "Request too large")
    ),
    tag = "intake"
)]
pub async fn upload_files(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadFilesResponse>, AppError> {
    let mut filenames = Vec::new();

    let result: Result<(), AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("length limit exceeded") {
                AppError::PayloadTooLarge(
                    "Request body exceeds the maximum allowed limit".to_string(),
                )
            } else {
                AppError::BadRequest(err_msg)
            }
        })? {
            let Some(original_filename) = field.file_name().map(|s| s.to_string()) else {
                // Plain form fields carry no files
                continue;
            };

            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;

            state.intake.store(&original_filename, &data).await?;
            filenames.push(original_filename);
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        // Drain the rest of the body so the client sees the error instead of a reset
        tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
        while let Ok(Some(mut field)) = multipart.next_field().await {
            while let Ok(Some(_)) = field.chunk().await {}
        }
        return Err(e);
    }

    tracing::info!("Received upload request with {} files", filenames.len());
    Ok(Json(UploadFilesResponse { filenames }))
}
