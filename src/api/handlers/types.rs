use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UploadFilesResponse {
    pub filenames: Vec<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConvertQuery {
    /// Folder under the intake root to scan, empty for all uploads
    #[serde(default)]
    pub folder_path: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
#[serde(untagged)]
pub enum ConvertResponse {
    Started { task_id: Uuid, total_files: usize },
    NothingToConvert { message: String },
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub tracked_jobs: usize,
    pub version: String,
}
