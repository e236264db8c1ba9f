use crate::error::{PipelineError, Result};
use crate::services::job_store::{JobStatusStore, Outcome, UploadStatus};
use crate::services::storage::StorageService;
use crate::utils::validation::is_jpeg;
use async_recursion::async_recursion;
use chrono::NaiveDate;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const UNKNOWN_SEGMENT: &str = "unknown";

/// `{year}/{Mon}/{yymmdd}`, e.g. `2024/Mar/240315`.
pub fn date_prefix(date: NaiveDate) -> String {
    date.format("%Y/%b/%y%m%d").to_string()
}

pub fn storage_key(
    prefix: &str,
    date: NaiveDate,
    document_id: &str,
    document_name: &str,
    file_name: &str,
) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        prefix,
        date_prefix(date),
        document_id,
        document_name,
        file_name
    )
}

/// Derives the storage key of a staged image from its position under `staging_dir`.
/// The first two directories are the document id and name; a missing one
/// becomes `unknown`.
pub fn key_for_staged_image(
    prefix: &str,
    date: NaiveDate,
    staging_dir: &Path,
    image_path: &Path,
) -> String {
    let parent = image_path
        .parent()
        .and_then(|p| p.strip_prefix(staging_dir).ok())
        .unwrap_or_else(|| Path::new(""));

    let mut segments = parent.components().filter_map(|c| match c {
        Component::Normal(s) => Some(s.to_string_lossy().to_string()),
        _ => None,
    });
    let document_id = segments
        .next()
        .unwrap_or_else(|| UNKNOWN_SEGMENT.to_string());
    let document_name = segments
        .next()
        .unwrap_or_else(|| UNKNOWN_SEGMENT.to_string());
    let file_name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    storage_key(prefix, date, &document_id, &document_name, &file_name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub total: u64,
    pub uploaded: u64,
    pub failed: u64,
}

/// Pushes every staged JPEG to object storage.
pub struct UploadStage {
    storage: Arc<dyn StorageService>,
    store: Arc<JobStatusStore>,
    key_prefix: String,
    fixed_date: Option<NaiveDate>,
}

impl UploadStage {
    pub fn new(
        storage: Arc<dyn StorageService>,
        store: Arc<JobStatusStore>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            store,
            key_prefix: key_prefix.into(),
            fixed_date: None,
        }
    }

    /// Pins the date prefix instead of reading the wall clock at upload time.
    pub fn with_fixed_date(mut self, date: NaiveDate) -> Self {
        self.fixed_date = Some(date);
        self
    }

    /// Uploads everything under `staging_dir`, recording progress under `job_id`.
    ///
    /// Per-file failures are counted and skipped. An `Err` means the pass
    /// itself broke; the record is then marked failed and the caller must not
    /// treat the staging area as consumed.
    pub async fn run(&self, job_id: Uuid, staging_dir: &Path) -> Result<UploadReport> {
        self.store.begin_upload(job_id);

        match self.upload_all(job_id, staging_dir).await {
            Ok(report) => {
                self.store.finish_upload(job_id, UploadStatus::Completed);
                info!(
                    "☁️  Upload for job {} completed: {}/{} uploaded, {} failed",
                    job_id, report.uploaded, report.total, report.failed
                );
                Ok(report)
            }
            Err(e) => {
                error!("Error in upload process for job {}: {}", job_id, e);
                self.store.finish_upload(job_id, UploadStatus::Failed);
                Err(e)
            }
        }
    }

    async fn upload_all(&self, job_id: Uuid, staging_dir: &Path) -> Result<UploadReport> {
        // Read once per pass so one job's pages share a date prefix
        let date = self
            .fixed_date
            .unwrap_or_else(|| chrono::Local::now().date_naive());

        info!("Checking files in {}", staging_dir.display());
        let images = collect_staged_images(staging_dir).await.map_err(|e| {
            PipelineError::Orchestration(format!(
                "failed to scan {}: {}",
                staging_dir.display(),
                e
            ))
        })?;

        let tasks: Vec<(PathBuf, String)> = images
            .into_iter()
            .map(|path| {
                let key = key_for_staged_image(&self.key_prefix, date, staging_dir, &path);
                debug!("Will upload {} as: {}", path.display(), key);
                (path, key)
            })
            .collect();

        let total = tasks.len() as u64;
        info!("Found {} files to upload", total);
        self.store.set_upload_total(job_id, total);

        let mut report = UploadReport {
            total,
            uploaded: 0,
            failed: 0,
        };

        if total == 0 {
            warn!("No files found to upload for job {}", job_id);
            return Ok(report);
        }

        for (local_path, key) in tasks {
            match self.upload_one(&local_path, &key).await {
                Ok(()) => {
                    report.uploaded += 1;
                    self.store.record_upload(job_id, Outcome::Succeeded);
                    info!("Successfully uploaded to S3: {}", key);
                }
                Err(e) => {
                    report.failed += 1;
                    self.store.record_upload(job_id, Outcome::Failed);
                    error!("Error uploading {}: {}", local_path.display(), e);
                }
            }
        }

        Ok(report)
    }

    async fn upload_one(&self, local_path: &Path, key: &str) -> Result<()> {
        let data = tokio::fs::read(local_path).await?;
        debug!(
            "Uploading {} to bucket {}, key: {}",
            local_path.display(),
            self.storage.bucket(),
            key
        );
        self.storage
            .upload_file(key, data)
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))
    }
}

/// All `.jpg` files beneath `dir` in path order. A missing directory has no images.
async fn collect_staged_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    match tokio::fs::metadata(dir).await {
        Ok(m) if m.is_dir() => walk(dir, &mut images).await?,
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    images.sort();
    Ok(images)
}

#[async_recursion]
async fn walk(dir: &Path, images: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let file_type = entry.file_type().await?;
        let path = entry.path();
        if file_type.is_dir() {
            walk(&path, images).await?;
        } else if file_type.is_file() && is_jpeg(&entry.file_name().to_string_lossy()) {
            images.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn march_15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_date_prefix() {
        assert_eq!(date_prefix(march_15()), "2024/Mar/240315");
        assert_eq!(
            date_prefix(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap()),
            "2025/Dec/251201"
        );
    }

    #[test]
    fn test_storage_key_format() {
        assert_eq!(
            storage_key("test", march_15(), "abc", "report", "page_1.jpg"),
            "test/2024/Mar/240315/abc/report/page_1.jpg"
        );
    }

    #[test]
    fn test_key_from_staging_layout() {
        let staging = Path::new("/data/images");
        let image = staging.join("abc").join("report").join("page_1.jpg");
        assert_eq!(
            key_for_staged_image("test", march_15(), staging, &image),
            "test/2024/Mar/240315/abc/report/page_1.jpg"
        );
    }

    #[test]
    fn test_key_defaults_missing_segments_to_unknown() {
        let staging = Path::new("/data/images");
        let shallow = staging.join("abc").join("page_2.jpg");
        assert_eq!(
            key_for_staged_image("test", march_15(), staging, &shallow),
            "test/2024/Mar/240315/abc/unknown/page_2.jpg"
        );

        let root_level = staging.join("stray.jpg");
        assert_eq!(
            key_for_staged_image("test", march_15(), staging, &root_level),
            "test/2024/Mar/240315/unknown/unknown/stray.jpg"
        );
    }

    #[tokio::test]
    async fn test_collect_missing_dir_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let images = collect_staged_images(&root.path().join("absent"))
            .await
            .unwrap();
        assert!(images.is_empty());
    }
}
