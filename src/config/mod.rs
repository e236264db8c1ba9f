use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// How working directories are shared between concurrently running jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceScope {
    /// Every job gets its own staging directory and only purges its own intake subtree.
    PerJob,
    /// One global staging area; upload rescans it and cleanup empties both roots.
    Shared,
}

impl FromStr for WorkspaceScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per_job" | "per-job" | "job" => Ok(Self::PerJob),
            "shared" | "global" => Ok(Self::Shared),
            other => Err(format!("unknown workspace scope '{}'", other)),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving uploaded trees (default: "./uploads")
    pub upload_dir: PathBuf,

    /// Directory holding rendered pages pending upload (default: "./images")
    pub images_dir: PathBuf,

    /// Destination bucket (default: "pdf-images")
    pub bucket: String,

    /// Static access key, falls back to the default AWS credential chain when unset
    pub aws_access_key: Option<String>,
    pub aws_secret_key: Option<String>,

    /// Region (default: "us-east-1")
    pub aws_region: String,

    /// Custom S3-compatible endpoint (MinIO etc.)
    pub s3_endpoint: Option<String>,

    /// First segment of every storage key (default: "test")
    pub key_prefix: String,

    /// Rasterization resolution (default: 300)
    pub render_dpi: u32,

    /// Maximum request body for the intake endpoint in bytes (default: 512 MB)
    pub max_upload_size: usize,

    pub workspace_scope: WorkspaceScope,

    /// Jobs allowed to run at once, 0 means unbounded (default: 0)
    pub max_concurrent_jobs: usize,

    /// How long finished job records stay pollable, 0 keeps them forever (default: 24h)
    pub job_retention_secs: u64,

    /// Period of the job record sweep (default: 300)
    pub reaper_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            images_dir: PathBuf::from("./images"),
            bucket: "pdf-images".to_string(),
            aws_access_key: None,
            aws_secret_key: None,
            aws_region: "us-east-1".to_string(),
            s3_endpoint: None,
            key_prefix: "test".to_string(),
            render_dpi: 300,
            max_upload_size: 512 * 1024 * 1024, // 512 MB
            workspace_scope: WorkspaceScope::PerJob,
            max_concurrent_jobs: 0,
            job_retention_secs: 24 * 60 * 60,
            reaper_interval_secs: 300,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_dir: env::var("Upload_folder_path")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            images_dir: env::var("Images_folder_path")
                .map(PathBuf::from)
                .unwrap_or(default.images_dir),

            bucket: env::var("S3_BUCKET_NAME").unwrap_or(default.bucket),

            aws_access_key: env::var("AWS_ACCESS_KEY").ok(),
            aws_secret_key: env::var("AWS_SECRET_KEY").ok(),

            aws_region: env::var("AWS_REGION").unwrap_or(default.aws_region),

            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),

            key_prefix: env::var("KEY_PREFIX").unwrap_or(default.key_prefix),

            render_dpi: env::var("RENDER_DPI")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.render_dpi),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            workspace_scope: env::var("WORKSPACE_SCOPE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.workspace_scope),

            max_concurrent_jobs: env::var("MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_concurrent_jobs),

            job_retention_secs: env::var("JOB_RETENTION_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.job_retention_secs),

            reaper_interval_secs: env::var("REAPER_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.reaper_interval_secs),
        }
    }

    /// Config rooted in the given directories, used by tests and embedders
    pub fn with_roots(upload_dir: impl Into<PathBuf>, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            images_dir: images_dir.into(),
            ..Self::default()
        }
    }
}
