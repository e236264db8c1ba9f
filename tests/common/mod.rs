#![allow(dead_code)]

use async_trait::async_trait;
use image::DynamicImage;
use pdf_image_pipeline::config::{PipelineConfig, WorkspaceScope};
use pdf_image_pipeline::error::PipelineError;
use pdf_image_pipeline::services::rasterizer::Rasterizer;
use pdf_image_pipeline::services::storage::StorageService;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pdf_image_pipeline=debug")
        .with_test_writer()
        .try_init();
}

pub struct MockStorageService {
    files: Mutex<HashMap<String, Vec<u8>>>,
    failing_patterns: Vec<String>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            failing_patterns: Vec::new(),
        }
    }

    /// Rejects every key containing one of `patterns`.
    pub fn failing_on(patterns: &[&str]) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            failing_patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn upload_file(&self, key: &str, data: Vec<u8>) -> anyhow::Result<()> {
        if self.failing_patterns.iter().any(|p| key.contains(p)) {
            return Err(anyhow::anyhow!("simulated S3 outage for {}", key));
        }
        self.files.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(key))
    }

    fn bucket(&self) -> &str {
        "mock-bucket"
    }
}

/// Renders `pages=<n>` documents to `n` blank pages (default 1); any file
/// whose name contains `corrupt` fails to render.
pub struct MockRasterizer {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockRasterizer {
    pub fn new() -> Self {
        Self::slow(Duration::ZERO)
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Highest number of renders that were running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Rasterizer for MockRasterizer {
    async fn render(
        &self,
        pdf_path: &Path,
        _dpi: u32,
    ) -> Result<Vec<DynamicImage>, PipelineError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let name = pdf_path.file_name().unwrap().to_string_lossy().to_string();
        if name.contains("corrupt") {
            return Err(PipelineError::Render {
                path: pdf_path.to_path_buf(),
                detail: "malformed xref table".to_string(),
            });
        }

        let content = tokio::fs::read_to_string(pdf_path).await?;
        let pages = content
            .trim()
            .strip_prefix("pages=")
            .and_then(|n| n.parse().ok())
            .unwrap_or(1usize);

        Ok((0..pages).map(|_| DynamicImage::new_rgba8(8, 8)).collect())
    }
}

pub struct TestRoots {
    pub intake: TempDir,
    pub staging: TempDir,
}

impl TestRoots {
    pub fn new() -> Self {
        Self {
            intake: TempDir::new().unwrap(),
            staging: TempDir::new().unwrap(),
        }
    }

    pub fn config(&self, scope: WorkspaceScope) -> PipelineConfig {
        let mut config = PipelineConfig::with_roots(self.intake.path(), self.staging.path());
        config.workspace_scope = scope;
        config
    }

    /// Writes a fake PDF with `pages` pages under the intake root.
    pub async fn add_pdf(&self, rel: &str, pages: usize) -> PathBuf {
        let path = self.intake.path().join(rel);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, format!("pages={}", pages))
            .await
            .unwrap();
        path
    }

    pub async fn add_file(&self, rel: &str) {
        let path = self.intake.path().join(rel);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"not a pdf").await.unwrap();
    }
}

pub async fn dir_is_empty(dir: &Path) -> bool {
    let mut rd = tokio::fs::read_dir(dir).await.unwrap();
    rd.next_entry().await.unwrap().is_none()
}
