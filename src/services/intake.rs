use crate::error::{PipelineError, Result};
use crate::utils::validation::sanitize_relative_path;
use std::path::{Path, PathBuf};
use tracing::info;

/// Materializes uploaded files under the intake root, preserving their relative layout.
#[derive(Debug, Clone)]
pub struct IntakeService {
    root: PathBuf,
}

impl IntakeService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `data` at `relative_name` under the root and returns the normalized
    /// relative path. Names escaping the root are rejected.
    pub async fn store(&self, relative_name: &str, data: &[u8]) -> Result<PathBuf> {
        let relative = sanitize_relative_path(relative_name)?;
        if relative.as_os_str().is_empty() {
            return Err(PipelineError::InvalidPath(format!(
                "Empty file name: '{}'",
                relative_name
            )));
        }

        let file_path = self.root.join(&relative);
        if let Some(directory) = file_path.parent() {
            tokio::fs::create_dir_all(directory).await?;
        }
        tokio::fs::write(&file_path, data).await?;

        info!("Successfully saved: {}", relative.display());
        Ok(relative)
    }
}
