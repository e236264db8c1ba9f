use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, error};

/// Renders every page of a PDF to a bitmap.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Returns the pages in document order.
    async fn render(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<DynamicImage>>;
}

/// Rasterizer backed by poppler's `pdftocairo`.
pub struct PopplerRasterizer {
    binary: String,
}

impl PopplerRasterizer {
    pub fn new() -> Self {
        Self {
            binary: "pdftocairo".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for PopplerRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Rasterizer for PopplerRasterizer {
    async fn render(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<DynamicImage>> {
        let path = pdf_path.to_path_buf();
        let binary = self.binary.clone();

        tokio::task::spawn_blocking(move || render_blocking(&binary, &path, dpi))
            .await
            .map_err(|e| PipelineError::Render {
                path: pdf_path.to_path_buf(),
                detail: format!("Render task panicked: {}", e),
            })?
    }
}

fn render_blocking(binary: &str, pdf_path: &Path, dpi: u32) -> Result<Vec<DynamicImage>> {
    let render_err = |detail: String| PipelineError::Render {
        path: pdf_path.to_path_buf(),
        detail,
    };

    let out_dir = tempfile::tempdir()?;
    let out_base = out_dir.path().join("page");

    // Lossless PNG intermediate, re-encoded to JPEG by the conversion stage
    let output = Command::new(binary)
        .arg("-png")
        .arg("-r")
        .arg(dpi.to_string())
        .arg(pdf_path.as_os_str())
        .arg(out_base.as_os_str())
        .output()
        .map_err(|e| render_err(format!("failed to run {}: {}", binary, e)))?;

    if !output.status.success() {
        let err_msg = String::from_utf8_lossy(&output.stderr);
        error!("{} failed: {}", binary, err_msg);
        return Err(render_err(format!("{} failed: {}", binary, err_msg.trim())));
    }

    let page_files = collect_page_files(out_dir.path())?;
    if page_files.is_empty() {
        return Err(render_err("no pages were rendered".to_string()));
    }

    let mut pages = Vec::with_capacity(page_files.len());
    for (number, file) in page_files {
        let img = image::open(&file)
            .map_err(|e| render_err(format!("failed to load page {}: {}", number, e)))?;
        debug!(
            "Rendered page {} → {}x{} px",
            number,
            img.width(),
            img.height()
        );
        pages.push(img);
    }

    Ok(pages)
}

/// Finds `page-<n>.png` outputs and orders them by page number. pdftocairo
/// zero-pads `n` to the width of the last page number.
fn collect_page_files(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let mut pages = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(number) = page_number(name) {
            pages.push((number, path));
        }
    }
    pages.sort_by_key(|(number, _)| *number);
    Ok(pages)
}

fn page_number(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix("page-")?
        .strip_suffix(".png")?
        .parse()
        .ok()
}
