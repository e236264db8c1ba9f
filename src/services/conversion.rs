use crate::error::{PipelineError, Result};
use crate::services::job_store::{JobStatusStore, Outcome};
use crate::services::rasterizer::Rasterizer;
use crate::services::workspace::JobWorkspace;
use crate::utils::validation::document_stem;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Renders each discovered PDF into `{staging}/{document_id}/{document_name}/page_{n}.jpg`.
pub struct ConversionStage {
    rasterizer: Arc<dyn Rasterizer>,
    store: Arc<JobStatusStore>,
    dpi: u32,
}

impl ConversionStage {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, store: Arc<JobStatusStore>, dpi: u32) -> Self {
        Self {
            rasterizer,
            store,
            dpi,
        }
    }

    /// Converts `documents` in order. A failing document is counted and
    /// skipped; the record is marked completed once every document was tried.
    pub async fn run(&self, job: &JobWorkspace, documents: &[PathBuf]) {
        info!(
            "🖨️  Job {}: converting {} document(s)",
            job.job_id,
            documents.len()
        );

        for relative in documents {
            match self.convert_document(job, relative).await {
                Ok((output_dir, pages)) => {
                    self.store.record_conversion(job.job_id, Outcome::Succeeded);
                    info!(
                        "Successfully converted: {} ({} pages) to {}",
                        relative.display(),
                        pages,
                        output_dir.display()
                    );
                }
                Err(e) => {
                    self.store.record_conversion(job.job_id, Outcome::Failed);
                    error!("Error converting {}: {}", relative.display(), e);
                }
            }
        }

        self.store.complete_conversion(job.job_id);
        info!("Conversion for job {} completed", job.job_id);
    }

    async fn convert_document(
        &self,
        job: &JobWorkspace,
        relative: &Path,
    ) -> Result<(PathBuf, usize)> {
        let pdf_path = job.intake_root.join(relative);
        let document_id = Uuid::new_v4();
        let document_name = document_stem(relative);

        let output_dir = job
            .staging_dir
            .join(document_id.to_string())
            .join(&document_name);
        tokio::fs::create_dir_all(&output_dir).await?;
        info!("Converting PDF to: {}", output_dir.display());

        let result = self.render_into(&pdf_path, &output_dir).await;

        if result.is_err() {
            // Partial pages of a failed document must not reach the upload stage
            let document_dir = job.staging_dir.join(document_id.to_string());
            if let Err(e) = tokio::fs::remove_dir_all(&document_dir).await {
                error!(
                    "Failed to remove partial output {}: {}",
                    document_dir.display(),
                    e
                );
            }
        }

        result.map(|pages| (output_dir, pages))
    }

    async fn render_into(&self, pdf_path: &Path, output_dir: &Path) -> Result<usize> {
        let pages = self.rasterizer.render(pdf_path, self.dpi).await?;
        if pages.is_empty() {
            return Err(PipelineError::Render {
                path: pdf_path.to_path_buf(),
                detail: "document has no pages".to_string(),
            });
        }

        let count = pages.len();
        let output_dir = output_dir.to_path_buf();
        tokio::task::spawn_blocking(move || write_pages(pages, &output_dir))
            .await
            .map_err(|e| PipelineError::Orchestration(format!("Encode task panicked: {}", e)))??;

        Ok(count)
    }
}

fn write_pages(pages: Vec<DynamicImage>, output_dir: &Path) -> Result<()> {
    for (i, page) in pages.into_iter().enumerate() {
        let image_path = output_dir.join(format!("page_{}.jpg", i + 1));
        // JPEG has no alpha channel and no 16-bit depth
        let rgb = DynamicImage::ImageRgb8(page.to_rgb8());
        rgb.save_with_format(&image_path, ImageFormat::Jpeg)
            .map_err(|e| match e {
                image::ImageError::IoError(io) => PipelineError::Io(io),
                other => PipelineError::Render {
                    path: image_path.clone(),
                    detail: format!("Failed to encode JPEG: {}", other),
                },
            })?;
        tracing::debug!("Saved image to: {}", image_path.display());
    }
    Ok(())
}
