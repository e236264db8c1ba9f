use crate::error::{PipelineError, Result};
use crate::utils::validation::is_pdf;
use async_recursion::async_recursion;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lists every PDF beneath `intake_root/subtree`, as paths relative to `intake_root`.
///
/// Entries are visited in name order so a job processes documents
/// deterministically. Symlinks are skipped. An empty result is not an error;
/// callers skip launching a job in that case.
pub async fn discover_documents(intake_root: &Path, subtree: &Path) -> Result<Vec<PathBuf>> {
    let source_dir = intake_root.join(subtree);

    let metadata = match tokio::fs::symlink_metadata(&source_dir).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::NotFound(format!(
                "Folder not found: {}",
                subtree.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let mut documents = Vec::new();
    if metadata.is_dir() {
        walk(&source_dir, subtree.to_path_buf(), &mut documents).await?;
    } else if metadata.is_file() && subtree.to_str().is_some_and(is_pdf) {
        documents.push(subtree.to_path_buf());
    }

    info!(
        "🔎 Discovered {} PDF(s) under '{}'",
        documents.len(),
        subtree.display()
    );
    Ok(documents)
}

#[async_recursion]
async fn walk(dir: &Path, relative: PathBuf, documents: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(entry);
    }
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let file_type = entry.file_type().await?;
        let name = entry.file_name();
        let rel_path = relative.join(&name);

        if file_type.is_dir() {
            walk(&entry.path(), rel_path, documents).await?;
        } else if file_type.is_file() && is_pdf(&name.to_string_lossy()) {
            debug!("Found PDF: {}", rel_path.display());
            documents.push(rel_path);
        }
    }

    Ok(())
}
