use crate::config::WorkspaceScope;
use crate::services::workspace::JobWorkspace;
use std::path::Path;
use tracing::{error, info};

/// Best-effort purge of a finished job's working files. Errors are logged and
/// swallowed, cleanup never changes a job's status.
pub async fn cleanup_job(job: &JobWorkspace) {
    match job.scope {
        WorkspaceScope::Shared => {
            info!("Cleaning up uploads directory");
            purge_dir_contents(&job.intake_root).await;
            info!("Cleaning up images directory");
            purge_dir_contents(&job.staging_root).await;
        }
        WorkspaceScope::PerJob => {
            info!("Cleaning up intake for job {}", job.job_id);
            if job.source.as_os_str().is_empty() {
                purge_dir_contents(&job.intake_root).await;
            } else {
                remove_entry(&job.source_dir()).await;
                prune_empty_parents(&job.source_dir(), &job.intake_root).await;
            }
            info!("Cleaning up staging for job {}", job.job_id);
            remove_entry(&job.staging_dir).await;
        }
    }
    info!("🧹 Cleanup for job {} finished", job.job_id);
}

/// Removes every entry directly under `dir`, keeping `dir` itself.
/// Returns how many entries were removed.
pub async fn purge_dir_contents(dir: &Path) -> usize {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            error!("Error listing {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        match read_dir.next_entry().await {
            Ok(Some(entry)) => {
                if remove_entry(&entry.path()).await {
                    removed += 1;
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Error listing {}: {}", dir.display(), e);
                break;
            }
        }
    }
    removed
}

async fn remove_entry(path: &Path) -> bool {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return false,
        Err(e) => {
            error!("Error inspecting {}: {}", path.display(), e);
            return false;
        }
    };

    let res = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match res {
        Ok(()) => true,
        Err(e) => {
            error!("Error removing {}: {}", path.display(), e);
            false
        }
    }
}

/// Removes now-empty directories between `path` and `root`, exclusive of `root`.
async fn prune_empty_parents(path: &Path, root: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        // remove_dir only succeeds on empty directories
        if tokio::fs::remove_dir(dir).await.is_err() {
            break;
        }
        current = dir.parent();
    }
}
