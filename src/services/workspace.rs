use crate::config::{PipelineConfig, WorkspaceScope};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The two local working areas: intake (uploaded trees) and staging (rendered pages).
#[derive(Debug, Clone)]
pub struct Workspace {
    intake_root: PathBuf,
    staging_root: PathBuf,
    scope: WorkspaceScope,
}

impl Workspace {
    pub fn new(intake_root: PathBuf, staging_root: PathBuf, scope: WorkspaceScope) -> Self {
        Self {
            intake_root,
            staging_root,
            scope,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.upload_dir.clone(),
            config.images_dir.clone(),
            config.workspace_scope,
        )
    }

    pub fn intake_root(&self) -> &Path {
        &self.intake_root
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn scope(&self) -> WorkspaceScope {
        self.scope
    }

    pub async fn ensure_roots(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.intake_root).await?;
        tokio::fs::create_dir_all(&self.staging_root).await?;
        Ok(())
    }

    /// Paths one job reads, writes and purges. `source` is relative to the intake root.
    pub fn for_job(&self, job_id: Uuid, source: PathBuf) -> JobWorkspace {
        let staging_dir = match self.scope {
            WorkspaceScope::PerJob => self.staging_root.join(job_id.to_string()),
            WorkspaceScope::Shared => self.staging_root.clone(),
        };

        JobWorkspace {
            job_id,
            intake_root: self.intake_root.clone(),
            staging_root: self.staging_root.clone(),
            staging_dir,
            source,
            scope: self.scope,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobWorkspace {
    pub job_id: Uuid,
    pub intake_root: PathBuf,
    pub staging_root: PathBuf,
    /// Directory the conversion stage writes into and the upload stage scans
    pub staging_dir: PathBuf,
    pub source: PathBuf,
    pub scope: WorkspaceScope,
}

impl JobWorkspace {
    pub fn source_dir(&self) -> PathBuf {
        self.intake_root.join(&self.source)
    }

    /// Whether cleanup will empty the whole intake root rather than this
    /// job's own subtree.
    pub fn purges_whole_intake(&self) -> bool {
        self.scope == WorkspaceScope::Shared || self.source.as_os_str().is_empty()
    }
}
