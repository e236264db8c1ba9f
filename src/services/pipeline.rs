use crate::config::{PipelineConfig, WorkspaceScope};
use crate::error::Result;
use crate::services::cleanup::cleanup_job;
use crate::services::conversion::ConversionStage;
use crate::services::discovery::discover_documents;
use crate::services::job_store::JobStatusStore;
use crate::services::rasterizer::Rasterizer;
use crate::services::storage::StorageService;
use crate::services::upload::UploadStage;
use crate::services::workspace::{JobWorkspace, Workspace};
use crate::utils::validation::sanitize_relative_path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A validated batch, ready to be submitted.
#[derive(Debug)]
pub struct PreparedJob {
    pub source: PathBuf,
    pub documents: Vec<PathBuf>,
}

/// A submitted job. Dropping the handle detaches the job, it keeps running.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub total_documents: usize,
    pub handle: JoinHandle<()>,
}

#[derive(Debug)]
pub enum TriggerOutcome {
    Started(JobHandle),
    NothingToConvert,
}

/// Runs discovery → conversion → upload → cleanup, one detached task per job.
pub struct PipelineOrchestrator {
    workspace: Workspace,
    store: Arc<JobStatusStore>,
    conversion: Arc<ConversionStage>,
    upload: Arc<UploadStage>,
    permits: Option<Arc<Semaphore>>,
    active: Arc<AtomicUsize>,
}

/// Counts a job as in flight until its task ends, including by panic.
struct ActiveJob(Arc<AtomicUsize>);

impl Drop for ActiveJob {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PipelineOrchestrator {
    pub fn new(
        config: &PipelineConfig,
        store: Arc<JobStatusStore>,
        rasterizer: Arc<dyn Rasterizer>,
        storage: Arc<dyn StorageService>,
    ) -> Self {
        let conversion = ConversionStage::new(rasterizer, store.clone(), config.render_dpi);
        let upload = UploadStage::new(storage, store.clone(), config.key_prefix.clone());
        Self::from_parts(
            Workspace::from_config(config),
            store,
            conversion,
            upload,
            config.max_concurrent_jobs,
        )
    }

    pub fn from_parts(
        workspace: Workspace,
        store: Arc<JobStatusStore>,
        conversion: ConversionStage,
        upload: UploadStage,
        max_concurrent_jobs: usize,
    ) -> Self {
        if workspace.scope() == WorkspaceScope::Shared {
            warn!(
                "⚠️  Shared workspace scope: concurrent jobs may upload or delete each other's files"
            );
        }

        let permits = (max_concurrent_jobs > 0).then(|| Arc::new(Semaphore::new(max_concurrent_jobs)));

        Self {
            workspace,
            store,
            conversion: Arc::new(conversion),
            upload: Arc::new(upload),
            permits,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn store(&self) -> &Arc<JobStatusStore> {
        &self.store
    }

    /// Jobs submitted whose task has not finished yet, queued ones included.
    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Synchronous phase: validates `folder_path` and discovers its PDFs.
    /// Returns `None` when there is nothing to convert.
    pub async fn prepare(&self, folder_path: &str) -> Result<Option<PreparedJob>> {
        let source = sanitize_relative_path(folder_path)?;
        let documents = discover_documents(self.workspace.intake_root(), &source).await?;

        if documents.is_empty() {
            return Ok(None);
        }
        Ok(Some(PreparedJob { source, documents }))
    }

    /// Submission phase: allocates the job id, registers its progress record
    /// and spawns the detached stage chain.
    pub fn submit(&self, prepared: PreparedJob) -> JobHandle {
        let job_id = Uuid::new_v4();
        let total_documents = prepared.documents.len();
        self.store.register_conversion(job_id, total_documents as u64);

        let job = self.workspace.for_job(job_id, prepared.source);
        let others_in_flight = self.active.fetch_add(1, Ordering::SeqCst);
        let active = ActiveJob(self.active.clone());

        if others_in_flight > 0
            && job.scope == WorkspaceScope::PerJob
            && job.purges_whole_intake()
        {
            warn!(
                "⚠️  Job {} covers the whole intake root, its cleanup will also remove files of {} other in-flight job(s)",
                job_id, others_in_flight
            );
        }

        let conversion = self.conversion.clone();
        let upload = self.upload.clone();
        let permits = self.permits.clone();
        let documents = prepared.documents;

        let handle = tokio::spawn(async move {
            let _active = active;
            // Held for the whole job
            let _permit = match permits {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            run_job(&conversion, &upload, &job, &documents).await;
        });

        info!(
            "🚀 Job {} started with {} document(s)",
            job_id, total_documents
        );

        JobHandle {
            job_id,
            total_documents,
            handle,
        }
    }

    pub async fn trigger(&self, folder_path: &str) -> Result<TriggerOutcome> {
        match self.prepare(folder_path).await? {
            Some(prepared) => Ok(TriggerOutcome::Started(self.submit(prepared))),
            None => Ok(TriggerOutcome::NothingToConvert),
        }
    }
}

async fn run_job(
    conversion: &ConversionStage,
    upload: &UploadStage,
    job: &JobWorkspace,
    documents: &[PathBuf],
) {
    conversion.run(job, documents).await;

    match upload.run(job.job_id, &job.staging_dir).await {
        Ok(_) => cleanup_job(job).await,
        Err(e) => error!(
            "Job {} upload failed, leaving working files in place: {}",
            job.job_id, e
        ),
    }

    info!("🏁 Job {} finished", job.job_id);
}
