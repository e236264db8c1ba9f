//! Process-wide job progress records.
//!
//! Every job has a conversion record, created when the batch is discovered,
//! and an upload record, created when the upload stage starts. Both are keyed
//! by the job identifier returned to the client. Only the job's own
//! background task mutates its records; the map entry lock makes each counter
//! update atomic with respect to concurrent readers.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Processing,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConversionProgress {
    pub total: u64,
    pub converted: u64,
    pub failed: u64,
    pub status: ConversionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadProgress {
    pub total: u64,
    pub uploaded: u64,
    pub failed: u64,
    pub status: UploadStatus,
}

/// Result of processing one item of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

#[derive(Debug)]
struct Tracked<T> {
    progress: T,
    updated_at: Instant,
}

impl<T> Tracked<T> {
    fn new(progress: T) -> Self {
        Self {
            progress,
            updated_at: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Instant::now();
    }
}

#[derive(Debug, Default)]
pub struct JobStatusStore {
    conversions: DashMap<Uuid, Tracked<ConversionProgress>>,
    uploads: DashMap<Uuid, Tracked<UploadProgress>>,
}

impl JobStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly discovered batch of `total` documents.
    pub fn register_conversion(&self, job_id: Uuid, total: u64) {
        self.conversions.insert(
            job_id,
            Tracked::new(ConversionProgress {
                total,
                converted: 0,
                failed: 0,
                status: ConversionStatus::Processing,
            }),
        );
    }

    pub fn record_conversion(&self, job_id: Uuid, outcome: Outcome) {
        let Some(mut entry) = self.conversions.get_mut(&job_id) else {
            tracing::warn!("Conversion outcome for unknown job {}", job_id);
            return;
        };
        let progress = &mut entry.progress;
        if progress.converted + progress.failed >= progress.total {
            tracing::warn!(
                "Ignoring conversion outcome for job {}: all {} documents already counted",
                job_id,
                progress.total
            );
            return;
        }
        match outcome {
            Outcome::Succeeded => progress.converted += 1,
            Outcome::Failed => progress.failed += 1,
        }
        entry.touch();
    }

    /// Marks the conversion record completed. Documents never reported are
    /// counted as failed so that `converted + failed == total` holds.
    pub fn complete_conversion(&self, job_id: Uuid) {
        if let Some(mut entry) = self.conversions.get_mut(&job_id) {
            let progress = &mut entry.progress;
            let seen = progress.converted + progress.failed;
            if seen < progress.total {
                tracing::warn!(
                    "Job {} finished with {} unreported documents, counting them as failed",
                    job_id,
                    progress.total - seen
                );
                progress.failed += progress.total - seen;
            }
            progress.status = ConversionStatus::Completed;
            entry.touch();
        }
    }

    /// Creates (or resets) the upload record of a job.
    pub fn begin_upload(&self, job_id: Uuid) {
        self.uploads.insert(
            job_id,
            Tracked::new(UploadProgress {
                total: 0,
                uploaded: 0,
                failed: 0,
                status: UploadStatus::Processing,
            }),
        );
    }

    pub fn set_upload_total(&self, job_id: Uuid, total: u64) {
        if let Some(mut entry) = self.uploads.get_mut(&job_id) {
            entry.progress.total = total;
            entry.touch();
        }
    }

    pub fn record_upload(&self, job_id: Uuid, outcome: Outcome) {
        let Some(mut entry) = self.uploads.get_mut(&job_id) else {
            tracing::warn!("Upload outcome for unknown job {}", job_id);
            return;
        };
        match outcome {
            Outcome::Succeeded => entry.progress.uploaded += 1,
            Outcome::Failed => entry.progress.failed += 1,
        }
        entry.touch();
    }

    pub fn finish_upload(&self, job_id: Uuid, status: UploadStatus) {
        if let Some(mut entry) = self.uploads.get_mut(&job_id) {
            entry.progress.status = status;
            entry.touch();
        }
    }

    pub fn conversion(&self, job_id: Uuid) -> Option<ConversionProgress> {
        self.conversions.get(&job_id).map(|e| e.progress.clone())
    }

    pub fn upload(&self, job_id: Uuid) -> Option<UploadProgress> {
        self.uploads.get(&job_id).map(|e| e.progress.clone())
    }

    pub fn len(&self) -> usize {
        self.conversions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty()
    }

    /// Drops records in a terminal state untouched for longer than `retention`.
    /// A job's conversion record is only dropped together with a finished
    /// upload record, unless its task ended before the upload stage began.
    pub fn evict_finished(&self, retention: Duration) -> usize {
        let now = Instant::now();
        let expired = |updated_at: Instant| now.duration_since(updated_at) >= retention;

        let mut evicted = 0;
        self.uploads.retain(|job_id, entry| {
            let keep = entry.progress.status == UploadStatus::Processing
                || !expired(entry.updated_at);
            if !keep {
                self.conversions.remove(job_id);
                evicted += 1;
            }
            keep
        });

        // Orphans: completed conversions whose upload record never appeared
        self.conversions.retain(|job_id, entry| {
            let orphaned = entry.progress.status == ConversionStatus::Completed
                && expired(entry.updated_at)
                && !self.uploads.contains_key(job_id);
            if orphaned {
                evicted += 1;
            }
            !orphaned
        });
        evicted
    }
}
