use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the conversion pipeline.
///
/// `Render` and `Storage` are per-item failures: stages record them as
/// counters and move on. `Orchestration` is the only variant that marks a job
/// record terminally failed.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to render '{path}': {detail}")]
    Render { path: PathBuf, detail: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Orchestration error: {0}")]
    Orchestration(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
