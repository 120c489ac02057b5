mod orchestrator;
mod progress;
mod runner;

pub use orchestrator::{PipelineEngines, PipelineOrchestrator};
pub use progress::ProgressTracker;
pub use runner::execute_job;

use std::path::PathBuf;

use thiserror::Error;

use crate::jobs::store::JobError;
use crate::engines::StageError;

/// Failure modes of a pipeline run. Stage failures render as
/// `"<stage>: <cause>"`, the exact string written to the job row.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage}: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: StageError,
    },
    /// The job was cancelled between stages; the worker stops without a
    /// further transition.
    #[error("cancelled between stages")]
    Cancelled,
    #[error(transparent)]
    Job(#[from] JobError),
}

pub(crate) fn stage_err(stage: &'static str) -> impl Fn(StageError) -> PipelineError {
    move |source| PipelineError::Stage { stage, source }
}

/// What a finished task hands back to the job row.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub result_path: Option<PathBuf>,
    pub result: serde_json::Value,
}
