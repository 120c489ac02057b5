use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use tokio::time::Instant;
use tracing::{debug, warn};

use bhasha_db::models::JobStatus;

use crate::jobs::store::{JobError, JobStore};

use super::PipelineError;

/// Per-job progress and cancellation bookkeeping shared by all task
/// handlers. Progress moves from 10 after claim to 100 after the last
/// stage, evenly spaced; a cancellation flag check runs between stages.
pub struct ProgressTracker {
    jobs: Arc<dyn JobStore>,
    job_id: ObjectId,
    total_stages: usize,
    completed_stages: usize,
    soft_deadline: Instant,
}

impl ProgressTracker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        job_id: ObjectId,
        total_stages: usize,
        soft_limit: Duration,
    ) -> Self {
        Self {
            jobs,
            job_id,
            total_stages: total_stages.max(1),
            completed_stages: 0,
            soft_deadline: Instant::now() + soft_limit,
        }
    }

    /// Marks work as underway (progress 10).
    pub async fn start(&self) {
        self.report(10.0).await;
    }

    /// Records one finished stage, then honors a pending cancellation.
    pub async fn stage_done(&mut self, stage: &'static str) -> Result<(), PipelineError> {
        self.completed_stages += 1;
        let progress =
            10.0 + 90.0 * self.completed_stages as f64 / self.total_stages as f64;
        debug!(job_id = %self.job_id, stage, progress, "Stage finished");
        self.report(progress).await;

        if Instant::now() > self.soft_deadline {
            warn!(job_id = %self.job_id, stage, "Soft time limit exceeded, checkpointing");
        }

        // Cooperative cancellation: never start the next stage for a
        // cancelled job, but never interrupt an in-flight stage.
        let job = self.jobs.get(self.job_id).await?;
        if job.status == JobStatus::Cancelled {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Progress reporting is best-effort; a regression is logged and
    /// dropped rather than failing the job.
    async fn report(&self, value: f64) {
        match self.jobs.set_progress(self.job_id, value).await {
            Ok(()) => {}
            Err(JobError::ProgressRegression { current, requested }) => {
                warn!(job_id = %self.job_id, current, requested, "Ignoring progress regression");
            }
            Err(e) => {
                warn!(job_id = %self.job_id, error = %e, "Progress update failed");
            }
        }
    }
}
