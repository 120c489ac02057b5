use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use tracing::{info, warn};

use bhasha_db::models::JobStatus;

use crate::jobs::store::{JobError, JobStore, TransitionUpdate};

use super::{PipelineError, PipelineOutcome};

/// Claims a job, runs `work` under the hard time limit, and records the
/// terminal outcome.
///
/// Delivery is at least once, so a redelivered envelope finds the job
/// already running or terminal and is dropped here. A cancelled job is
/// never transitioned further: cancellation already wrote the terminal
/// state.
pub async fn execute_job<F>(
    jobs: Arc<dyn JobStore>,
    job_id: ObjectId,
    hard_limit: Duration,
    work: F,
) where
    F: Future<Output = Result<PipelineOutcome, PipelineError>> + Send,
{
    match jobs.get(job_id).await {
        Ok(job) if job.status.is_terminal() => {
            info!(job_id = %job_id, status = ?job.status, "Dropping redelivery of finished job");
            return;
        }
        Ok(_) => {}
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "Cannot load job, dropping task");
            return;
        }
    }

    if let Err(e) = jobs
        .transition(job_id, JobStatus::Running, TransitionUpdate::default())
        .await
    {
        // Lost the claim race with another worker or a cancellation.
        warn!(job_id = %job_id, error = %e, "Could not claim job, dropping task");
        return;
    }

    match tokio::time::timeout(hard_limit, work).await {
        Err(_) => {
            fail(
                &jobs,
                job_id,
                format!("timeout: exceeded hard limit of {}s", hard_limit.as_secs()),
            )
            .await;
        }
        Ok(Ok(outcome)) => {
            let update = TransitionUpdate {
                result_path: outcome.result_path.map(|p| p.display().to_string()),
                result: Some(outcome.result),
                error_message: None,
            };
            match jobs.transition(job_id, JobStatus::Completed, update).await {
                Ok(_) => info!(job_id = %job_id, "Job completed"),
                Err(JobError::InvalidTransition { from, .. }) => {
                    warn!(job_id = %job_id, ?from, "Job left running state mid-run, keeping it");
                }
                Err(e) => warn!(job_id = %job_id, error = %e, "Could not record completion"),
            }
        }
        Ok(Err(PipelineError::Cancelled)) => {
            info!(job_id = %job_id, "Job cancelled between stages");
        }
        Ok(Err(e)) => fail(&jobs, job_id, e.to_string()).await,
    }
}

async fn fail(jobs: &Arc<dyn JobStore>, job_id: ObjectId, message: String) {
    warn!(job_id = %job_id, error = %message, "Job failed");
    let update = TransitionUpdate {
        error_message: Some(message),
        ..Default::default()
    };
    match jobs.transition(job_id, JobStatus::Failed, update).await {
        Ok(_) => {}
        Err(JobError::InvalidTransition { from, .. }) => {
            warn!(job_id = %job_id, ?from, "Job left running state mid-run, keeping it");
        }
        Err(e) => warn!(job_id = %job_id, error = %e, "Could not record failure"),
    }
}
