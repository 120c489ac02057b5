use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// A unit of background work and its lifecycle state.
///
/// The row is the single source of truth shared between the submitting
/// process and the executing worker: single-writer while `running`
/// (the owning worker), multi-reader at all times (pollers, cancellation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub job_type: JobType,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub progress: f64,
    /// Broker delivery handle, bound exactly once at submission.
    pub external_task_id: Option<String>,
    pub result_path: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime>,
    pub completed_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Translate,
    Stt,
    Tts,
    Localize,
    Evaluate,
    Retrain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states never re-transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid edges of the job state machine:
    /// `queued -> running -> {completed, failed}`, with cancellation
    /// accepted from `queued` or `running`.
    pub fn can_transition(self, to: JobStatus) -> bool {
        matches!(
            (self, to),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Cancelled)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
        )
    }
}

impl Job {
    pub const COLLECTION: &'static str = "jobs";

    pub fn new(job_type: JobType) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            job_type,
            status: JobStatus::Queued,
            progress: 0.0,
            external_task_id: None,
            result_path: None,
            result: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_edges_are_valid() {
        assert!(JobStatus::Queued.can_transition(JobStatus::Running));
        assert!(JobStatus::Running.can_transition(JobStatus::Completed));
        assert!(JobStatus::Running.can_transition(JobStatus::Failed));
    }

    #[test]
    fn cancellation_accepted_while_queued_or_running() {
        assert!(JobStatus::Queued.can_transition(JobStatus::Cancelled));
        assert!(JobStatus::Running.can_transition(JobStatus::Cancelled));
    }

    #[test]
    fn no_edge_leaves_a_terminal_state() {
        for terminal in [
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                JobStatus::Queued,
                JobStatus::Running,
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition(next));
            }
        }
    }

    #[test]
    fn queued_cannot_skip_to_completion() {
        assert!(!JobStatus::Queued.can_transition(JobStatus::Completed));
        assert!(!JobStatus::Queued.can_transition(JobStatus::Failed));
        assert!(!JobStatus::Running.can_transition(JobStatus::Queued));
    }

    #[test]
    fn new_job_starts_queued_at_zero_progress() {
        let job = Job::new(JobType::Translate);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0.0);
        assert!(job.external_task_id.is_none());
        assert!(job.started_at.is_none());
    }
}
