use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bson::oid::ObjectId;
use parking_lot::Mutex;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use bhasha_db::models::{JobStatus, JobType};

use super::store::{JobError, JobStore, TransitionUpdate};

/// Task kinds, each statically routed to a named queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Translate,
    SpeechToText,
    TextToSpeech,
    AudioLocalize,
    Evaluate,
    Retrain,
}

impl TaskKind {
    pub fn queue(self) -> &'static str {
        match self {
            Self::Translate => "translation",
            Self::SpeechToText | Self::TextToSpeech | Self::AudioLocalize => "speech",
            Self::Evaluate => "evaluation",
            Self::Retrain => "retraining",
        }
    }

    pub fn job_type(self) -> JobType {
        match self {
            Self::Translate => JobType::Translate,
            Self::SpeechToText => JobType::Stt,
            Self::TextToSpeech => JobType::Tts,
            Self::AudioLocalize => JobType::Localize,
            Self::Evaluate => JobType::Evaluate,
            Self::Retrain => JobType::Retrain,
        }
    }
}

impl From<JobType> for TaskKind {
    fn from(job_type: JobType) -> Self {
        match job_type {
            JobType::Translate => Self::Translate,
            JobType::Stt => Self::SpeechToText,
            JobType::Tts => Self::TextToSpeech,
            JobType::Localize => Self::AudioLocalize,
            JobType::Evaluate => Self::Evaluate,
            JobType::Retrain => Self::Retrain,
        }
    }
}

/// What travels over the queue: `(kind, payload, job id)` plus the
/// delivery handle correlated back into the job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub external_id: String,
    pub kind: TaskKind,
    pub job_id: ObjectId,
    pub payload: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("envelope codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Named-queue task broker with at-least-once delivery.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn push(&self, queue: &str, envelope: &TaskEnvelope) -> Result<(), BrokerError>;
    async fn pop(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<TaskEnvelope>, BrokerError>;
    /// Best-effort removal of a not-yet-claimed task.
    async fn discard(&self, queue: &str, external_id: &str) -> Result<bool, BrokerError>;
}

/// Redis list-backed broker (`LPUSH`/`BRPOP` per queue).
pub struct RedisBroker {
    conn: redis::aio::ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        info!("Connected to Redis broker");
        Ok(Self { conn })
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn push(&self, queue: &str, envelope: &TaskEnvelope) -> Result<(), BrokerError> {
        let body = serde_json::to_string(envelope)?;
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(queue, body).await?;
        debug!(queue, external_id = %envelope.external_id, "Task pushed");
        Ok(())
    }

    async fn pop(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<TaskEnvelope>, BrokerError> {
        let mut conn = self.conn.clone();
        let popped: Option<(String, String)> = conn.brpop(queue, timeout.as_secs_f64()).await?;
        match popped {
            Some((_, body)) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    async fn discard(&self, queue: &str, external_id: &str) -> Result<bool, BrokerError> {
        let mut conn = self.conn.clone();
        let items: Vec<String> = conn.lrange(queue, 0, -1).await?;
        for body in items {
            let Ok(envelope) = serde_json::from_str::<TaskEnvelope>(&body) else {
                continue;
            };
            if envelope.external_id == external_id {
                let removed: i64 = conn.lrem(queue, 1, body).await?;
                return Ok(removed > 0);
            }
        }
        Ok(false)
    }
}

/// In-process broker used by the test suites and single-process setups.
#[derive(Default)]
pub struct InMemoryBroker {
    queues: Mutex<HashMap<String, VecDeque<TaskEnvelope>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self, queue: &str) -> usize {
        self.queues.lock().get(queue).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn push(&self, queue: &str, envelope: &TaskEnvelope) -> Result<(), BrokerError> {
        self.queues
            .lock()
            .entry(queue.to_string())
            .or_default()
            .push_back(envelope.clone());
        Ok(())
    }

    async fn pop(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<TaskEnvelope>, BrokerError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut queues = self.queues.lock();
                if let Some(envelope) = queues.get_mut(queue).and_then(VecDeque::pop_front) {
                    return Ok(Some(envelope));
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn discard(&self, queue: &str, external_id: &str) -> Result<bool, BrokerError> {
        let mut queues = self.queues.lock();
        let Some(items) = queues.get_mut(queue) else {
            return Ok(false);
        };
        let before = items.len();
        items.retain(|e| e.external_id != external_id);
        Ok(items.len() < before)
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("broker unavailable: {0}")]
    Broker(#[from] BrokerError),
    #[error(transparent)]
    Job(#[from] JobError),
}

/// Submits units of work onto named queues and correlates the delivery
/// handle with the job row.
pub struct TaskDispatcher {
    jobs: Arc<dyn JobStore>,
    broker: Arc<dyn Broker>,
}

impl TaskDispatcher {
    pub fn new(jobs: Arc<dyn JobStore>, broker: Arc<dyn Broker>) -> Self {
        Self { jobs, broker }
    }

    /// Creates the job row, enqueues the task, and binds the delivery
    /// handle. On broker failure the row is rolled back so a 5xx never
    /// leaves a dangling queued job.
    pub async fn submit(
        &self,
        kind: TaskKind,
        payload: serde_json::Value,
    ) -> Result<(ObjectId, String), DispatchError> {
        let job = self.jobs.create(kind.job_type()).await?;
        let job_id = job.id.expect("freshly created job has an id");

        let envelope = TaskEnvelope {
            external_id: uuid::Uuid::new_v4().to_string(),
            kind,
            job_id,
            payload,
        };

        if let Err(e) = self.broker.push(kind.queue(), &envelope).await {
            warn!(job_id = %job_id, error = %e, "Broker push failed, rolling back job row");
            if let Err(del) = self.jobs.delete(job_id).await {
                warn!(job_id = %job_id, error = %del, "Rollback of job row failed");
            }
            return Err(e.into());
        }

        self.jobs
            .bind_external_task(job_id, &envelope.external_id)
            .await?;

        info!(job_id = %job_id, queue = kind.queue(), external_id = %envelope.external_id, "Task submitted");
        Ok((job_id, envelope.external_id))
    }

    /// Best-effort cancellation: drops a still-queued task from the
    /// broker and marks the job cancelled. Cancellation of a running job
    /// is cooperative only; an in-flight model call is not interrupted.
    ///
    /// Returns `false` without touching state when the job already
    /// reached a terminal status.
    pub async fn cancel(&self, job_id: ObjectId) -> Result<bool, DispatchError> {
        let job = self.jobs.get(job_id).await?;
        if job.status.is_terminal() {
            return Ok(false);
        }

        if job.status == JobStatus::Queued {
            if let Some(external_id) = &job.external_task_id {
                let queue = TaskKind::from(job.job_type).queue();
                match self.broker.discard(queue, external_id).await {
                    Ok(removed) => {
                        debug!(job_id = %job_id, removed, "Queued task discard attempted")
                    }
                    Err(e) => warn!(job_id = %job_id, error = %e, "Broker discard failed"),
                }
            }
        }

        match self
            .jobs
            .transition(job_id, JobStatus::Cancelled, TransitionUpdate::default())
            .await
        {
            Ok(_) => Ok(true),
            // Lost the race against the worker's terminal transition.
            Err(JobError::InvalidTransition { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
