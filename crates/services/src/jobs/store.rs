use async_trait::async_trait;
use bson::{DateTime, doc, oid::ObjectId};
use dashmap::DashMap;
use mongodb::Database;
use thiserror::Error;
use tracing::debug;

use bhasha_db::models::{Job, JobStatus, JobType};

use crate::dao::base::{BaseDao, DaoError, PaginatedResult, PaginationParams};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job not found")]
    NotFound,
    #[error("invalid transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
    #[error("progress regression: {current} -> {requested}")]
    ProgressRegression { current: f64, requested: f64 },
    #[error("external task id already bound")]
    AlreadyBound,
    #[error(transparent)]
    Store(#[from] DaoError),
}

pub type JobResult<T> = Result<T, JobError>;

/// Optional fields stamped alongside a status transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionUpdate {
    pub result_path: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

/// Persisted record of every unit of background work.
///
/// Implementations enforce the job state machine: transitions out of a
/// terminal state are rejected, `started_at`/`completed_at` are stamped
/// on entering `running`/any terminal state, and progress never goes
/// backwards.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job_type: JobType) -> JobResult<Job>;
    async fn get(&self, id: ObjectId) -> JobResult<Job>;
    async fn bind_external_task(&self, id: ObjectId, external_id: &str) -> JobResult<()>;
    async fn transition(
        &self,
        id: ObjectId,
        to: JobStatus,
        update: TransitionUpdate,
    ) -> JobResult<Job>;
    async fn set_progress(&self, id: ObjectId, value: f64) -> JobResult<()>;
    async fn delete(&self, id: ObjectId) -> JobResult<()>;
    async fn list_recent(&self, params: &PaginationParams) -> JobResult<PaginatedResult<Job>>;
}

fn check_transition(from: JobStatus, to: JobStatus) -> JobResult<()> {
    if from.can_transition(to) {
        Ok(())
    } else {
        Err(JobError::InvalidTransition { from, to })
    }
}

const ALL_STATUSES: &[JobStatus] = &[
    JobStatus::Queued,
    JobStatus::Running,
    JobStatus::Completed,
    JobStatus::Failed,
    JobStatus::Cancelled,
];

/// Statuses from which `to` is reachable. Used as the status guard of
/// the conditional Mongo update, so a concurrent writer (the API
/// cancelling while the worker finishes) cannot overwrite a terminal
/// row.
fn transition_sources(to: JobStatus) -> Vec<JobStatus> {
    ALL_STATUSES
        .iter()
        .copied()
        .filter(|from| from.can_transition(to))
        .collect()
}

fn transition_set(
    to: JobStatus,
    update: &TransitionUpdate,
    now: DateTime,
) -> JobResult<bson::Document> {
    let mut set = doc! {
        "status": bson::ser::to_bson(&to).map_err(DaoError::BsonSer)?,
        "updated_at": now,
    };
    if to == JobStatus::Running {
        set.insert("started_at", now);
    }
    if to.is_terminal() {
        set.insert("completed_at", now);
    }
    if to == JobStatus::Completed {
        set.insert("progress", 100.0);
    }
    if let Some(path) = &update.result_path {
        set.insert("result_path", path.as_str());
    }
    if let Some(result) = &update.result {
        set.insert(
            "result",
            bson::ser::to_bson(result).map_err(DaoError::BsonSer)?,
        );
    }
    if let Some(message) = &update.error_message {
        set.insert("error_message", message.as_str());
    }
    Ok(set)
}

fn apply_transition(job: &mut Job, to: JobStatus, update: TransitionUpdate, now: DateTime) {
    job.status = to;
    job.updated_at = now;
    if to == JobStatus::Running {
        job.started_at = Some(now);
    }
    if to.is_terminal() {
        job.completed_at = Some(now);
    }
    if to == JobStatus::Completed {
        job.progress = 100.0;
    }
    if let Some(path) = update.result_path {
        job.result_path = Some(path);
    }
    if let Some(result) = update.result {
        job.result = Some(result);
    }
    if let Some(message) = update.error_message {
        job.error_message = Some(message);
    }
}

/// MongoDB-backed job store.
///
/// The API and the worker are separate processes sharing the job
/// collection, so every read hits the collection and every state
/// change is a conditional update guarded on the current row. The
/// status guard makes the terminal transition exclusive: whichever of
/// two racing writers matches first wins, the other observes a no-op
/// and reports `InvalidTransition`.
pub struct MongoJobStore {
    dao: BaseDao<Job>,
}

impl MongoJobStore {
    pub fn new(db: &Database) -> Self {
        Self {
            dao: BaseDao::new(db, Job::COLLECTION),
        }
    }

    async fn load(&self, id: ObjectId) -> JobResult<Job> {
        self.dao.find_by_id(id).await.map_err(|e| match e {
            DaoError::NotFound => JobError::NotFound,
            other => JobError::Store(other),
        })
    }
}

#[async_trait]
impl JobStore for MongoJobStore {
    async fn create(&self, job_type: JobType) -> JobResult<Job> {
        let mut job = Job::new(job_type);
        let id = self.dao.insert_one(&job).await?;
        job.id = Some(id);
        debug!(job_id = %id, ?job_type, "Created job");
        Ok(job)
    }

    async fn get(&self, id: ObjectId) -> JobResult<Job> {
        self.load(id).await
    }

    async fn bind_external_task(&self, id: ObjectId, external_id: &str) -> JobResult<()> {
        // Matches a null or absent field, so the id binds exactly once.
        let filter = doc! { "_id": id, "external_task_id": bson::Bson::Null };
        let bound = self
            .dao
            .update_one(filter, doc! { "$set": { "external_task_id": external_id } })
            .await?;
        if !bound {
            let job = self.load(id).await?;
            if job.external_task_id.is_some() {
                return Err(JobError::AlreadyBound);
            }
        }
        Ok(())
    }

    async fn transition(
        &self,
        id: ObjectId,
        to: JobStatus,
        update: TransitionUpdate,
    ) -> JobResult<Job> {
        let sources = transition_sources(to)
            .into_iter()
            .map(|s| bson::ser::to_bson(&s))
            .collect::<Result<Vec<_>, _>>()
            .map_err(DaoError::BsonSer)?;
        let filter = doc! { "_id": id, "status": { "$in": sources } };
        let set = transition_set(to, &update, DateTime::now())?;

        let moved = self.dao.update_one(filter, doc! { "$set": set }).await?;
        if !moved {
            let job = self.load(id).await?;
            return Err(JobError::InvalidTransition {
                from: job.status,
                to,
            });
        }
        debug!(job_id = %id, status = ?to, "Job transitioned");
        self.load(id).await
    }

    async fn set_progress(&self, id: ObjectId, value: f64) -> JobResult<()> {
        let filter = doc! { "_id": id, "progress": { "$lte": value } };
        let advanced = self
            .dao
            .update_one(filter, doc! { "$set": { "progress": value } })
            .await?;
        if !advanced {
            let job = self.load(id).await?;
            if value < job.progress {
                return Err(JobError::ProgressRegression {
                    current: job.progress,
                    requested: value,
                });
            }
        }
        Ok(())
    }

    async fn delete(&self, id: ObjectId) -> JobResult<()> {
        self.dao
            .collection()
            .delete_one(doc! { "_id": id })
            .await
            .map_err(DaoError::Mongo)?;
        Ok(())
    }

    async fn list_recent(&self, params: &PaginationParams) -> JobResult<PaginatedResult<Job>> {
        Ok(self
            .dao
            .find_paginated(doc! {}, Some(doc! { "created_at": -1 }), params)
            .await?)
    }
}

/// In-memory job store with the same state-machine guarantees.
///
/// Used by the test suites and by single-process deployments that run
/// the worker inside the API process.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: DashMap<ObjectId, Job>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job_type: JobType) -> JobResult<Job> {
        let mut job = Job::new(job_type);
        let id = ObjectId::new();
        job.id = Some(id);
        self.jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: ObjectId) -> JobResult<Job> {
        self.jobs
            .get(&id)
            .map(|j| j.clone())
            .ok_or(JobError::NotFound)
    }

    async fn bind_external_task(&self, id: ObjectId, external_id: &str) -> JobResult<()> {
        let mut job = self.jobs.get_mut(&id).ok_or(JobError::NotFound)?;
        if job.external_task_id.is_some() {
            return Err(JobError::AlreadyBound);
        }
        job.external_task_id = Some(external_id.to_string());
        Ok(())
    }

    async fn transition(
        &self,
        id: ObjectId,
        to: JobStatus,
        update: TransitionUpdate,
    ) -> JobResult<Job> {
        let mut job = self.jobs.get_mut(&id).ok_or(JobError::NotFound)?;
        check_transition(job.status, to)?;
        apply_transition(&mut job, to, update, DateTime::now());
        Ok(job.clone())
    }

    async fn set_progress(&self, id: ObjectId, value: f64) -> JobResult<()> {
        let mut job = self.jobs.get_mut(&id).ok_or(JobError::NotFound)?;
        if value < job.progress {
            return Err(JobError::ProgressRegression {
                current: job.progress,
                requested: value,
            });
        }
        job.progress = value;
        job.updated_at = DateTime::now();
        Ok(())
    }

    async fn delete(&self, id: ObjectId) -> JobResult<()> {
        self.jobs.remove(&id);
        Ok(())
    }

    async fn list_recent(&self, params: &PaginationParams) -> JobResult<PaginatedResult<Job>> {
        let mut items: Vec<Job> = self.jobs.iter().map(|j| j.clone()).collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let (page, per_page) = params.clamped();
        let total = items.len() as u64;
        let skip = ((page - 1) * per_page) as usize;
        let items: Vec<Job> = items
            .into_iter()
            .skip(skip)
            .take(per_page as usize)
            .collect();
        let total_pages = (total + per_page - 1) / per_page;

        Ok(PaginatedResult {
            items,
            total,
            page,
            per_page,
            total_pages,
        })
    }
}
