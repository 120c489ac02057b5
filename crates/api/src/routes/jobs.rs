use axum::{
    Json,
    extract::{Path, Query, State},
};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, state::AppState};
use bhasha_db::models::{Job, JobStatus, JobType};
use bhasha_services::dao::base::PaginationParams;
use bhasha_services::engines::is_supported_language;
use bhasha_services::jobs::dispatcher::TaskKind;
use bhasha_services::jobs::payload::{EvaluatePayload, RetrainPayload, TranslatePayload};

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub external_task_id: String,
    pub status: JobStatus,
    pub check_status_url: String,
}

impl SubmitResponse {
    pub(crate) fn new(job_id: ObjectId, external_task_id: String) -> Self {
        let hex = job_id.to_hex();
        Self {
            job_id: hex.clone(),
            external_task_id,
            status: JobStatus::Queued,
            check_status_url: format!("/api/jobs/{hex}"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub progress: f64,
    pub external_task_id: Option<String>,
    pub result_path: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
}

fn to_response(job: Job) -> JobResponse {
    JobResponse {
        id: job.id.map(|id| id.to_hex()).unwrap_or_default(),
        job_type: job.job_type,
        status: job.status,
        progress: job.progress,
        external_task_id: job.external_task_id,
        result_path: job.result_path,
        result: job.result,
        error_message: job.error_message,
        started_at: job
            .started_at
            .and_then(|t| t.try_to_rfc3339_string().ok()),
        completed_at: job
            .completed_at
            .and_then(|t| t.try_to_rfc3339_string().ok()),
        created_at: job.created_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}

pub(crate) fn parse_job_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid job_id".to_string()))
}

pub(crate) fn require_supported(lang: &str) -> Result<(), ApiError> {
    if is_supported_language(lang) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Unsupported language: {lang}"
        )))
    }
}

/// Submit a text translation job. Returns immediately with the job id;
/// translation runs on the worker.
pub async fn submit_translation(
    State(state): State<AppState>,
    Json(payload): Json<TranslatePayload>,
) -> Result<Json<SubmitResponse>, ApiError> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::Validation("Text must not be empty".to_string()));
    }
    if payload.target_languages.is_empty() {
        return Err(ApiError::Validation(
            "At least one target language is required".to_string(),
        ));
    }
    require_supported(&payload.source_language)?;
    for lang in &payload.target_languages {
        require_supported(lang)?;
    }

    let body = serde_json::to_value(&payload)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let (job_id, external_id) = state.dispatcher.submit(TaskKind::Translate, body).await?;
    Ok(Json(SubmitResponse::new(job_id, external_id)))
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub translation_id: String,
    pub reference_text: String,
}

/// Submit a quality-evaluation job for a stored translation.
pub async fn submit_evaluation(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    if req.reference_text.trim().is_empty() {
        return Err(ApiError::Validation(
            "Reference text must not be empty".to_string(),
        ));
    }
    let translation_id = ObjectId::parse_str(&req.translation_id)
        .map_err(|_| ApiError::BadRequest("Invalid translation_id".to_string()))?;

    let payload = EvaluatePayload {
        translation_id,
        reference_text: req.reference_text,
    };
    let body = serde_json::to_value(&payload)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let (job_id, external_id) = state.dispatcher.submit(TaskKind::Evaluate, body).await?;
    Ok(Json(SubmitResponse::new(job_id, external_id)))
}

/// Trigger a model retraining run.
pub async fn trigger_retraining(
    State(state): State<AppState>,
    Json(payload): Json<RetrainPayload>,
) -> Result<Json<SubmitResponse>, ApiError> {
    if payload.epochs == 0 {
        return Err(ApiError::Validation(
            "Epochs must be at least 1".to_string(),
        ));
    }
    for lang in &payload.languages {
        require_supported(lang)?;
    }

    let body = serde_json::to_value(&payload)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let (job_id, external_id) = state.dispatcher.submit(TaskKind::Retrain, body).await?;
    Ok(Json(SubmitResponse::new(job_id, external_id)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = state.jobs.list_recent(&params).await?;
    let items: Vec<JobResponse> = result.items.into_iter().map(to_response).collect();

    Ok(Json(serde_json::json!({
        "items": items,
        "total": result.total,
        "page": result.page,
        "per_page": result.per_page,
        "total_pages": result.total_pages,
    })))
}

pub async fn get(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let id = parse_job_id(&job_id)?;
    let job = state.jobs.get(id).await?;
    Ok(Json(to_response(job)))
}

/// Best-effort cancellation. `cancelled: false` means the job had
/// already reached a terminal state.
pub async fn cancel(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_job_id(&job_id)?;
    let cancelled = state.dispatcher.cancel(id).await?;
    let job = state.jobs.get(id).await?;

    Ok(Json(serde_json::json!({
        "job_id": id.to_hex(),
        "cancelled": cancelled,
        "status": job.status,
    })))
}

#[derive(Debug, Serialize)]
pub struct EvaluationResponse {
    pub id: String,
    pub job_id: String,
    pub language_pair: String,
    pub bleu_score: f64,
    pub reference_text: String,
    pub hypothesis_text: String,
}

/// Stored evaluation results for one translation, newest first.
pub async fn evaluations(
    State(state): State<AppState>,
    Path(translation_id): Path<String>,
) -> Result<Json<Vec<EvaluationResponse>>, ApiError> {
    let id = ObjectId::parse_str(&translation_id)
        .map_err(|_| ApiError::BadRequest("Invalid translation_id".to_string()))?;
    let records = state.evaluations.list_for_translation(id).await?;

    Ok(Json(
        records
            .into_iter()
            .map(|r| EvaluationResponse {
                id: r.id.map(|id| id.to_hex()).unwrap_or_default(),
                job_id: r.job_id.to_hex(),
                language_pair: r.language_pair,
                bleu_score: r.bleu_score,
                reference_text: r.reference_text,
                hypothesis_text: r.hypothesis_text,
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct TranslationResponse {
    pub id: String,
    pub source_language: String,
    pub target_language: String,
    pub translated_text: String,
    pub model_used: String,
    pub confidence: f64,
    pub output_path: Option<String>,
}

/// Stored translation records produced by a translation job.
pub async fn translations(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Vec<TranslationResponse>>, ApiError> {
    let id = parse_job_id(&job_id)?;
    let records = state.translations.list_for_job(id).await?;

    Ok(Json(
        records
            .into_iter()
            .map(|r| TranslationResponse {
                id: r.id.map(|id| id.to_hex()).unwrap_or_default(),
                source_language: r.source_language,
                target_language: r.target_language,
                translated_text: r.translated_text,
                model_used: r.model_used,
                confidence: r.confidence,
                output_path: r.output_path,
            })
            .collect(),
    ))
}
