use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use serde_json::json;
use tracing::{debug, info};

use bhasha_db::models::{EvaluationRecord, TranslationRecord};
use bhasha_services::dao::base::DaoError;
use bhasha_services::engines::StageError;
use bhasha_services::engines::evaluation::sentence_bleu;
use bhasha_services::jobs::payload::{
    AudioLocalizePayload, EvaluatePayload, RetrainPayload, SttPayload, TranslatePayload,
    TtsPayload,
};
use bhasha_services::jobs::store::JobError;
use bhasha_services::pipeline::{PipelineError, PipelineOutcome};

use crate::runner::{WorkerContext, progress_tracker};

fn stage(stage: &'static str) -> impl Fn(StageError) -> PipelineError {
    move |source| PipelineError::Stage { stage, source }
}

fn store_err(e: DaoError) -> PipelineError {
    PipelineError::Job(JobError::from(e))
}

/// Text translation into one or more target languages. Each target is
/// one stage: translate, optionally localize, persist the record and
/// the artifact file.
pub async fn run_translation(
    ctx: &Arc<WorkerContext>,
    job_id: ObjectId,
    payload: TranslatePayload,
) -> Result<PipelineOutcome, PipelineError> {
    let mut tracker = progress_tracker(ctx, job_id, payload.target_languages.len());
    tracker.start().await;

    let mut summaries = Vec::new();
    for target in &payload.target_languages {
        let translation = ctx
            .translator
            .translate(&payload.text, &payload.source_language, target)
            .await
            .map_err(stage("translate"))?;

        let (text, changes) = if payload.apply_localization {
            let localized = ctx
                .localization
                .localize(&translation.text, target, payload.domain.as_deref())
                .map_err(stage("localize"))?;
            (localized.text, localized.changes)
        } else {
            (translation.text.clone(), Vec::new())
        };

        let artifact = ctx
            .artifacts
            .save_translation(
                job_id,
                target,
                &json!({
                    "source_language": payload.source_language,
                    "target_language": target,
                    "translated_text": text,
                    "model_used": translation.model,
                    "confidence": translation.confidence,
                    "localization_changes": changes,
                }),
            )
            .map_err(|e| stage("translate")(e.into()))?;

        let record = TranslationRecord {
            id: None,
            job_id,
            source_language: payload.source_language.clone(),
            target_language: target.clone(),
            source_text: payload.text.clone(),
            translated_text: text.clone(),
            model_used: translation.model.clone(),
            confidence: translation.confidence,
            output_path: Some(artifact.display().to_string()),
            created_at: DateTime::now(),
        };
        ctx.translations
            .upsert_for_job(&record)
            .await
            .map_err(store_err)?;

        summaries.push(json!({
            "target_language": target,
            "translated_text": text,
            "model_used": translation.model,
            "confidence": translation.confidence,
            "localization_changes": changes,
            "output_path": artifact.display().to_string(),
        }));
        tracker.stage_done("translate").await?;
    }

    info!(job_id = %job_id, targets = payload.target_languages.len(), "Translation job finished");
    Ok(PipelineOutcome {
        result_path: Some(ctx.artifacts.job_dir(job_id)),
        result: json!({
            "source_language": payload.source_language,
            "translations": summaries,
        }),
    })
}

pub async fn run_transcription(
    ctx: &Arc<WorkerContext>,
    job_id: ObjectId,
    payload: SttPayload,
) -> Result<PipelineOutcome, PipelineError> {
    ctx.orchestrator.run_transcription(job_id, &payload).await
}

pub async fn run_synthesis(
    ctx: &Arc<WorkerContext>,
    job_id: ObjectId,
    payload: TtsPayload,
) -> Result<PipelineOutcome, PipelineError> {
    ctx.orchestrator.run_synthesis(job_id, &payload).await
}

/// Full pipeline, plus a stored translation record for the audit trail.
pub async fn run_audio_localization(
    ctx: &Arc<WorkerContext>,
    job_id: ObjectId,
    payload: AudioLocalizePayload,
) -> Result<PipelineOutcome, PipelineError> {
    let outcome = ctx
        .orchestrator
        .run_audio_localization(job_id, &payload)
        .await?;

    let text = |key: &str| {
        outcome.result[key]
            .as_str()
            .unwrap_or_default()
            .to_string()
    };
    let record = TranslationRecord {
        id: None,
        job_id,
        source_language: text("detected_language"),
        target_language: payload.target_language.clone(),
        source_text: text("transcript"),
        translated_text: text("translated_text"),
        model_used: text("model_used"),
        confidence: outcome.result["confidence"].as_f64().unwrap_or(0.0),
        output_path: outcome.result_path.as_ref().map(|p| p.display().to_string()),
        created_at: DateTime::now(),
    };
    ctx.translations
        .upsert_for_job(&record)
        .await
        .map_err(store_err)?;

    Ok(outcome)
}

/// Scores one stored translation against a reference text.
pub async fn run_evaluation(
    ctx: &Arc<WorkerContext>,
    job_id: ObjectId,
    payload: EvaluatePayload,
) -> Result<PipelineOutcome, PipelineError> {
    let mut tracker = progress_tracker(ctx, job_id, 1);
    tracker.start().await;

    let record = ctx
        .translations
        .get(payload.translation_id)
        .await
        .map_err(|e| match e {
            DaoError::NotFound => stage("evaluate")(StageError::Failed(format!(
                "translation {} not found",
                payload.translation_id.to_hex()
            ))),
            other => store_err(other),
        })?;

    let bleu = sentence_bleu(&record.translated_text, &payload.reference_text);
    let language_pair = format!("{}-{}", record.source_language, record.target_language);

    let evaluation = EvaluationRecord {
        id: None,
        job_id,
        translation_id: payload.translation_id,
        language_pair: language_pair.clone(),
        bleu_score: bleu,
        reference_text: payload.reference_text.clone(),
        hypothesis_text: record.translated_text.clone(),
        created_at: DateTime::now(),
    };
    ctx.evaluations
        .upsert_for_job(&evaluation)
        .await
        .map_err(store_err)?;
    tracker.stage_done("evaluate").await?;

    info!(job_id = %job_id, %language_pair, bleu, "Evaluation finished");
    Ok(PipelineOutcome {
        result_path: None,
        result: json!({
            "translation_id": payload.translation_id.to_hex(),
            "language_pair": language_pair,
            "bleu_score": bleu,
        }),
    })
}

/// Checkpointed retraining run. Each epoch is one stage, so progress
/// moves through the intermediate checkpoints and a cancellation lands
/// between epochs. Finishes by writing the training manifest and
/// refreshing the affected domain vocabulary.
pub async fn run_retraining(
    ctx: &Arc<WorkerContext>,
    job_id: ObjectId,
    payload: RetrainPayload,
) -> Result<PipelineOutcome, PipelineError> {
    let epochs = payload.epochs.max(1);
    let mut tracker = progress_tracker(ctx, job_id, epochs as usize);
    tracker.start().await;

    for epoch in 1..=epochs {
        debug!(job_id = %job_id, epoch, epochs, "Retraining checkpoint");
        tracker.stage_done("epoch").await?;
    }

    if let Some(domain) = &payload.domain {
        ctx.localization.reload_domain_vocabulary(domain);
    }

    let manifest = json!({
        "domain": payload.domain,
        "epochs": epochs,
        "languages": payload.languages,
        "completed_at": chrono::Utc::now().to_rfc3339(),
    });
    let path = ctx
        .artifacts
        .save_manifest(job_id, &manifest)
        .map_err(|e| stage("retrain")(e.into()))?;

    Ok(PipelineOutcome {
        result_path: Some(path),
        result: manifest,
    })
}
