use axum::{
    Json,
    extract::{Multipart, State},
};
use std::path::{Path as FsPath, PathBuf};

use crate::routes::jobs::{SubmitResponse, require_supported};
use crate::{error::ApiError, state::AppState};
use bhasha_services::jobs::dispatcher::TaskKind;
use bhasha_services::jobs::payload::{AudioLocalizePayload, SttPayload, TtsPayload};

struct AudioUpload {
    path: PathBuf,
    fields: std::collections::HashMap<String, String>,
}

/// Drains a multipart form: the `file` field is written under the
/// upload directory with a fresh name, every text field is collected
/// verbatim.
async fn read_audio_upload(
    upload_dir: &str,
    mut multipart: Multipart,
) -> Result<AudioUpload, ApiError> {
    let mut path: Option<PathBuf> = None;
    let mut fields = std::collections::HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let extension = field
                .file_name()
                .and_then(|f| FsPath::new(f).extension().and_then(|e| e.to_str()))
                .unwrap_or("wav")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {e}")))?;
            if bytes.is_empty() {
                return Err(ApiError::Validation("Uploaded file is empty".to_string()));
            }

            tokio::fs::create_dir_all(upload_dir)
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to create upload dir: {e}")))?;
            let target =
                PathBuf::from(upload_dir).join(format!("{}.{extension}", uuid::Uuid::new_v4()));
            tokio::fs::write(&target, &bytes)
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to store upload: {e}")))?;
            path = Some(target);
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {e}")))?;
            fields.insert(name, text);
        }
    }

    let path = path.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;
    Ok(AudioUpload { path, fields })
}

/// Submit a speech-to-text job.
/// Fields: `file` (binary), `language_hint` (text, optional)
pub async fn submit_stt(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let upload = read_audio_upload(&state.settings.storage.upload_dir, multipart).await?;
    if let Some(hint) = upload.fields.get("language_hint") {
        require_supported(hint)?;
    }

    let payload = SttPayload {
        audio_path: upload.path.display().to_string(),
        language_hint: upload.fields.get("language_hint").cloned(),
    };
    let body =
        serde_json::to_value(&payload).map_err(|e| ApiError::Internal(e.to_string()))?;
    let (job_id, external_id) = state
        .dispatcher
        .submit(TaskKind::SpeechToText, body)
        .await?;
    Ok(Json(SubmitResponse::new(job_id, external_id)))
}

/// Submit a text-to-speech job.
pub async fn submit_tts(
    State(state): State<AppState>,
    Json(payload): Json<TtsPayload>,
) -> Result<Json<SubmitResponse>, ApiError> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::Validation("Text must not be empty".to_string()));
    }
    require_supported(&payload.language)?;

    let body =
        serde_json::to_value(&payload).map_err(|e| ApiError::Internal(e.to_string()))?;
    let (job_id, external_id) = state
        .dispatcher
        .submit(TaskKind::TextToSpeech, body)
        .await?;
    Ok(Json(SubmitResponse::new(job_id, external_id)))
}

/// Submit a full audio localization job.
/// Fields: `file` (binary), `target_language` (text), `domain` (text,
/// optional), `language_hint` (text, optional), `apply_localization`
/// (text "true"/"false", optional, defaults to true)
pub async fn submit_localize(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let upload = read_audio_upload(&state.settings.storage.upload_dir, multipart).await?;

    let target_language = upload
        .fields
        .get("target_language")
        .cloned()
        .ok_or_else(|| ApiError::BadRequest("Missing 'target_language' field".to_string()))?;
    require_supported(&target_language)?;
    if let Some(hint) = upload.fields.get("language_hint") {
        require_supported(hint)?;
    }
    let apply_localization = upload
        .fields
        .get("apply_localization")
        .map_or(true, |v| v != "false");

    let payload = AudioLocalizePayload {
        audio_path: upload.path.display().to_string(),
        language_hint: upload.fields.get("language_hint").cloned(),
        target_language,
        domain: upload.fields.get("domain").cloned(),
        apply_localization,
    };
    let body =
        serde_json::to_value(&payload).map_err(|e| ApiError::Internal(e.to_string()))?;
    let (job_id, external_id) = state
        .dispatcher
        .submit(TaskKind::AudioLocalize, body)
        .await?;
    Ok(Json(SubmitResponse::new(job_id, external_id)))
}
