use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use crate::routes::jobs::require_supported;
use crate::{error::ApiError, state::AppState};
use bhasha_services::engines::StageError;
use bhasha_services::engines::localization::{DomainVocabulary, Localized, VocabTerm};

#[derive(Debug, Deserialize)]
pub struct CreateVocabularyRequest {
    pub domain: String,
    pub terms: Vec<VocabTerm>,
}

/// Create or replace a domain vocabulary. Takes effect for subsequent
/// localization runs without a restart.
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateVocabularyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let domain = req.domain.trim();
    if domain.is_empty() {
        return Err(ApiError::Validation("Domain must not be empty".to_string()));
    }
    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::Validation(
            "Domain may only contain alphanumerics, '-' and '_'".to_string(),
        ));
    }

    let term_count = req.terms.len();
    state
        .localization
        .create_domain_vocabulary(domain, DomainVocabulary { terms: req.terms })
        .map_err(|e| ApiError::Internal(format!("Failed to write vocabulary: {e}")))?;

    Ok(Json(serde_json::json!({
        "domain": domain,
        "terms": term_count,
    })))
}

pub async fn get(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<DomainVocabulary>, ApiError> {
    let vocab = state.localization.load_domain_vocabulary(&domain);
    if vocab.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No vocabulary for domain '{domain}'"
        )));
    }
    Ok(Json((*vocab).clone()))
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub text: String,
    pub language: String,
    pub domain: Option<String>,
}

/// Run the localization passes synchronously and return the adapted
/// text with its audit trail. No job is created.
pub async fn preview(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<Localized>, ApiError> {
    require_supported(&req.language)?;

    let localized = state
        .localization
        .localize(&req.text, &req.language, req.domain.as_deref())
        .map_err(|e| match e {
            StageError::UnsupportedLanguage(lang) => {
                ApiError::Validation(format!("Unsupported language: {lang}"))
            }
            other => ApiError::Internal(other.to_string()),
        })?;
    Ok(Json(localized))
}
