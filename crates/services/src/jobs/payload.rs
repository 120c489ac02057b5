use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Task payloads as carried inside a [`super::TaskEnvelope`]. Shared by
/// the API (which builds them) and the worker (which executes them).

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatePayload {
    pub text: String,
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub domain: Option<String>,
    #[serde(default = "default_true")]
    pub apply_localization: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttPayload {
    pub audio_path: String,
    pub language_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsPayload {
    pub text: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioLocalizePayload {
    pub audio_path: String,
    pub language_hint: Option<String>,
    pub target_language: String,
    pub domain: Option<String>,
    #[serde(default = "default_true")]
    pub apply_localization: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatePayload {
    pub translation_id: ObjectId,
    pub reference_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainPayload {
    pub domain: Option<String>,
    #[serde(default = "default_epochs")]
    pub epochs: u32,
    #[serde(default)]
    pub languages: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_epochs() -> u32 {
    3
}
