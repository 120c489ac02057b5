pub mod evaluation;
pub mod localization;
pub mod remote;
pub mod translation;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The 22 scheduled Indian languages served by the system.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("as", "Assamese"),
    ("bn", "Bengali"),
    ("brx", "Bodo"),
    ("doi", "Dogri"),
    ("gu", "Gujarati"),
    ("hi", "Hindi"),
    ("kn", "Kannada"),
    ("ks", "Kashmiri"),
    ("kok", "Konkani"),
    ("mai", "Maithili"),
    ("ml", "Malayalam"),
    ("mni", "Manipuri"),
    ("mr", "Marathi"),
    ("ne", "Nepali"),
    ("or", "Odia"),
    ("pa", "Punjabi"),
    ("sa", "Sanskrit"),
    ("sat", "Santali"),
    ("sd", "Sindhi"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("ur", "Urdu"),
];

/// `en` is accepted as a source and pivot language alongside the table.
pub fn is_supported_language(lang: &str) -> bool {
    lang == "en" || SUPPORTED_LANGUAGES.iter().any(|(code, _)| *code == lang)
}

/// Failure of one pipeline stage. Carries a user-displayable message;
/// the orchestrator prefixes it with the stage name.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("transcript is empty")]
    EmptyTranscript,
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("{0}")]
    Failed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub detected_language: String,
    pub confidence: f64,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    pub confidence: f64,
    pub model: String,
}

/// Speech-recognition decoder, consumed as an opaque capability.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<Transcript, StageError>;
}

/// Translation model, consumed as an opaque capability.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<Translation, StageError>;
}

/// Speech-synthesis voice; writes audio bytes to `output`.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str, output: &Path)
    -> Result<(), StageError>;
}
