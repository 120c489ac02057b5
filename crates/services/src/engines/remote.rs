use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bhasha_config::InferenceSettings;

use super::{StageError, Transcriber, Transcript, TranscriptSegment, Translation, Translator, Synthesizer};

/// HTTP client for the external inference service hosting the
/// translation, speech-recognition, and speech-synthesis models.
#[derive(Debug, Clone)]
pub struct RemoteInferenceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source_language: &'a str,
    target_language: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translated_text: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    model_used: String,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
    detected_language: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    segments: Vec<SegmentResponse>,
}

#[derive(Debug, Deserialize)]
struct SegmentResponse {
    start: f64,
    end: f64,
    text: String,
}

impl RemoteInferenceClient {
    pub fn new(settings: &InferenceSettings) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .expect("reqwest client builds with static options");
        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    /// Connection-level failures map to `EngineUnavailable` so callers
    /// can choose the tagged-placeholder fallback; HTTP-level failures
    /// are genuine stage failures.
    fn classify(e: reqwest::Error, what: &str) -> StageError {
        if e.is_connect() || e.is_timeout() {
            StageError::EngineUnavailable(format!("{what}: {e}"))
        } else {
            StageError::Failed(format!("{what}: {e}"))
        }
    }
}

#[async_trait]
impl Translator for RemoteInferenceClient {
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<Translation, StageError> {
        let response = self
            .request("/translate")
            .json(&TranslateRequest {
                text,
                source_language: source,
                target_language: target,
            })
            .send()
            .await
            .map_err(|e| Self::classify(e, "translation request"))?
            .error_for_status()
            .map_err(|e| StageError::Failed(format!("translation engine: {e}")))?;

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| StageError::Failed(format!("translation response: {e}")))?;

        debug!(source, target, model = %body.model_used, "Translation received");
        Ok(Translation {
            text: body.translated_text,
            confidence: body.confidence,
            model: body.model_used,
        })
    }
}

#[async_trait]
impl Transcriber for RemoteInferenceClient {
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<Transcript, StageError> {
        let bytes = tokio::fs::read(audio).await?;

        let mut builder = self.request("/transcribe").body(bytes);
        if let Some(hint) = language_hint {
            builder = builder.query(&[("language", hint)]);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::classify(e, "transcription request"))?
            .error_for_status()
            .map_err(|e| StageError::Failed(format!("transcription engine: {e}")))?;

        let body: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| StageError::Failed(format!("transcription response: {e}")))?;

        Ok(Transcript {
            text: body.text,
            detected_language: body.detected_language,
            confidence: body.confidence,
            segments: body
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    start: s.start,
                    end: s.end,
                    text: s.text,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl Synthesizer for RemoteInferenceClient {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        output: &Path,
    ) -> Result<(), StageError> {
        let response = self
            .request("/synthesize")
            .json(&serde_json::json!({ "text": text, "language": language }))
            .send()
            .await
            .map_err(|e| Self::classify(e, "synthesis request"))?
            .error_for_status()
            .map_err(|e| StageError::Failed(format!("synthesis engine: {e}")))?;

        let audio = response
            .bytes()
            .await
            .map_err(|e| StageError::Failed(format!("synthesis response: {e}")))?;

        tokio::fs::write(output, &audio).await?;
        Ok(())
    }
}
