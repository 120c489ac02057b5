use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use serde_json::json;
use tracing::info;

use crate::engines::localization::LocalizationEngine;
use crate::engines::translation::TranslationService;
use crate::engines::{StageError, Synthesizer, Transcriber, is_supported_language};
use crate::jobs::payload::{AudioLocalizePayload, SttPayload, TtsPayload};
use crate::jobs::store::JobStore;
use crate::storage::ArtifactStore;

use super::{PipelineError, PipelineOutcome, ProgressTracker, stage_err};

/// The model capabilities a pipeline run composes over.
pub struct PipelineEngines {
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: TranslationService,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub localization: Arc<LocalizationEngine>,
}

/// Composes the speech pipelines stage by stage.
///
/// Each run gets a scratch workspace under the artifact store's scratch
/// directory; the workspace is removed on every exit path, success or
/// failure, so a crashed stage leaves no intermediate files behind.
/// Only files moved into the job directory survive the run.
pub struct PipelineOrchestrator {
    jobs: Arc<dyn JobStore>,
    engines: PipelineEngines,
    artifacts: ArtifactStore,
    soft_limit: Duration,
}

impl PipelineOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        engines: PipelineEngines,
        artifacts: ArtifactStore,
        soft_limit: Duration,
    ) -> Self {
        Self {
            jobs,
            engines,
            artifacts,
            soft_limit,
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Full audio localization: transcribe, translate, optionally
    /// localize, synthesize. An empty transcript is fatal before any
    /// downstream stage runs.
    pub async fn run_audio_localization(
        &self,
        job_id: ObjectId,
        payload: &AudioLocalizePayload,
    ) -> Result<PipelineOutcome, PipelineError> {
        if !is_supported_language(&payload.target_language) {
            return Err(stage_err("translate")(StageError::UnsupportedLanguage(
                payload.target_language.clone(),
            )));
        }

        let total_stages = if payload.apply_localization { 4 } else { 3 };
        let mut progress =
            ProgressTracker::new(self.jobs.clone(), job_id, total_stages, self.soft_limit);
        progress.start().await;

        // Dropped on every return below, taking all intermediates with it.
        let workdir = tempfile::tempdir_in(self.artifacts.scratch_dir())
            .map_err(|e| stage_err("transcribe")(e.into()))?;

        let transcript = self
            .engines
            .transcriber
            .transcribe(
                Path::new(&payload.audio_path),
                payload.language_hint.as_deref(),
            )
            .await
            .map_err(stage_err("transcribe"))?;
        if transcript.text.trim().is_empty() {
            return Err(stage_err("transcribe")(StageError::EmptyTranscript));
        }
        let transcript_path = self
            .artifacts
            .save_transcript(job_id, &transcript.text)
            .map_err(|e| stage_err("transcribe")(e.into()))?;
        progress.stage_done("transcribe").await?;

        let translation = self
            .engines
            .translator
            .translate(
                &transcript.text,
                &transcript.detected_language,
                &payload.target_language,
            )
            .await
            .map_err(stage_err("translate"))?;
        progress.stage_done("translate").await?;

        let (final_text, changes) = if payload.apply_localization {
            let localized = self
                .engines
                .localization
                .localize(
                    &translation.text,
                    &payload.target_language,
                    payload.domain.as_deref(),
                )
                .map_err(stage_err("localize"))?;
            progress.stage_done("localize").await?;
            (localized.text, localized.changes)
        } else {
            (translation.text.clone(), Vec::new())
        };

        let scratch_audio = workdir.path().join("synthesis.wav");
        self.engines
            .synthesizer
            .synthesize(&final_text, &payload.target_language, &scratch_audio)
            .await
            .map_err(stage_err("synthesize"))?;
        let audio_path = self
            .artifacts
            .persist_audio(job_id, &payload.target_language, &scratch_audio)
            .map_err(|e| stage_err("synthesize")(e.into()))?;
        progress.stage_done("synthesize").await?;

        info!(job_id = %job_id, target = %payload.target_language, "Audio localization finished");
        Ok(PipelineOutcome {
            result_path: Some(audio_path.clone()),
            result: json!({
                "transcript": transcript.text,
                "detected_language": transcript.detected_language,
                "translated_text": final_text,
                "model_used": translation.model,
                "confidence": translation.confidence,
                "localization_changes": changes,
                "transcript_path": transcript_path.display().to_string(),
                "audio_path": audio_path.display().to_string(),
            }),
        })
    }

    /// Speech-to-text only.
    pub async fn run_transcription(
        &self,
        job_id: ObjectId,
        payload: &SttPayload,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut progress = ProgressTracker::new(self.jobs.clone(), job_id, 1, self.soft_limit);
        progress.start().await;

        let transcript = self
            .engines
            .transcriber
            .transcribe(
                Path::new(&payload.audio_path),
                payload.language_hint.as_deref(),
            )
            .await
            .map_err(stage_err("transcribe"))?;
        if transcript.text.trim().is_empty() {
            return Err(stage_err("transcribe")(StageError::EmptyTranscript));
        }
        let transcript_path = self
            .artifacts
            .save_transcript(job_id, &transcript.text)
            .map_err(|e| stage_err("transcribe")(e.into()))?;
        progress.stage_done("transcribe").await?;

        Ok(PipelineOutcome {
            result_path: Some(transcript_path.clone()),
            result: json!({
                "transcript": transcript.text,
                "detected_language": transcript.detected_language,
                "confidence": transcript.confidence,
                "transcript_path": transcript_path.display().to_string(),
            }),
        })
    }

    /// Text-to-speech only.
    pub async fn run_synthesis(
        &self,
        job_id: ObjectId,
        payload: &TtsPayload,
    ) -> Result<PipelineOutcome, PipelineError> {
        if !is_supported_language(&payload.language) {
            return Err(stage_err("synthesize")(StageError::UnsupportedLanguage(
                payload.language.clone(),
            )));
        }

        let mut progress = ProgressTracker::new(self.jobs.clone(), job_id, 1, self.soft_limit);
        progress.start().await;

        let workdir = tempfile::tempdir_in(self.artifacts.scratch_dir())
            .map_err(|e| stage_err("synthesize")(e.into()))?;
        let scratch_audio = workdir.path().join("synthesis.wav");
        self.engines
            .synthesizer
            .synthesize(&payload.text, &payload.language, &scratch_audio)
            .await
            .map_err(stage_err("synthesize"))?;
        let audio_path = self
            .artifacts
            .persist_audio(job_id, &payload.language, &scratch_audio)
            .map_err(|e| stage_err("synthesize")(e.into()))?;
        progress.stage_done("synthesize").await?;

        Ok(PipelineOutcome {
            result_path: Some(audio_path.clone()),
            result: json!({
                "language": payload.language,
                "audio_path": audio_path.display().to_string(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    use bhasha_config::StorageSettings;
    use bhasha_db::models::{JobStatus, JobType};

    use crate::engines::localization::CulturalRuleSet;
    use crate::engines::translation::FALLBACK_PREFIX;
    use crate::engines::{Transcript, Translation, Translator};
    use crate::jobs::store::{MemoryJobStore, TransitionUpdate};

    struct FixedTranscriber {
        text: &'static str,
    }

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(
            &self,
            _audio: &Path,
            _language_hint: Option<&str>,
        ) -> Result<Transcript, StageError> {
            Ok(Transcript {
                text: self.text.to_string(),
                detected_language: "en".to_string(),
                confidence: 0.95,
                segments: Vec::new(),
            })
        }
    }

    struct EchoTranslator;

    #[async_trait]
    impl Translator for EchoTranslator {
        async fn translate(
            &self,
            text: &str,
            _source: &str,
            _target: &str,
        ) -> Result<Translation, StageError> {
            Ok(Translation {
                text: text.to_string(),
                confidence: 0.9,
                model: "mock-mt".to_string(),
            })
        }
    }

    struct UnavailableTranslator;

    #[async_trait]
    impl Translator for UnavailableTranslator {
        async fn translate(
            &self,
            _text: &str,
            _source: &str,
            _target: &str,
        ) -> Result<Translation, StageError> {
            Err(StageError::EngineUnavailable("connection refused".into()))
        }
    }

    /// Cancels its own job mid-stage, exercising the between-stage check.
    struct CancellingTranslator {
        jobs: Arc<MemoryJobStore>,
        job_id: ObjectId,
    }

    #[async_trait]
    impl Translator for CancellingTranslator {
        async fn translate(
            &self,
            text: &str,
            _source: &str,
            _target: &str,
        ) -> Result<Translation, StageError> {
            self.jobs
                .transition(self.job_id, JobStatus::Cancelled, TransitionUpdate::default())
                .await
                .unwrap();
            Ok(Translation {
                text: text.to_string(),
                confidence: 0.9,
                model: "mock-mt".to_string(),
            })
        }
    }

    struct RecordingSynthesizer {
        called: AtomicBool,
        fail: bool,
    }

    impl RecordingSynthesizer {
        fn new(fail: bool) -> Self {
            Self {
                called: AtomicBool::new(false),
                fail,
            }
        }
    }

    #[async_trait]
    impl Synthesizer for RecordingSynthesizer {
        async fn synthesize(
            &self,
            _text: &str,
            _language: &str,
            output: &Path,
        ) -> Result<(), StageError> {
            self.called.store(true, Ordering::SeqCst);
            if self.fail {
                return Err(StageError::Failed("voice model crashed".into()));
            }
            std::fs::write(output, b"RIFF")?;
            Ok(())
        }
    }

    struct Harness {
        _dir: TempDir,
        jobs: Arc<MemoryJobStore>,
        orchestrator: PipelineOrchestrator,
        synthesizer: Arc<RecordingSynthesizer>,
    }

    fn harness(translator: Arc<dyn Translator>, fail_synthesis: bool) -> Harness {
        let dir = TempDir::new().unwrap();
        let settings = StorageSettings {
            upload_dir: dir.path().join("uploads").display().to_string(),
            output_dir: dir.path().join("outputs").display().to_string(),
            scratch_dir: dir.path().join("scratch").display().to_string(),
            vocab_dir: dir.path().join("vocabs").display().to_string(),
        };
        let artifacts = ArtifactStore::new(&settings).unwrap();
        let jobs = Arc::new(MemoryJobStore::new());
        let synthesizer = Arc::new(RecordingSynthesizer::new(fail_synthesis));
        let engines = PipelineEngines {
            transcriber: Arc::new(FixedTranscriber {
                text: "Hello Dr. Sharma, please visit room 4",
            }),
            translator: TranslationService::new(translator, true),
            synthesizer: synthesizer.clone(),
            localization: Arc::new(LocalizationEngine::new(
                dir.path().join("vocabs"),
                CulturalRuleSet::builtin(),
            )),
        };
        let orchestrator = PipelineOrchestrator::new(
            jobs.clone(),
            engines,
            artifacts,
            Duration::from_secs(3000),
        );
        Harness {
            _dir: dir,
            jobs,
            orchestrator,
            synthesizer,
        }
    }

    async fn running_job(jobs: &MemoryJobStore) -> ObjectId {
        let id = jobs
            .create(JobType::Localize)
            .await
            .unwrap()
            .id
            .unwrap();
        jobs.transition(id, JobStatus::Running, TransitionUpdate::default())
            .await
            .unwrap();
        id
    }

    fn payload(target: &str) -> AudioLocalizePayload {
        AudioLocalizePayload {
            audio_path: "/dev/null".to_string(),
            language_hint: None,
            target_language: target.to_string(),
            domain: None,
            apply_localization: true,
        }
    }

    #[tokio::test]
    async fn full_pipeline_localizes_and_persists_audio() {
        let h = harness(Arc::new(EchoTranslator), false);
        let job_id = running_job(&h.jobs).await;

        let outcome = h
            .orchestrator
            .run_audio_localization(job_id, &payload("hi"))
            .await
            .unwrap();

        let translated = outcome.result["translated_text"].as_str().unwrap();
        assert!(translated.contains("डॉ."));
        assert!(translated.contains('४'));
        let changes = outcome.result["localization_changes"].as_array().unwrap();
        assert!(!changes.is_empty());

        let audio = outcome.result_path.unwrap();
        assert!(audio.exists());
        assert_eq!(h.jobs.get(job_id).await.unwrap().progress, 100.0);
    }

    #[tokio::test]
    async fn synthesis_failure_leaves_no_scratch_files() {
        let h = harness(Arc::new(EchoTranslator), true);
        let job_id = running_job(&h.jobs).await;

        let err = h
            .orchestrator
            .run_audio_localization(job_id, &payload("hi"))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("synthesize:"));

        let scratch = h.orchestrator.artifacts().scratch_dir();
        assert_eq!(std::fs::read_dir(scratch).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn empty_transcript_fails_before_downstream_stages() {
        let mut h = harness(Arc::new(EchoTranslator), false);
        h.orchestrator.engines.transcriber = Arc::new(FixedTranscriber { text: "   " });
        let job_id = running_job(&h.jobs).await;

        let err = h
            .orchestrator
            .run_audio_localization(job_id, &payload("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "transcribe: transcript is empty");
        assert!(!h.synthesizer.called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancellation_between_stages_skips_the_rest() {
        let h = harness(Arc::new(EchoTranslator), false);
        let job_id = running_job(&h.jobs).await;
        let mut h = h;
        h.orchestrator.engines.translator = TranslationService::new(
            Arc::new(CancellingTranslator {
                jobs: h.jobs.clone(),
                job_id,
            }),
            false,
        );

        let err = h
            .orchestrator
            .run_audio_localization(job_id, &payload("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert!(!h.synthesizer.called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unavailable_engine_yields_tagged_placeholder() {
        let h = harness(Arc::new(UnavailableTranslator), false);
        let job_id = running_job(&h.jobs).await;
        let mut p = payload("hi");
        p.apply_localization = false;

        let outcome = h
            .orchestrator
            .run_audio_localization(job_id, &p)
            .await
            .unwrap();
        let translated = outcome.result["translated_text"].as_str().unwrap();
        assert!(translated.starts_with(FALLBACK_PREFIX));
        assert_eq!(outcome.result["model_used"], "placeholder");
    }

    #[tokio::test]
    async fn unsupported_target_is_rejected_up_front() {
        let h = harness(Arc::new(EchoTranslator), false);
        let job_id = running_job(&h.jobs).await;

        let err = h
            .orchestrator
            .run_audio_localization(job_id, &payload("xx"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "translate: unsupported language: xx");
    }

    #[tokio::test]
    async fn transcription_only_persists_the_transcript() {
        let h = harness(Arc::new(EchoTranslator), false);
        let job_id = running_job(&h.jobs).await;

        let outcome = h
            .orchestrator
            .run_transcription(
                job_id,
                &SttPayload {
                    audio_path: "/dev/null".to_string(),
                    language_hint: Some("en".to_string()),
                },
            )
            .await
            .unwrap();

        let path = outcome.result_path.unwrap();
        assert!(path.exists());
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "Hello Dr. Sharma, please visit room 4"
        );
    }
}
