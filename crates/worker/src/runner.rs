use std::io;
use std::sync::Arc;
use std::time::Duration;

use mongodb::Database;
use tracing::{error, warn};

use bhasha_config::Settings;
use bhasha_services::dao::{EvaluationDao, TranslationDao};
use bhasha_services::engines::localization::{CulturalRuleSet, LocalizationEngine};
use bhasha_services::engines::remote::RemoteInferenceClient;
use bhasha_services::engines::translation::TranslationService;
use bhasha_services::jobs::dispatcher::{Broker, TaskEnvelope, TaskKind};
use bhasha_services::jobs::payload::{
    AudioLocalizePayload, EvaluatePayload, RetrainPayload, SttPayload, TranslatePayload,
    TtsPayload,
};
use bhasha_services::jobs::store::{JobStore, MongoJobStore};
use bhasha_services::pipeline::{
    PipelineEngines, PipelineError, PipelineOrchestrator, execute_job,
};
use bhasha_services::storage::ArtifactStore;

use crate::tasks;

/// Everything a queue consumer needs, built once per process.
pub struct WorkerContext {
    pub settings: Settings,
    pub broker: Arc<dyn Broker>,
    pub jobs: Arc<dyn JobStore>,
    pub translations: Arc<TranslationDao>,
    pub evaluations: Arc<EvaluationDao>,
    pub artifacts: ArtifactStore,
    pub localization: Arc<LocalizationEngine>,
    pub translator: TranslationService,
    pub orchestrator: PipelineOrchestrator,
}

impl WorkerContext {
    pub fn new(db: &Database, settings: Settings, broker: Arc<dyn Broker>) -> io::Result<Self> {
        let jobs: Arc<dyn JobStore> = Arc::new(MongoJobStore::new(db));
        Self::with_job_store(db, settings, broker, jobs)
    }

    /// Builds the context around an explicit job store. The test suites
    /// pass an in-memory store here.
    pub fn with_job_store(
        db: &Database,
        settings: Settings,
        broker: Arc<dyn Broker>,
        jobs: Arc<dyn JobStore>,
    ) -> io::Result<Self> {
        let artifacts = ArtifactStore::new(&settings.storage)?;
        let localization = Arc::new(LocalizationEngine::new(
            settings.storage.vocab_dir.clone(),
            CulturalRuleSet::builtin(),
        ));
        let remote = Arc::new(RemoteInferenceClient::new(&settings.inference));
        let soft_limit = Duration::from_secs(settings.worker.task_soft_time_limit_secs);

        let orchestrator = PipelineOrchestrator::new(
            jobs.clone(),
            PipelineEngines {
                transcriber: remote.clone(),
                translator: TranslationService::new(
                    remote.clone(),
                    settings.inference.fallback_on_unavailable,
                ),
                synthesizer: remote.clone(),
                localization: localization.clone(),
            },
            artifacts.clone(),
            soft_limit,
        );

        Ok(Self {
            translator: TranslationService::new(
                remote,
                settings.inference.fallback_on_unavailable,
            ),
            settings,
            broker,
            jobs,
            translations: Arc::new(TranslationDao::new(db)),
            evaluations: Arc::new(EvaluationDao::new(db)),
            artifacts,
            localization,
            orchestrator,
        })
    }

    fn hard_limit(&self) -> Duration {
        Duration::from_secs(self.settings.worker.task_time_limit_secs)
    }

    fn soft_limit(&self) -> Duration {
        Duration::from_secs(self.settings.worker.task_soft_time_limit_secs)
    }
}

/// Blocks on one named queue and executes every envelope it yields.
/// Runs until the process shuts down.
pub async fn consume_queue(ctx: Arc<WorkerContext>, queue: String) {
    let pop_timeout = Duration::from_secs(ctx.settings.broker.pop_timeout_secs);
    loop {
        match ctx.broker.pop(&queue, pop_timeout).await {
            Ok(Some(envelope)) => handle_envelope(&ctx, envelope).await,
            Ok(None) => {}
            Err(e) => {
                error!(queue, error = %e, "Broker pop failed, backing off");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Decodes the payload for the envelope's kind and runs the task under
/// the job lifecycle. A malformed payload fails the job rather than
/// poisoning the queue.
pub async fn handle_envelope(ctx: &Arc<WorkerContext>, envelope: TaskEnvelope) {
    let job_id = envelope.job_id;
    let jobs = ctx.jobs.clone();
    let hard_limit = ctx.hard_limit();

    macro_rules! run {
        ($payload_ty:ty, $task:expr) => {
            match serde_json::from_value::<$payload_ty>(envelope.payload) {
                Ok(payload) => {
                    execute_job(jobs, job_id, hard_limit, $task(ctx, job_id, payload)).await
                }
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Malformed task payload");
                    execute_job(jobs, job_id, hard_limit, async move {
                        Err(PipelineError::Stage {
                            stage: "payload",
                            source: bhasha_services::engines::StageError::Failed(e.to_string()),
                        })
                    })
                    .await
                }
            }
        };
    }

    match envelope.kind {
        TaskKind::Translate => run!(TranslatePayload, tasks::run_translation),
        TaskKind::SpeechToText => run!(SttPayload, tasks::run_transcription),
        TaskKind::TextToSpeech => run!(TtsPayload, tasks::run_synthesis),
        TaskKind::AudioLocalize => run!(AudioLocalizePayload, tasks::run_audio_localization),
        TaskKind::Evaluate => run!(EvaluatePayload, tasks::run_evaluation),
        TaskKind::Retrain => run!(RetrainPayload, tasks::run_retraining),
    }
}

pub(crate) fn progress_tracker(
    ctx: &WorkerContext,
    job_id: bson::oid::ObjectId,
    total_stages: usize,
) -> bhasha_services::pipeline::ProgressTracker {
    bhasha_services::pipeline::ProgressTracker::new(
        ctx.jobs.clone(),
        job_id,
        total_stages,
        ctx.soft_limit(),
    )
}
