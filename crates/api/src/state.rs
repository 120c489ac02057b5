use mongodb::Database;
use std::sync::Arc;

use bhasha_config::Settings;
use bhasha_services::{
    dao::{EvaluationDao, TranslationDao},
    engines::localization::{CulturalRuleSet, LocalizationEngine},
    jobs::dispatcher::{Broker, TaskDispatcher},
    jobs::store::{JobStore, MongoJobStore},
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub jobs: Arc<dyn JobStore>,
    pub dispatcher: Arc<TaskDispatcher>,
    pub translations: Arc<TranslationDao>,
    pub evaluations: Arc<EvaluationDao>,
    pub localization: Arc<LocalizationEngine>,
}

impl AppState {
    pub fn new(db: Database, settings: Settings, broker: Arc<dyn Broker>) -> Self {
        let jobs: Arc<dyn JobStore> = Arc::new(MongoJobStore::new(&db));
        Self::with_job_store(db, settings, broker, jobs)
    }

    /// Builds the state around an explicit job store. The test suites
    /// pass an in-memory store here.
    pub fn with_job_store(
        db: Database,
        settings: Settings,
        broker: Arc<dyn Broker>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        let dispatcher = Arc::new(TaskDispatcher::new(jobs.clone(), broker));
        let translations = Arc::new(TranslationDao::new(&db));
        let evaluations = Arc::new(EvaluationDao::new(&db));
        let localization = Arc::new(LocalizationEngine::new(
            settings.storage.vocab_dir.clone(),
            CulturalRuleSet::builtin(),
        ));

        Self {
            db,
            settings,
            jobs,
            dispatcher,
            translations,
            evaluations,
            localization,
        }
    }
}
