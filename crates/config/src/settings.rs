use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub broker: BrokerSettings,
    pub storage: StorageSettings,
    pub inference: InferenceSettings,
    pub worker: WorkerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub url: String,
    /// How long a worker blocks on an empty queue before re-polling.
    pub pop_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub upload_dir: String,
    pub output_dir: String,
    pub scratch_dir: String,
    pub vocab_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Substitute a tagged placeholder translation when the engine is
    /// unreachable instead of failing the whole job.
    pub fallback_on_unavailable: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerSettings {
    pub queues: Vec<String>,
    /// Hard wall-clock limit per task; the job is failed when exceeded.
    pub task_time_limit_secs: u64,
    /// Soft limit; the worker logs a checkpoint warning past this point.
    pub task_soft_time_limit_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::default().separator("__").prefix("BHASHA"))
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "bhasha")?
            .set_default("broker.url", "redis://127.0.0.1:6379")?
            .set_default("broker.pop_timeout_secs", 5)?
            .set_default("storage.upload_dir", "storage/uploads")?
            .set_default("storage.output_dir", "storage/outputs")?
            .set_default("storage.scratch_dir", "storage/scratch")?
            .set_default("storage.vocab_dir", "data/vocabs")?
            .set_default("inference.base_url", "http://localhost:9100")?
            .set_default("inference.timeout_secs", 120)?
            .set_default("inference.fallback_on_unavailable", true)?
            .set_default(
                "worker.queues",
                vec![
                    "translation".to_string(),
                    "speech".to_string(),
                    "evaluation".to_string(),
                    "retraining".to_string(),
                ],
            )?
            .set_default("worker.task_time_limit_secs", 3600)?
            .set_default("worker.task_soft_time_limit_secs", 3000)?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
