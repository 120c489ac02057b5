pub mod dao;
pub mod engines;
pub mod jobs;
pub mod pipeline;
pub mod storage;

pub use engines::localization::LocalizationEngine;
pub use jobs::dispatcher::TaskDispatcher;
pub use jobs::store::JobStore;
pub use pipeline::PipelineOrchestrator;
