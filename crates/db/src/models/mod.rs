mod evaluation;
mod job;
mod translation;

pub use evaluation::EvaluationRecord;
pub use job::{Job, JobStatus, JobType};
pub use translation::TranslationRecord;
