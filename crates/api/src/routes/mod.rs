pub mod jobs;
pub mod speech;
pub mod vocabulary;
