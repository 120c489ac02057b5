pub mod base;
pub mod evaluation;
pub mod translation;

pub use evaluation::EvaluationDao;
pub use translation::TranslationDao;
