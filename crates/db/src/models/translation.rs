use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Immutable result of one produced translation, one per
/// (job, target language) pair. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub job_id: ObjectId,
    pub source_language: String,
    pub target_language: String,
    pub source_text: String,
    pub translated_text: String,
    pub model_used: String,
    pub confidence: f64,
    pub output_path: Option<String>,
    pub created_at: DateTime,
}

impl TranslationRecord {
    pub const COLLECTION: &'static str = "translations";
}
