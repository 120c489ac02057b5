use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Quality metrics computed for one translation against a reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub job_id: ObjectId,
    pub translation_id: ObjectId,
    pub language_pair: String,
    pub bleu_score: f64,
    pub reference_text: String,
    pub hypothesis_text: String,
    pub created_at: DateTime,
}

impl EvaluationRecord {
    pub const COLLECTION: &'static str = "evaluations";
}
