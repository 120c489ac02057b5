use bson::{doc, oid::ObjectId};
use bhasha_db::models::TranslationRecord;
use mongodb::Database;

use super::base::{BaseDao, DaoResult};

/// Append-only store of produced translations.
pub struct TranslationDao {
    dao: BaseDao<TranslationRecord>,
}

impl TranslationDao {
    pub fn new(db: &Database) -> Self {
        Self {
            dao: BaseDao::new(db, TranslationRecord::COLLECTION),
        }
    }

    /// Writes the record for its (job, target language) slot.
    ///
    /// The broker delivers at least once, so a redelivered task re-writes
    /// the same slot instead of appending a duplicate.
    pub async fn upsert_for_job(&self, record: &TranslationRecord) -> DaoResult<ObjectId> {
        let filter = doc! {
            "job_id": record.job_id,
            "target_language": &record.target_language,
        };
        self.dao
            .collection()
            .replace_one(filter.clone(), record)
            .upsert(true)
            .await
            .map_err(super::base::DaoError::Mongo)?;

        let stored = self
            .dao
            .find_one(filter)
            .await?
            .ok_or(super::base::DaoError::NotFound)?;
        Ok(stored.id.expect("stored record has an _id"))
    }

    pub async fn get(&self, id: ObjectId) -> DaoResult<TranslationRecord> {
        self.dao.find_by_id(id).await
    }

    pub async fn list_for_job(&self, job_id: ObjectId) -> DaoResult<Vec<TranslationRecord>> {
        self.dao
            .find_many(doc! { "job_id": job_id }, Some(doc! { "target_language": 1 }))
            .await
    }
}
