use bson::{doc, oid::ObjectId};
use bhasha_db::models::EvaluationRecord;
use mongodb::Database;

use super::base::{BaseDao, DaoError, DaoResult};

pub struct EvaluationDao {
    dao: BaseDao<EvaluationRecord>,
}

impl EvaluationDao {
    pub fn new(db: &Database) -> Self {
        Self {
            dao: BaseDao::new(db, EvaluationRecord::COLLECTION),
        }
    }

    /// One evaluation per job; redelivery overwrites the same slot.
    pub async fn upsert_for_job(&self, record: &EvaluationRecord) -> DaoResult<ObjectId> {
        let filter = doc! { "job_id": record.job_id };
        self.dao
            .collection()
            .replace_one(filter.clone(), record)
            .upsert(true)
            .await
            .map_err(DaoError::Mongo)?;

        let stored = self
            .dao
            .find_one(filter)
            .await?
            .ok_or(DaoError::NotFound)?;
        Ok(stored.id.expect("stored record has an _id"))
    }

    pub async fn list_for_translation(
        &self,
        translation_id: ObjectId,
    ) -> DaoResult<Vec<EvaluationRecord>> {
        self.dao
            .find_many(
                doc! { "translation_id": translation_id },
                Some(doc! { "created_at": -1 }),
            )
            .await
    }
}
