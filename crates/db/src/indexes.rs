use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Jobs
    create_indexes(
        db,
        "jobs",
        vec![
            index(bson::doc! { "status": 1, "created_at": -1 }),
            index(bson::doc! { "external_task_id": 1 }),
            index(bson::doc! { "created_at": -1 }),
        ],
    )
    .await?;

    // Translations: one record per (job, target language); the unique
    // index makes redelivered writes overwrite instead of duplicating.
    create_indexes(
        db,
        "translations",
        vec![
            index_unique(bson::doc! { "job_id": 1, "target_language": 1 }),
            index(bson::doc! { "created_at": -1 }),
        ],
    )
    .await?;

    // Evaluations
    create_indexes(
        db,
        "evaluations",
        vec![
            index_unique(bson::doc! { "job_id": 1 }),
            index(bson::doc! { "translation_id": 1 }),
        ],
    )
    .await?;

    info!("MongoDB indexes ensured");
    Ok(())
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    models: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(models)
        .await?;
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}
