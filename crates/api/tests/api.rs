use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use bhasha_api::{build_router, state::AppState};
use bhasha_config::{
    AppSettings, BrokerSettings, DatabaseSettings, InferenceSettings, Settings, StorageSettings,
    WorkerSettings,
};
use bhasha_services::jobs::dispatcher::InMemoryBroker;
use bhasha_services::jobs::store::MemoryJobStore;

fn settings(dir: &TempDir) -> Settings {
    Settings {
        app: AppSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: Vec::new(),
        },
        database: DatabaseSettings {
            url: "mongodb://127.0.0.1:27017".to_string(),
            name: "bhasha_test".to_string(),
            max_pool_size: None,
            min_pool_size: None,
        },
        broker: BrokerSettings {
            url: "redis://127.0.0.1:6379".to_string(),
            pop_timeout_secs: 1,
        },
        storage: StorageSettings {
            upload_dir: dir.path().join("uploads").display().to_string(),
            output_dir: dir.path().join("outputs").display().to_string(),
            scratch_dir: dir.path().join("scratch").display().to_string(),
            vocab_dir: dir.path().join("vocabs").display().to_string(),
        },
        inference: InferenceSettings {
            base_url: "http://127.0.0.1:9100".to_string(),
            api_key: None,
            timeout_secs: 5,
            fallback_on_unavailable: true,
        },
        worker: WorkerSettings {
            queues: vec!["translation".to_string(), "speech".to_string()],
            task_time_limit_secs: 60,
            task_soft_time_limit_secs: 50,
        },
    }
}

/// Router over in-memory stores; the `Database` handle is lazy and
/// never touched by these tests.
async fn test_app(dir: &TempDir) -> Router {
    let client = mongodb::Client::with_uri_str("mongodb://127.0.0.1:27017")
        .await
        .unwrap();
    let db = client.database("bhasha_test");
    let state = AppState::with_job_store(
        db,
        settings(dir),
        Arc::new(InMemoryBroker::new()),
        Arc::new(MemoryJobStore::new()),
    );
    build_router(state)
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    let (status, body) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn language_table_lists_the_scheduled_languages() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    let (status, body) = request(&app, "GET", "/api/languages", None).await;
    assert_eq!(status, StatusCode::OK);
    let languages = body["languages"].as_array().unwrap();
    assert_eq!(languages.len(), 22);
    assert!(
        languages
            .iter()
            .any(|l| l["code"] == "hi" && l["name"] == "Hindi")
    );
}

#[tokio::test]
async fn translation_submission_returns_a_queued_job() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/translate/async",
        Some(json!({
            "text": "The doctor will see you now",
            "source_language": "en",
            "target_languages": ["hi", "ta"],
            "domain": "healthcare",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert_eq!(body["status"], "queued");
    assert_eq!(body["check_status_url"], format!("/api/jobs/{job_id}"));

    let (status, job) = request(&app, "GET", &format!("/api/jobs/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "queued");
    assert_eq!(job["job_type"], "translate");
    assert_eq!(job["progress"], 0.0);
    assert!(job["external_task_id"].is_string());
}

#[tokio::test]
async fn unsupported_target_language_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/translate/async",
        Some(json!({
            "text": "hello",
            "source_language": "en",
            "target_languages": ["xx"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn empty_text_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/translate/async",
        Some(json!({
            "text": "   ",
            "source_language": "en",
            "target_languages": ["hi"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn queued_job_can_be_cancelled_once() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    let (_, body) = request(
        &app,
        "POST",
        "/api/translate/async",
        Some(json!({
            "text": "hello",
            "source_language": "en",
            "target_languages": ["hi"],
        })),
    )
    .await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, body) = request(&app, "DELETE", &format!("/api/jobs/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], true);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = request(&app, "DELETE", &format!("/api/jobs/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], false);
    assert_eq!(body["status"], "cancelled");
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    let (status, _) = request(
        &app,
        "GET",
        "/api/jobs/aaaaaaaaaaaaaaaaaaaaaaaa",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(&app, "GET", "/api/jobs/not-an-id", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn job_listing_is_paginated() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    for _ in 0..3 {
        request(
            &app,
            "POST",
            "/api/speech/tts/async",
            Some(json!({ "text": "hello", "language": "hi" })),
        )
        .await;
    }

    let (status, body) = request(&app, "GET", "/api/jobs/?page=1&per_page=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["total_pages"], 2);
}

#[tokio::test]
async fn zero_pagination_values_fall_back_to_the_first_page() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    request(
        &app,
        "POST",
        "/api/speech/tts/async",
        Some(json!({ "text": "hello", "language": "hi" })),
    )
    .await;

    let (status, body) = request(&app, "GET", "/api/jobs/?page=0&per_page=0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["per_page"], 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn tts_submission_validates_language() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/speech/tts/async",
        Some(json!({ "text": "hello", "language": "xx" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn vocabulary_roundtrip_feeds_the_preview() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    let mut localized = HashMap::new();
    localized.insert("hi", "डॉक्टर");
    let (status, body) = request(
        &app,
        "POST",
        "/api/vocabulary/",
        Some(json!({
            "domain": "healthcare",
            "terms": [{ "source": "doctor", "localized": localized }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["terms"], 1);

    let (status, vocab) = request(&app, "GET", "/api/vocabulary/healthcare", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vocab["terms"][0]["source"], "doctor");

    let (status, preview) = request(
        &app,
        "POST",
        "/api/vocabulary/preview",
        Some(json!({
            "text": "The doctor is in room 4",
            "language": "hi",
            "domain": "healthcare",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let text = preview["text"].as_str().unwrap();
    assert!(text.contains("डॉक्टर"));
    assert!(text.contains('४'));
    assert!(!preview["changes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_vocabulary_domain_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    let (status, _) = request(&app, "GET", "/api/vocabulary/no-such-domain", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn evaluation_submission_validates_the_reference() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/evaluate/async",
        Some(json!({
            "translation_id": "aaaaaaaaaaaaaaaaaaaaaaaa",
            "reference_text": "  ",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn retraining_trigger_queues_onto_the_retraining_queue() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir).await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/retrain/trigger",
        Some(json!({ "domain": "healthcare", "epochs": 2, "languages": ["hi"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let job_id = body["job_id"].as_str().unwrap();
    let (_, job) = request(&app, "GET", &format!("/api/jobs/{job_id}"), None).await;
    assert_eq!(job["job_type"], "retrain");
}
