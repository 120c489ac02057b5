pub mod error;
pub mod routes;
pub mod state;

use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    // Empty origin list means a permissive development setup.
    let cors = if state.settings.app.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .settings
            .app
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Job lifecycle routes
    let job_routes = Router::new()
        .route("/", get(routes::jobs::list))
        .route("/{job_id}", get(routes::jobs::get))
        .route("/{job_id}", delete(routes::jobs::cancel))
        .route("/{job_id}/translations", get(routes::jobs::translations));

    // Speech pipeline routes
    let speech_routes = Router::new()
        .route("/stt/async", post(routes::speech::submit_stt))
        .route("/tts/async", post(routes::speech::submit_tts))
        .route("/localize/async", post(routes::speech::submit_localize));

    // Domain vocabulary routes
    let vocabulary_routes = Router::new()
        .route("/", post(routes::vocabulary::create))
        .route("/preview", post(routes::vocabulary::preview))
        .route("/{domain}", get(routes::vocabulary::get));

    // Compose API
    let api = Router::new()
        .route("/languages", get(supported_languages))
        .route("/translate/async", post(routes::jobs::submit_translation))
        .route("/evaluate/async", post(routes::jobs::submit_evaluation))
        .route("/retrain/trigger", post(routes::jobs::trigger_retraining))
        .route(
            "/translations/{translation_id}/evaluations",
            get(routes::jobs::evaluations),
        )
        // `nest` maps `/jobs` to the inner `/` route but not `/jobs/`;
        // wire the trailing-slash forms the API contract uses explicitly.
        .route("/jobs/", get(routes::jobs::list))
        .route("/vocabulary/", post(routes::vocabulary::create))
        .nest("/jobs", job_routes)
        .nest("/speech", speech_routes)
        .nest("/vocabulary", vocabulary_routes);

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn supported_languages() -> axum::Json<serde_json::Value> {
    let languages: Vec<serde_json::Value> = bhasha_services::engines::SUPPORTED_LANGUAGES
        .iter()
        .map(|(code, name)| serde_json::json!({ "code": code, "name": name }))
        .collect();
    axum::Json(serde_json::json!({ "languages": languages }))
}
