//! survey-dashboard library - HTTP adapter for the survey store
//!
//! Routes upload requests to the spreadsheet ingestion normalizer and read
//! requests to the `SurveyStore` port. All survey logic lives in
//! `survey-common`; handlers only translate HTTP to store calls and back.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Largest accepted spreadsheet upload
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let upload = Router::new()
        .route("/api/upload", post(api::upload_spreadsheet))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    Router::new()
        .route(
            "/api/respondents",
            get(api::list_respondents).post(api::create_respondent),
        )
        .route(
            "/api/respondents/:id",
            get(api::get_respondent).delete(api::delete_respondent),
        )
        .route(
            "/api/personality-factors/:respondent_id",
            get(api::personality_factors_by_respondent),
        )
        .route(
            "/api/personality-factors-filter",
            get(api::filter_personality_factors),
        )
        .route(
            "/api/categorization/:respondent_id",
            get(api::categorization_by_respondent),
        )
        .route("/api/categorization-filter", get(api::filter_categorization))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(upload)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
