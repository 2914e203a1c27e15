pub mod health;

use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    http::Uri,
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Router,
};
use tower::{timeout::TimeoutLayer, ServiceBuilder};

use crate::errors::AppError;
use crate::gap_analysis::handlers as gap_analysis;
use crate::keywords::handlers as keywords;
use crate::language::handlers as language;
use crate::standardization::handlers as standardization;
use crate::state::AppState;

const GAP_ANALYSIS_PATH: &str = "/api/v1/gap-analysis";
const INDEX_AND_GAP_ANALYSIS_PATH: &str = "/api/v1/index-cal-and-gap-analysis";

async fn not_found() -> AppError {
    AppError::NotFound("No route for this path".to_string())
}

/// Bounds every request. A request that runs out of time drops its handler
/// future, which cancels the in-flight LLM call and any pending retry delay.
pub fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_service_error))
            .layer(TimeoutLayer::new(timeout)),
    )
}

async fn handle_service_error(uri: Uri, err: BoxError) -> Response {
    let error = if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Timeout
    } else {
        AppError::Internal(anyhow::anyhow!("Unhandled service error: {err}"))
    };
    match uri.path() {
        GAP_ANALYSIS_PATH => error.into_response_with(gap_analysis::fallback_data()),
        INDEX_AND_GAP_ANALYSIS_PATH => error.into_response_with(gap_analysis::index_fallback_data()),
        _ => error.into_response(),
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Gap analysis
        .route(GAP_ANALYSIS_PATH, post(gap_analysis::handle_gap_analysis))
        .route(
            INDEX_AND_GAP_ANALYSIS_PATH,
            post(gap_analysis::handle_index_and_gap_analysis),
        )
        // Keyword extraction
        .route(
            "/api/v1/extract-jd-keywords",
            post(keywords::handle_extract_keywords),
        )
        // Language detection
        .route(
            "/api/v1/detect-language",
            post(language::handle_detect_language),
        )
        // Standardization
        .route(
            "/api/v1/standardization/stats",
            get(standardization::handle_stats),
        )
        .route(
            "/api/v1/standardization/reload",
            post(standardization::handle_reload),
        )
        .fallback(not_found)
        .with_state(state)
}
