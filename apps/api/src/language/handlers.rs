//! Axum route handlers for language detection.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{CompositionStats, DetectionResult};
use crate::errors::AppError;
use crate::models::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DetectLanguageRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct DetectLanguageResponse {
    #[serde(flatten)]
    pub detection: DetectionResult,
    pub composition: CompositionStats,
}

/// POST /api/v1/detect-language
///
/// Too-short, low-confidence and unsupported text come back as errors with
/// the matching code, so callers can tell them apart.
pub async fn handle_detect_language(
    State(state): State<AppState>,
    request: Result<Json<DetectLanguageRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<DetectLanguageResponse>>, AppError> {
    let Json(request) = request?;
    let detection = state.detector.detect(&request.text)?;
    Ok(Json(ApiResponse::success(DetectLanguageResponse {
        detection,
        composition: CompositionStats::analyze(&request.text),
    })))
}
