//! Axum route handlers for the keyword standardizer.

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::warn;

use super::{StandardizerStats, ValidationReport};
use crate::errors::AppError;
use crate::models::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StandardizationStatus {
    pub stats: StandardizerStats,
    pub validation: ValidationReport,
}

/// GET /api/v1/standardization/stats
pub async fn handle_stats(State(state): State<AppState>) -> Json<ApiResponse<StandardizationStatus>> {
    Json(ApiResponse::success(StandardizationStatus {
        stats: state.standardizer.stats(),
        validation: state.standardizer.validate(),
    }))
}

/// POST /api/v1/standardization/reload
///
/// Re-reads the dictionary and pattern files. A failed reload keeps the
/// current tables and reports the error.
pub async fn handle_reload(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StandardizationStatus>>, AppError> {
    let stats = state.standardizer.reload()?;
    let validation = state.standardizer.validate();
    if !validation.is_clean() {
        warn!("Standardization data has issues after reload: {validation:?}");
    }
    Ok(Json(ApiResponse::success(StandardizationStatus { stats, validation })))
}
