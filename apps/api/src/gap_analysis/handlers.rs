//! Axum route handlers for gap analysis.
//!
//! Both endpoints always return a complete `data.gap_analysis`. When the request
//! fails, the fields hold fallback content next to the error.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::coverage::{self, KeywordCoverage};
use super::models::{FormattedGapAnalysis, GapAnalysisRequest};
use crate::errors::AppError;
use crate::models::response::ApiResponse;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GapAnalysisPayload {
    pub job_description: String,
    pub resume: String,
    /// Defaults to `matched_keywords` followed by `missing_keywords`.
    #[serde(default)]
    pub job_keywords: Vec<String>,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub missing_keywords: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

/// Keywords as a JSON list or a comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeywordInput {
    List(Vec<String>),
    Text(String),
}

impl KeywordInput {
    pub fn into_keywords(self) -> Vec<String> {
        let items: Vec<String> = match self {
            KeywordInput::List(items) => items,
            KeywordInput::Text(text) => text.split(',').map(str::to_string).collect(),
        };
        items
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct IndexAndGapPayload {
    pub resume: String,
    pub job_description: String,
    pub keywords: KeywordInput,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Serialize)]
pub struct GapAnalysisData {
    pub gap_analysis: FormattedGapAnalysis,
}

#[derive(Debug, Serialize)]
pub struct IndexAndGapData {
    pub keyword_coverage: KeywordCoverage,
    pub gap_analysis: FormattedGapAnalysis,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/gap-analysis
///
/// Gap analysis from an explicit matched/missing keyword split.
pub async fn handle_gap_analysis(
    State(state): State<AppState>,
    payload: Result<Json<GapAnalysisPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return AppError::from(rejection).into_response_with(fallback_data()),
    };
    match gap_analysis(&state, payload).await {
        Ok(data) => Json(ApiResponse::success(data)).into_response(),
        Err(e) => e.into_response_with(fallback_data()),
    }
}

async fn gap_analysis(state: &AppState, payload: GapAnalysisPayload) -> Result<GapAnalysisData, AppError> {
    let service = &state.gap_analysis;
    let language = service.resolve_language(&payload.language, &payload.job_description)?;

    let job_keywords = if payload.job_keywords.is_empty() {
        payload
            .matched_keywords
            .iter()
            .chain(&payload.missing_keywords)
            .cloned()
            .collect()
    } else {
        payload.job_keywords
    };

    let request = GapAnalysisRequest {
        job_description: payload.job_description,
        resume: payload.resume,
        job_keywords,
        matched_keywords: payload.matched_keywords,
        missing_keywords: payload.missing_keywords,
        language,
    };

    let outcome = service.analyze(&request).await?;
    Ok(GapAnalysisData {
        gap_analysis: outcome.analysis,
    })
}

/// POST /api/v1/index-cal-and-gap-analysis
///
/// Keyword coverage against the resume, then gap analysis on the resulting split.
pub async fn handle_index_and_gap_analysis(
    State(state): State<AppState>,
    payload: Result<Json<IndexAndGapPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return AppError::from(rejection).into_response_with(index_fallback_data()),
    };
    match index_and_gap_analysis(&state, payload).await {
        Ok(data) => Json(ApiResponse::success(data)).into_response(),
        Err(e) => e.into_response_with(index_fallback_data()),
    }
}

async fn index_and_gap_analysis(state: &AppState, payload: IndexAndGapPayload) -> Result<IndexAndGapData, AppError> {
    let keywords = payload.keywords.into_keywords();
    if keywords.is_empty() {
        return Err(AppError::Validation("keywords must not be empty".to_string()));
    }
    // Markup-only resumes have nothing to match against.
    if coverage::strip_html(&payload.resume).is_empty() {
        return Err(AppError::Validation("resume has no text content".to_string()));
    }

    let service = &state.gap_analysis;
    let language = service.resolve_language(&payload.language, &payload.job_description)?;

    let coverage = coverage::analyze(&payload.resume, &keywords, state.coverage);
    info!(
        "Keyword coverage: {}/{} ({}%)",
        coverage.covered_count, coverage.total_keywords, coverage.coverage_percentage
    );

    let request = GapAnalysisRequest {
        job_description: payload.job_description,
        resume: payload.resume,
        job_keywords: keywords,
        matched_keywords: coverage.covered_keywords.clone(),
        missing_keywords: coverage.missed_keywords.clone(),
        language,
    };

    let outcome = service.analyze(&request).await?;
    Ok(IndexAndGapData {
        keyword_coverage: coverage,
        gap_analysis: outcome.analysis,
    })
}

/// Error-path `data` for the gap analysis endpoint.
pub fn fallback_data() -> serde_json::Value {
    json!({ "gap_analysis": FormattedGapAnalysis::fallback() })
}

/// Error-path `data` for the combined coverage and gap analysis endpoint.
pub fn index_fallback_data() -> serde_json::Value {
    json!({
        "keyword_coverage": KeywordCoverage::default(),
        "gap_analysis": FormattedGapAnalysis::fallback(),
    })
}
