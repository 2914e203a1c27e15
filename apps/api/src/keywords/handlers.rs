//! Axum route handlers for keyword extraction.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use super::extraction::{ExtractionOptions, KeywordExtraction, DEFAULT_PROMPT_VERSION};
use crate::errors::AppError;
use crate::models::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractKeywordsRequest {
    pub job_description: String,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default = "default_true")]
    pub include_standardization: bool,
    /// A version like `1.4.0`, or `latest`.
    #[serde(default = "default_prompt_version")]
    pub prompt_version: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_max_keywords() -> usize {
    16
}

fn default_true() -> bool {
    true
}

fn default_prompt_version() -> String {
    DEFAULT_PROMPT_VERSION.to_string()
}

fn default_language() -> String {
    "auto".to_string()
}

impl From<ExtractKeywordsRequest> for ExtractionOptions {
    fn from(request: ExtractKeywordsRequest) -> Self {
        let version = request.prompt_version.trim();
        ExtractionOptions {
            max_keywords: request.max_keywords,
            include_standardization: request.include_standardization,
            prompt_version: (!version.is_empty() && !version.eq_ignore_ascii_case("latest"))
                .then(|| version.to_string()),
            language: request.language,
        }
    }
}

/// POST /api/v1/extract-jd-keywords
///
/// Extracts the screening keywords of a job description. Few keywords is not
/// an error: the envelope carries a warning instead.
pub async fn handle_extract_keywords(
    State(state): State<AppState>,
    request: Result<Json<ExtractKeywordsRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<KeywordExtraction>>, AppError> {
    let Json(mut request) = request?;
    let job_description = std::mem::take(&mut request.job_description);
    let mut extraction = state
        .keyword_extraction
        .extract(&job_description, &request.into())
        .await?;

    let warning = extraction.warning.take();
    let response = ApiResponse::success(extraction);
    Ok(Json(match warning {
        Some(warning) => response.with_warning(warning),
        None => response,
    }))
}
