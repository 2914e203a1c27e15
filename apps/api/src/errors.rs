use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::gap_analysis::orchestrator::GapAnalysisError;
use crate::keywords::extraction::KeywordExtractionError;
use crate::language::LanguageError;
use crate::llm_client::prompts::PromptError;
use crate::llm_client::LlmError;
use crate::models::response::{ApiResponse, ErrorDetail};
use crate::standardization::StandardizationError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Every variant renders the standard envelope with `success: false`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),

    #[error("Request timed out")]
    Timeout,

    #[error("Language error: {0}")]
    Language(#[from] LanguageError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Standardization error: {0}")]
    Standardization(#[from] StandardizationError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), String::new()),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                String::new(),
            ),
            AppError::InvalidBody(rejection) => (
                rejection.status(),
                "VALIDATION_ERROR",
                "Invalid request body".to_string(),
                rejection.body_text(),
            ),
            AppError::Timeout => {
                tracing::warn!("Request exceeded the configured timeout");
                (
                    StatusCode::REQUEST_TIMEOUT,
                    "REQUEST_TIMEOUT",
                    "The request took too long to process. Please try again.".to_string(),
                    String::new(),
                )
            }
            AppError::Language(e) => (StatusCode::BAD_REQUEST, e.code(), e.to_string(), String::new()),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    "The service is not configured for this request".to_string(),
                    msg.clone(),
                )
            }
            AppError::Llm(e) if e.is_retryable() => {
                tracing::error!("LLM error: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "LLM_UNAVAILABLE",
                    "The AI service is temporarily unavailable. Please try again.".to_string(),
                    e.to_string(),
                )
            }
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                    e.to_string(),
                )
            }
            AppError::Standardization(e) => {
                tracing::error!("Standardization error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STANDARDIZATION_ERROR",
                    "Failed to load standardization data".to_string(),
                    e.to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    String::new(),
                )
            }
        }
    }

    /// Renders the error envelope with `data` in place of the empty object.
    pub fn into_response_with(self, data: Value) -> Response {
        let (status, code, message, details) = self.parts();
        let body = ApiResponse::failure(data, ErrorDetail::new(code, message, details));
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_response_with(json!({}))
    }
}

impl From<PromptError> for AppError {
    fn from(e: PromptError) -> Self {
        AppError::Configuration(e.to_string())
    }
}

impl From<GapAnalysisError> for AppError {
    fn from(e: GapAnalysisError) -> Self {
        match e {
            GapAnalysisError::Validation(msg) => AppError::Validation(msg),
            GapAnalysisError::Configuration(e) => e.into(),
            GapAnalysisError::Llm(e) => AppError::Llm(e),
        }
    }
}

impl From<KeywordExtractionError> for AppError {
    fn from(e: KeywordExtractionError) -> Self {
        match e {
            KeywordExtractionError::Validation(msg) => AppError::Validation(msg),
            KeywordExtractionError::Configuration(e) => e.into(),
            KeywordExtractionError::Llm(e) => AppError::Llm(e),
        }
    }
}
