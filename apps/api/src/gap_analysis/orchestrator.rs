//! Gap-Analysis Orchestrator: bounded attempts against the LLM, then fallback.
//!
//! Each attempt runs LLM call → clean → parse → format → emptiness check. A
//! complete result returns immediately. Empty sections and retryable transport
//! errors share one attempt budget; every retry reuses the identical prompt.
//! When the budget runs out, still-empty fields get their fixed fallback content.
//! Only validation and configuration errors (and non-retryable LLM errors) reach
//! the caller.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use super::emptiness::{check_empty, EmptinessReport};
use super::formatter;
use super::models::{FormattedGapAnalysis, GapAnalysisRequest};
use super::parser;
use crate::language::{Language, LanguageDetector, LanguageError};
use crate::llm_client::prompts::{PromptError, PromptProvider, PromptTask};
use crate::llm_client::{clean_llm_output, ChatCompletion, ChatMessage, ChatResponse, LlmError, TokenUsage};
use crate::props;
use crate::telemetry::EventSink;

#[derive(Debug, Error)]
pub enum GapAnalysisError {
    #[error("{0}")]
    Validation(String),

    #[error("Prompt configuration error: {0}")]
    Configuration(#[from] PromptError),

    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone)]
pub struct GapAnalysisSettings {
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GapAnalysisSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// Result handed to the HTTP layer.
#[derive(Debug, Clone)]
pub struct GapAnalysisOutcome {
    pub analysis: FormattedGapAnalysis,
    pub attempts: u32,
    /// Fields that carry fallback content.
    pub fallback_fields: EmptinessReport,
    pub usage: TokenUsage,
    pub prompt_version: &'static str,
}

/// Prompt version per output language. zh-TW pins a later revision that keeps
/// skill names in English and is more consistent about filling every section.
pub fn prompt_version(language: Language) -> &'static str {
    match language {
        Language::En => "1.0.0",
        Language::ZhTw => "1.2.0",
    }
}

pub struct GapAnalysisService {
    llm: Arc<dyn ChatCompletion>,
    prompts: Arc<dyn PromptProvider>,
    events: Arc<dyn EventSink>,
    detector: Arc<LanguageDetector>,
    settings: GapAnalysisSettings,
}

impl GapAnalysisService {
    pub fn new(
        llm: Arc<dyn ChatCompletion>,
        prompts: Arc<dyn PromptProvider>,
        events: Arc<dyn EventSink>,
        detector: Arc<LanguageDetector>,
        settings: GapAnalysisSettings,
    ) -> Self {
        Self {
            llm,
            prompts,
            events,
            detector,
            settings,
        }
    }

    /// Resolves the requested output language. `auto` detects it from `text`;
    /// detection that is merely inconclusive falls back to English.
    pub fn resolve_language(&self, requested: &str, text: &str) -> Result<Language, GapAnalysisError> {
        let requested = requested.trim();
        if !requested.eq_ignore_ascii_case("auto") {
            return Language::from_tag(requested).ok_or_else(|| {
                GapAnalysisError::Validation(format!(
                    "Unsupported language '{requested}'. Supported: en, zh-TW, auto"
                ))
            });
        }

        match self.detector.detect(text) {
            Ok(detection) => Ok(detection.language),
            Err(e @ (LanguageError::TextTooShort { .. } | LanguageError::LowConfidence { .. })) => {
                warn!("Language detection inconclusive, falling back to en: {e}");
                self.events.track_event(
                    "LanguageDetectionFallback",
                    props! { "reason" => e.code(), "fallback" => "en", "operation" => "gap_analysis" },
                );
                Ok(Language::En)
            }
            Err(e) => Err(GapAnalysisError::Validation(e.to_string())),
        }
    }

    /// Runs the attempt loop for one request. Dropping the returned future
    /// cancels any in-flight LLM call or pending delay.
    pub async fn analyze(&self, request: &GapAnalysisRequest) -> Result<GapAnalysisOutcome, GapAnalysisError> {
        validate_request(request)?;

        let language = request.language;
        let version = prompt_version(language);
        let messages = self.build_messages(request, version)?;
        let max_attempts = self.settings.max_attempts.max(1);

        info!("Using gap analysis prompt version {version} for language {language}");

        let mut usage = TokenUsage::default();
        let mut last_output: Option<FormattedGapAnalysis> = None;
        let mut last_report = EmptinessReport::default();
        let mut last_error: Option<String> = None;

        for attempt in 1..=max_attempts {
            info!("Gap analysis attempt {attempt}/{max_attempts} (language {language})");

            match self
                .llm
                .chat_complete(&messages, self.settings.temperature, self.settings.max_tokens)
                .await
            {
                Ok(response) => {
                    self.track_usage(&response, attempt, language, version);
                    usage.prompt_tokens += response.usage.prompt_tokens;
                    usage.completion_tokens += response.usage.completion_tokens;

                    let parsed = parser::parse(&clean_llm_output(&response.content));
                    let formatted = formatter::format(&parsed);
                    let report = check_empty(&formatted);

                    if report.is_empty() {
                        if attempt > 1 {
                            info!("Gap analysis succeeded on attempt {attempt}");
                            self.events.track_event(
                                "GapAnalysisRetrySuccess",
                                props! { "attempt" => attempt, "language" => language.tag() },
                            );
                        }
                        self.track_completed(attempt, language, &EmptinessReport::default());
                        return Ok(GapAnalysisOutcome {
                            analysis: formatted,
                            attempts: attempt,
                            fallback_fields: report,
                            usage,
                            prompt_version: version,
                        });
                    }

                    warn!(
                        "Gap analysis attempt {attempt} produced empty fields: {:?} (finish_reason {})",
                        report.names(),
                        response.finish_reason
                    );
                    last_output = Some(formatted);
                    last_report = report;
                    last_error = None;
                }
                Err(e) if e.is_retryable() => {
                    warn!("Gap analysis attempt {attempt} failed with retryable error: {e}");
                    last_error = Some(e.to_string());
                }
                Err(e) => {
                    warn!("Gap analysis failed with non-retryable error: {e}");
                    return Err(GapAnalysisError::Llm(e));
                }
            }

            if attempt < max_attempts {
                self.events.track_event(
                    "GapAnalysisRetryAttempt",
                    props! {
                        "attempt" => attempt,
                        "next_attempt" => attempt + 1,
                        "max_attempts" => max_attempts,
                        "empty_fields" => last_report.names(),
                        "error" => last_error.clone(),
                        "language" => language.tag(),
                        "retry_delay_ms" => self.settings.retry_delay.as_millis() as u64,
                    },
                );
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }

        warn!("Gap analysis retries exhausted after {max_attempts} attempts");
        self.events.track_event(
            "GapAnalysisRetryExhausted",
            props! {
                "attempts" => max_attempts,
                "empty_fields" => last_report.names(),
                "error" => last_error,
                "language" => language.tag(),
            },
        );

        let mut analysis = last_output.unwrap_or_else(FormattedGapAnalysis::fallback);
        let fallback_fields = check_empty(&analysis);
        for field in fallback_fields.fields() {
            analysis.apply_fallback(field);
        }

        if !fallback_fields.is_empty() {
            self.events.track_event(
                "GapAnalysisEmptyFields",
                props! {
                    "empty_fields" => fallback_fields.names(),
                    "attempts" => max_attempts,
                    "language" => language.tag(),
                },
            );
        }
        self.track_completed(max_attempts, language, &fallback_fields);

        Ok(GapAnalysisOutcome {
            analysis,
            attempts: max_attempts,
            fallback_fields,
            usage,
            prompt_version: version,
        })
    }

    fn build_messages(&self, request: &GapAnalysisRequest, version: &str) -> Result<Vec<ChatMessage>, GapAnalysisError> {
        let config = self
            .prompts
            .prompt_config(PromptTask::GapAnalysis, request.language, Some(version))?;

        let variables: HashMap<&str, String> = HashMap::from([
            ("job_description", request.job_description.clone()),
            ("resume", request.resume.clone()),
            ("job_keywords", join_or_none(&request.job_keywords)),
            ("matched_keywords", join_or_none(&request.matched_keywords)),
            ("missing_keywords", join_or_none(&request.missing_keywords)),
        ]);
        let user_prompt = config.format_user_prompt(&variables)?;

        Ok(vec![
            ChatMessage::system(config.system_prompt()),
            ChatMessage::user(user_prompt),
        ])
    }

    fn track_usage(&self, response: &ChatResponse, attempt: u32, language: Language, version: &str) {
        if response.finish_reason == "length" {
            warn!("Gap analysis response truncated at max_tokens on attempt {attempt}");
        }
        self.events.track_event(
            "LlmTokenUsage",
            props! {
                "operation" => "gap_analysis",
                "attempt" => attempt,
                "prompt_tokens" => response.usage.prompt_tokens,
                "completion_tokens" => response.usage.completion_tokens,
                "total_tokens" => response.usage.total(),
                "finish_reason" => response.finish_reason.as_str(),
                "language" => language.tag(),
                "prompt_version" => version,
            },
        );
        self.events.track_metric(
            "LlmTotalTokens",
            response.usage.total() as f64,
            props! { "operation" => "gap_analysis" },
        );
    }

    fn track_completed(&self, attempts: u32, language: Language, fallback_fields: &EmptinessReport) {
        self.events.track_event(
            "GapAnalysisCompleted",
            props! {
                "attempts" => attempts,
                "language" => language.tag(),
                "fallback_fields" => fallback_fields.names(),
            },
        );
    }
}

fn join_or_none(keywords: &[String]) -> String {
    if keywords.is_empty() {
        "None".to_string()
    } else {
        keywords.join(", ")
    }
}

/// Rejects requests that can never produce a meaningful analysis.
pub fn validate_request(request: &GapAnalysisRequest) -> Result<(), GapAnalysisError> {
    if request.job_description.trim().is_empty() {
        return Err(GapAnalysisError::Validation("job_description is required".to_string()));
    }
    if request.resume.trim().is_empty() {
        return Err(GapAnalysisError::Validation("resume is required".to_string()));
    }

    let job: HashSet<&str> = request.job_keywords.iter().map(String::as_str).collect();
    let matched: HashSet<&str> = request.matched_keywords.iter().map(String::as_str).collect();
    let missing: HashSet<&str> = request.missing_keywords.iter().map(String::as_str).collect();

    if let Some(both) = matched.intersection(&missing).next() {
        return Err(GapAnalysisError::Validation(format!(
            "Keyword '{both}' is listed as both matched and missing"
        )));
    }
    let union: HashSet<&str> = matched.union(&missing).copied().collect();
    if union != job {
        return Err(GapAnalysisError::Validation(
            "matched_keywords and missing_keywords must together equal job_keywords".to_string(),
        ));
    }
    Ok(())
}
