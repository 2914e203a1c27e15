//! Keyword extraction service.
//!
//! Flow: language → prompt → two concurrent LLM rounds → intersection →
//! standardization. Both rounds coming back without a single keyword counts as
//! a bad attempt and is retried, as are retryable transport errors.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::intersection::{select, IntersectionSettings, IntersectionStats, Strategy};
use super::parsing::{dedupe, parse_keywords};
use crate::language::{Language, LanguageDetector, LanguageError};
use crate::llm_client::prompts::{LlmConfig, PromptConfig, PromptError, PromptProvider, PromptTask};
use crate::llm_client::{ChatCompletion, ChatMessage, LlmError, TokenUsage};
use crate::models::response::{WarningInfo, EXPECTED_MINIMUM_KEYWORDS};
use crate::props;
use crate::standardization::{KeywordStandardizer, Standardized};
use crate::telemetry::EventSink;

pub const DEFAULT_PROMPT_VERSION: &str = "1.4.0";
pub const MIN_JOB_DESCRIPTION_CHARS: usize = 50;
pub const MAX_JOB_DESCRIPTION_CHARS: usize = 20_000;
pub const MIN_MAX_KEYWORDS: usize = 5;
pub const MAX_MAX_KEYWORDS: usize = 25;

const SUGGESTION: &str =
    "Provide more detailed skill requirements, responsibilities or qualifications in the job description";

#[derive(Debug, Error)]
pub enum KeywordExtractionError {
    #[error("{0}")]
    Validation(String),

    #[error("Prompt configuration error: {0}")]
    Configuration(#[from] PromptError),

    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone)]
pub struct KeywordExtractionSettings {
    pub keywords_per_round: usize,
    pub min_intersection: usize,
    /// Attempts allowed when both rounds come back empty or fail transiently.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for KeywordExtractionSettings {
    fn default() -> Self {
        Self {
            keywords_per_round: 25,
            min_intersection: 12,
            max_attempts: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub max_keywords: usize,
    pub include_standardization: bool,
    /// `None` picks the newest configured version.
    pub prompt_version: Option<String>,
    /// `en`, `zh-TW` or `auto`.
    pub language: String,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            max_keywords: 16,
            include_standardization: true,
            prompt_version: Some(DEFAULT_PROMPT_VERSION.to_string()),
            language: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    PureIntersection,
    Supplement,
    SkippedUnsupportedLanguage,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordExtraction {
    pub keywords: Vec<String>,
    pub keyword_count: usize,
    pub standardized_terms: Vec<Standardized>,
    pub confidence_score: f64,
    pub extraction_method: ExtractionMethod,
    pub intersection_stats: IntersectionStats,
    pub prompt_version: String,
    pub detected_language: String,
    pub input_language: String,
    pub processing_time_ms: u64,
    pub attempts: u32,
    pub usage: TokenUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_config_used: Option<LlmConfig>,
    /// Surfaced in the envelope's `warning`, not in `data`.
    #[serde(skip)]
    pub warning: Option<WarningInfo>,
}

/// Outcome of language resolution for extraction.
enum ResolvedLanguage {
    Supported(Language),
    Unsupported(String),
}

pub struct KeywordExtractionService {
    llm: Arc<dyn ChatCompletion>,
    prompts: Arc<dyn PromptProvider>,
    events: Arc<dyn EventSink>,
    detector: Arc<LanguageDetector>,
    standardizer: Arc<KeywordStandardizer>,
    settings: KeywordExtractionSettings,
}

impl KeywordExtractionService {
    pub fn new(
        llm: Arc<dyn ChatCompletion>,
        prompts: Arc<dyn PromptProvider>,
        events: Arc<dyn EventSink>,
        detector: Arc<LanguageDetector>,
        standardizer: Arc<KeywordStandardizer>,
        settings: KeywordExtractionSettings,
    ) -> Self {
        Self {
            llm,
            prompts,
            events,
            detector,
            standardizer,
            settings,
        }
    }

    pub async fn extract(
        &self,
        job_description: &str,
        options: &ExtractionOptions,
    ) -> Result<KeywordExtraction, KeywordExtractionError> {
        let started = Instant::now();
        let job_description = job_description.trim();
        validate(job_description, options)?;

        info!(
            "Starting keyword extraction: language={}, version={:?}, max_keywords={}",
            options.language, options.prompt_version, options.max_keywords
        );

        let language = match self.resolve_language(&options.language, job_description)? {
            ResolvedLanguage::Supported(language) => language,
            ResolvedLanguage::Unsupported(detected) => {
                return Ok(self.skipped(&detected, job_description, options, started));
            }
        };

        let config = self
            .prompts
            .prompt_config(PromptTask::KeywordExtraction, language, options.prompt_version.as_deref())
            .map_err(|e| match e {
                // Requested version does not exist.
                PromptError::NotFound { .. } => KeywordExtractionError::Validation(e.to_string()),
                e => e.into(),
            })?;
        let messages = build_messages(&config, job_description, self.settings.keywords_per_round)?;

        let max_attempts = self.settings.max_attempts.max(1);
        let mut usage = TokenUsage::default();
        let mut rounds: Option<(Vec<String>, Vec<String>)> = None;
        let mut last_error: Option<LlmError> = None;
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            attempts = attempt;
            let result = tokio::try_join!(
                self.run_round(&messages, &config.llm_config, 1, attempt),
                self.run_round(&messages, &config.llm_config, 2, attempt),
            );

            match result {
                Ok(((round1, usage1), (round2, usage2))) => {
                    for u in [usage1, usage2] {
                        usage.prompt_tokens += u.prompt_tokens;
                        usage.completion_tokens += u.completion_tokens;
                    }
                    last_error = None;
                    if !(round1.is_empty() && round2.is_empty()) {
                        rounds = Some((round1, round2));
                        break;
                    }
                    warn!("Keyword extraction attempt {attempt} returned no keywords in either round");
                    rounds = Some((round1, round2));
                }
                Err(e) if e.is_retryable() => {
                    warn!("Keyword extraction attempt {attempt} failed with retryable error: {e}");
                    last_error = Some(e);
                }
                Err(e) => return Err(e.into()),
            }

            if attempt < max_attempts {
                self.events.track_event(
                    "KeywordExtractionRetryAttempt",
                    props! {
                        "attempt" => attempt,
                        "next_attempt" => attempt + 1,
                        "max_attempts" => max_attempts,
                        "error" => last_error.as_ref().map(|e| e.to_string()),
                        "language" => language.tag(),
                    },
                );
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }

        let (round1, round2) = match (rounds, last_error) {
            (_, Some(e)) => return Err(e.into()),
            (Some(rounds), None) => rounds,
            (None, None) => (Vec::new(), Vec::new()),
        };

        let selection = select(
            &round1,
            &round2,
            IntersectionSettings {
                min_intersection: self.settings.min_intersection,
                expected_minimum: EXPECTED_MINIMUM_KEYWORDS,
                max_keywords: options.max_keywords,
            },
        );

        let (keywords, standardized_terms) = if options.include_standardization {
            let (standardized, changes) = self.standardizer.standardize_keywords(&selection.keywords);
            (dedupe(standardized, options.max_keywords), changes)
        } else {
            (selection.keywords.clone(), Vec::new())
        };

        let mut stats = selection.stats;
        stats.final_count = keywords.len();

        let warning = stats
            .warning
            .then(|| WarningInfo::new(stats.warning_message.clone(), keywords.len(), SUGGESTION));
        let extraction_method = match stats.strategy_used {
            Strategy::PureIntersection => ExtractionMethod::PureIntersection,
            Strategy::Supplement | Strategy::None => ExtractionMethod::Supplement,
        };
        let confidence_score =
            (stats.intersection_count as f64 / self.settings.keywords_per_round as f64).min(1.0);

        self.events.track_event(
            "KeywordExtractionCompleted",
            props! {
                "language" => language.tag(),
                "prompt_version" => config.version.as_str(),
                "strategy" => extraction_method,
                "keyword_count" => keywords.len(),
                "intersection_count" => stats.intersection_count,
                "attempts" => attempts,
                "warning" => stats.warning,
                "total_tokens" => usage.total(),
            },
        );
        info!(
            "Keyword extraction completed: {} keywords via {:?} ({} shared)",
            keywords.len(),
            extraction_method,
            stats.intersection_count
        );

        Ok(KeywordExtraction {
            keyword_count: keywords.len(),
            keywords,
            standardized_terms,
            confidence_score,
            extraction_method,
            intersection_stats: stats,
            prompt_version: config.version.clone(),
            detected_language: language.tag().to_string(),
            input_language: options.language.clone(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            attempts,
            usage,
            llm_config_used: Some(config.llm_config.clone()),
            warning,
        })
    }

    fn resolve_language(&self, requested: &str, text: &str) -> Result<ResolvedLanguage, KeywordExtractionError> {
        let requested = requested.trim();
        if !requested.eq_ignore_ascii_case("auto") {
            return Language::from_tag(requested)
                .map(ResolvedLanguage::Supported)
                .ok_or_else(|| {
                    KeywordExtractionError::Validation(format!(
                        "Language '{requested}' not supported. Supported: auto, en, zh-TW"
                    ))
                });
        }

        match self.detector.detect(text) {
            Ok(detection) => Ok(ResolvedLanguage::Supported(detection.language)),
            Err(LanguageError::UnsupportedLanguage { detected, .. }) => {
                Ok(ResolvedLanguage::Unsupported(detected))
            }
            Err(e) => {
                warn!("Language detection inconclusive, falling back to en: {e}");
                self.events.track_event(
                    "LanguageDetectionFallback",
                    props! { "reason" => e.code(), "fallback" => "en", "operation" => "keyword_extraction" },
                );
                Ok(ResolvedLanguage::Supported(Language::En))
            }
        }
    }

    /// One extraction round: call, parse, de-duplicate, cap.
    async fn run_round(
        &self,
        messages: &[ChatMessage],
        llm_config: &LlmConfig,
        round: u32,
        attempt: u32,
    ) -> Result<(Vec<String>, TokenUsage), LlmError> {
        let response = self
            .llm
            .chat_complete(messages, llm_config.temperature, llm_config.max_tokens)
            .await?;

        self.events.track_event(
            "LlmTokenUsage",
            props! {
                "operation" => "keyword_extraction",
                "round" => round,
                "attempt" => attempt,
                "prompt_tokens" => response.usage.prompt_tokens,
                "completion_tokens" => response.usage.completion_tokens,
                "total_tokens" => response.usage.total(),
                "finish_reason" => response.finish_reason.as_str(),
            },
        );
        self.events.track_metric(
            "LlmTotalTokens",
            response.usage.total() as f64,
            props! { "operation" => "keyword_extraction" },
        );

        let keywords = dedupe(parse_keywords(&response.content), self.settings.keywords_per_round);
        info!("Round {round}: extracted {} keywords", keywords.len());
        Ok((keywords, response.usage))
    }

    /// Result for text in a language the prompts do not cover. No LLM call is made.
    fn skipped(
        &self,
        detected: &str,
        job_description: &str,
        options: &ExtractionOptions,
        started: Instant,
    ) -> KeywordExtraction {
        warn!("Unsupported language detected: {detected}, skipping LLM calls");
        let message =
            format!("Language {detected} is not supported. Only English and Traditional Chinese are supported.");

        self.events.track_event(
            "UnsupportedLanguageSkipped",
            props! {
                "detected_language" => detected,
                "jd_preview" => preview(job_description),
                "jd_length" => job_description.chars().count(),
                "requested_language" => options.language.as_str(),
            },
        );

        KeywordExtraction {
            keywords: Vec::new(),
            keyword_count: 0,
            standardized_terms: Vec::new(),
            confidence_score: 0.0,
            extraction_method: ExtractionMethod::SkippedUnsupportedLanguage,
            intersection_stats: IntersectionStats {
                warning: true,
                warning_message: message.clone(),
                ..Default::default()
            },
            prompt_version: options
                .prompt_version
                .clone()
                .unwrap_or_else(|| "latest".to_string()),
            detected_language: detected.to_string(),
            input_language: options.language.clone(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            attempts: 0,
            usage: TokenUsage::default(),
            llm_config_used: None,
            warning: Some(WarningInfo::new(
                message,
                0,
                "Please provide the job description in English or Traditional Chinese",
            )),
        }
    }
}

fn validate(job_description: &str, options: &ExtractionOptions) -> Result<(), KeywordExtractionError> {
    let length = job_description.chars().count();
    if length < MIN_JOB_DESCRIPTION_CHARS {
        return Err(KeywordExtractionError::Validation(format!(
            "Job description too short ({length} characters, minimum {MIN_JOB_DESCRIPTION_CHARS})"
        )));
    }
    if length > MAX_JOB_DESCRIPTION_CHARS {
        return Err(KeywordExtractionError::Validation(format!(
            "Job description too long ({length} characters, maximum {MAX_JOB_DESCRIPTION_CHARS})"
        )));
    }
    if !(MIN_MAX_KEYWORDS..=MAX_MAX_KEYWORDS).contains(&options.max_keywords) {
        return Err(KeywordExtractionError::Validation(format!(
            "max_keywords must be between {MIN_MAX_KEYWORDS} and {MAX_MAX_KEYWORDS}"
        )));
    }
    Ok(())
}

fn build_messages(
    config: &PromptConfig,
    job_description: &str,
    keyword_count: usize,
) -> Result<Vec<ChatMessage>, PromptError> {
    let variables: HashMap<&str, String> = HashMap::from([
        ("job_description", job_description.to_string()),
        ("keyword_count", keyword_count.to_string()),
    ]);
    Ok(vec![
        ChatMessage::system(config.system_prompt()),
        ChatMessage::user(config.format_user_prompt(&variables)?),
    ])
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(100).collect();
    if text.chars().count() > 100 {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::testing::FixedIdentifier;
    use crate::llm_client::prompts::testing::{NoPrompts, StaticPrompts};
    use crate::llm_client::testing::{response, ScriptedLlm};
    use crate::telemetry::testing::RecordingSink;

    const JD: &str = "We are hiring a Senior Python Developer with FastAPI, Docker, \
                      Kubernetes and AWS experience to build our data platform.";

    struct Harness {
        llm: Arc<ScriptedLlm>,
        events: Arc<RecordingSink>,
        service: KeywordExtractionService,
    }

    fn harness(llm: ScriptedLlm) -> Harness {
        harness_with(llm, Arc::new(StaticPrompts::new("system", "{keyword_count}: {job_description}")), ("en", 0.99))
    }

    fn harness_with(llm: ScriptedLlm, prompts: Arc<dyn PromptProvider>, detected: (&'static str, f64)) -> Harness {
        let llm = Arc::new(llm);
        let events = Arc::new(RecordingSink::default());
        let standardizer = KeywordStandardizer::load(concat!(env!("CARGO_MANIFEST_DIR"), "/data/standardization"))
            .expect("standardization data loads");
        let service = KeywordExtractionService::new(
            llm.clone(),
            prompts,
            events.clone(),
            Arc::new(LanguageDetector::new(Box::new(FixedIdentifier(detected.0, detected.1)))),
            Arc::new(standardizer),
            KeywordExtractionSettings::default(),
        );
        Harness { llm, events, service }
    }

    fn keyword_json(keywords: &[String]) -> String {
        serde_json::json!({ "keywords": keywords }).to_string()
    }

    fn numbered(prefix: &str, count: usize) -> Vec<String> {
        (0..count).map(|i| format!("{prefix} {i}")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_pure_intersection_path() {
        let shared = numbered("Skill", 14);
        let h = harness(ScriptedLlm::always(&keyword_json(&shared)));

        let result = h.service.extract(JD, &ExtractionOptions::default()).await.unwrap();
        assert_eq!(h.llm.calls(), 2);
        assert_eq!(result.extraction_method, ExtractionMethod::PureIntersection);
        assert_eq!(result.keyword_count, 14);
        assert_eq!(result.intersection_stats.intersection_count, 14);
        assert!((result.confidence_score - 14.0 / 25.0).abs() < 1e-9);
        assert!(result.warning.is_none());
        assert_eq!(result.detected_language, "en");
        assert_eq!(result.attempts, 1);
        assert_eq!(h.events.events_named("KeywordExtractionCompleted").len(), 1);
        assert_eq!(h.events.events_named("LlmTokenUsage").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_receives_round_size_and_description() {
        let h = harness(ScriptedLlm::always(&keyword_json(&numbered("Skill", 12))));
        h.service.extract(JD, &ExtractionOptions::default()).await.unwrap();

        let seen = h.llm.seen.lock();
        assert_eq!(seen[0][1].content, format!("25: {JD}"));
        assert_eq!(seen[0], seen[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supplement_with_warning_and_standardization() {
        let round1: Vec<String> = ["python", "ml algorithms", "k8s"].map(String::from).to_vec();
        let round2: Vec<String> = ["Python", "Docker"].map(String::from).to_vec();
        let h = harness(ScriptedLlm::sequence(vec![
            Ok(response(&keyword_json(&round1))),
            Ok(response(&keyword_json(&round2))),
        ]));

        let result = h.service.extract(JD, &ExtractionOptions::default()).await.unwrap();
        assert_eq!(result.extraction_method, ExtractionMethod::Supplement);
        assert_eq!(result.intersection_stats.intersection_count, 1);
        assert_eq!(result.keywords, vec!["Python", "Machine Learning", "Kubernetes", "Docker"]);
        assert!(result.standardized_terms.iter().any(|t| t.original == "ml algorithms"));

        let warning = result.warning.expect("few keywords warn");
        assert!(warning.has_warning);
        assert_eq!(warning.actual_extracted, 4);
        assert_eq!(warning.expected_minimum, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_standardization_can_be_disabled() {
        let h = harness(ScriptedLlm::always(&keyword_json(&["k8s".to_string()])));
        let options = ExtractionOptions {
            include_standardization: false,
            ..Default::default()
        };

        let result = h.service.extract(JD, &options).await.unwrap();
        assert_eq!(result.keywords, vec!["k8s"]);
        assert!(result.standardized_terms.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_rounds_retry_within_budget() {
        let h = harness(ScriptedLlm::always(r#"{"keywords": []}"#));
        let result = h.service.extract(JD, &ExtractionOptions::default()).await.unwrap();
        assert_eq!(h.llm.calls(), 4);
        assert_eq!(result.attempts, 2);
        assert!(result.keywords.is_empty());
        assert!(result.warning.is_some());
        assert_eq!(h.events.events_named("KeywordExtractionRetryAttempt").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_error_then_success() {
        let good = keyword_json(&numbered("Skill", 12));
        let h = harness(ScriptedLlm::new(
            vec![
                Err(LlmError::Api { status: 503, message: "busy".into() }),
                Ok(response(&good)),
            ],
            Some(good.clone()),
        ));

        let result = h.service.extract(JD, &ExtractionOptions::default()).await.unwrap();
        assert_eq!(result.attempts, 2);
        assert_eq!(result.keyword_count, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_propagates() {
        let h = harness(ScriptedLlm::sequence(vec![
            Err(LlmError::Auth { status: 401, message: "bad key".into() }),
            Ok(response("{}")),
        ]));
        let err = h.service.extract(JD, &ExtractionOptions::default()).await.unwrap_err();
        assert!(matches!(err, KeywordExtractionError::Llm(LlmError::Auth { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_language_skips_llm() {
        let h = harness_with(
            ScriptedLlm::always("{}"),
            Arc::new(StaticPrompts::new("s", "{job_description}")),
            ("fr", 0.99),
        );
        let result = h.service.extract(JD, &ExtractionOptions::default()).await.unwrap();
        assert_eq!(h.llm.calls(), 0);
        assert_eq!(result.extraction_method, ExtractionMethod::SkippedUnsupportedLanguage);
        assert_eq!(result.detected_language, "fr");
        assert!(result.warning.is_some());
        assert_eq!(h.events.events_named("UnsupportedLanguageSkipped").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_errors() {
        let h = harness(ScriptedLlm::always("{}"));
        let short = h.service.extract("too short", &ExtractionOptions::default()).await;
        assert!(matches!(short, Err(KeywordExtractionError::Validation(_))));

        let options = ExtractionOptions {
            max_keywords: 40,
            ..Default::default()
        };
        assert!(matches!(
            h.service.extract(JD, &options).await,
            Err(KeywordExtractionError::Validation(_))
        ));

        let options = ExtractionOptions {
            language: "fr".into(),
            ..Default::default()
        };
        assert!(matches!(
            h.service.extract(JD, &options).await,
            Err(KeywordExtractionError::Validation(_))
        ));
        assert_eq!(h.llm.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_prompt_is_configuration_error() {
        let h = harness_with(ScriptedLlm::always("{}"), Arc::new(NoPrompts), ("en", 0.99));
        let err = h.service.extract(JD, &ExtractionOptions::default()).await.unwrap_err();
        assert!(matches!(err, KeywordExtractionError::Configuration(_)));
        assert_eq!(h.llm.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_requested_version_is_validation_error() {
        let prompts = crate::llm_client::prompts::YamlPromptProvider::new(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts"));
        let h = harness_with(ScriptedLlm::always("{}"), Arc::new(prompts), ("en", 0.99));
        let options = ExtractionOptions {
            prompt_version: Some("9.9.9".into()),
            ..Default::default()
        };
        let err = h.service.extract(JD, &options).await.unwrap_err();
        assert!(matches!(err, KeywordExtractionError::Validation(_)));
        assert_eq!(h.llm.calls(), 0);
    }

    #[test]
    fn test_preview_truncates() {
        let long = "a".repeat(150);
        assert_eq!(preview(&long).len(), 103);
        assert_eq!(preview("short"), "short");
    }
}
