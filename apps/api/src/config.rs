use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::gap_analysis::coverage::CoverageSettings;
use crate::gap_analysis::orchestrator::GapAnalysisSettings;
use crate::llm_client::AzureOpenAiSettings;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub azure_openai_endpoint: String,
    pub azure_openai_api_key: String,
    pub azure_openai_deployment: String,
    pub azure_openai_api_version: String,
    pub llm_timeout_secs: u64,
    pub port: u16,
    pub rust_log: String,
    pub prompts_dir: String,
    pub standardization_dir: String,
    pub gap_analysis_temperature: f32,
    pub gap_analysis_max_tokens: u32,
    pub gap_analysis_max_attempts: u32,
    pub gap_analysis_retry_delay_ms: u64,
    pub keyword_match_case_sensitive: bool,
    pub enable_plural_matching: bool,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            azure_openai_endpoint: require_env("AZURE_OPENAI_ENDPOINT")?,
            azure_openai_api_key: require_env("AZURE_OPENAI_API_KEY")?,
            azure_openai_deployment: env_or("AZURE_OPENAI_DEPLOYMENT", "gpt-4o-2"),
            azure_openai_api_version: env_or("AZURE_OPENAI_API_VERSION", "2024-02-15-preview"),
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 60)?,
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
            prompts_dir: env_or("PROMPTS_DIR", "prompts"),
            standardization_dir: env_or("STANDARDIZATION_DIR", "data/standardization"),
            gap_analysis_temperature: parse_env("GAP_ANALYSIS_TEMPERATURE", 0.7)?,
            gap_analysis_max_tokens: parse_env("GAP_ANALYSIS_MAX_TOKENS", 2000)?,
            gap_analysis_max_attempts: parse_env("GAP_ANALYSIS_MAX_ATTEMPTS", 3)?,
            gap_analysis_retry_delay_ms: parse_env("GAP_ANALYSIS_RETRY_DELAY_MS", 1000)?,
            keyword_match_case_sensitive: parse_env("KEYWORD_MATCH_CASE_SENSITIVE", false)?,
            enable_plural_matching: parse_env("ENABLE_PLURAL_MATCHING", true)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 120)?,
        })
    }

    pub fn llm_settings(&self) -> AzureOpenAiSettings {
        AzureOpenAiSettings {
            endpoint: self.azure_openai_endpoint.clone(),
            api_key: self.azure_openai_api_key.clone(),
            deployment: self.azure_openai_deployment.clone(),
            api_version: self.azure_openai_api_version.clone(),
            timeout: Duration::from_secs(self.llm_timeout_secs),
        }
    }

    pub fn gap_analysis_settings(&self) -> GapAnalysisSettings {
        GapAnalysisSettings {
            max_attempts: self.gap_analysis_max_attempts,
            retry_delay: Duration::from_millis(self.gap_analysis_retry_delay_ms),
            temperature: self.gap_analysis_temperature,
            max_tokens: self.gap_analysis_max_tokens,
        }
    }

    pub fn coverage_settings(&self) -> CoverageSettings {
        CoverageSettings {
            case_sensitive: self.keyword_match_case_sensitive,
            plural_matching: self.enable_plural_matching,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .to_ascii_lowercase()
        .parse::<T>()
        .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'"))
}
