/// LLM Client: the single point of entry for all chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call Azure OpenAI directly.
/// Services depend on the `ChatCompletion` trait; `AzureOpenAiClient` is the
/// production implementation and tests substitute scripted fakes.
///
/// Transport-level retries (429 / 5xx, exponential backoff) live here. Retries
/// driven by output quality live in the services that own the output.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const MAX_RETRIES: u32 = 3;
const MAX_COMPLETION_TOKENS: u32 = 4000;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication failed (status {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned no choices")]
    EmptyContent,
}

impl LlmError {
    /// Transient failures worth another attempt: timeouts, connection errors,
    /// rate limiting and server-side errors. Auth and malformed-request errors
    /// are deployment problems and never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(e) => e.is_timeout() || e.is_connect(),
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::RateLimited { .. } => true,
            LlmError::Parse(_) | LlmError::EmptyContent => true,
            LlmError::Auth { .. } => false,
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// The capability result: generated text, token counters and finish reason.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
    /// "stop", "length" (truncated), "content_filter", ...
    pub finish_reason: String,
}

/// The chat-completion capability every LLM-backed service depends on.
///
/// Carried in services as `Arc<dyn ChatCompletion>`.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn chat_complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ChatResponse, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Azure OpenAI wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AzureError {
    error: AzureErrorBody,
}

#[derive(Debug, Deserialize)]
struct AzureErrorBody {
    message: String,
}

impl ChatCompletionBody {
    fn into_response(self) -> Result<ChatResponse, LlmError> {
        let usage = self
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let choice = self.choices.into_iter().next().ok_or(LlmError::EmptyContent)?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AzureOpenAiClient
// ────────────────────────────────────────────────────────────────────────────

/// Settings for the Azure OpenAI deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAiSettings {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    pub timeout: Duration,
}

/// Production `ChatCompletion` backed by an Azure OpenAI chat deployment.
#[derive(Clone)]
pub struct AzureOpenAiClient {
    client: Client,
    url: String,
    api_key: String,
    api_version: String,
}

impl AzureOpenAiClient {
    pub fn new(settings: AzureOpenAiSettings) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            url: deployment_url(&settings.endpoint, &settings.deployment),
            api_key: settings.api_key,
            api_version: settings.api_version,
        })
    }
}

#[async_trait]
impl ChatCompletion for AzureOpenAiClient {
    /// Calls the chat completions endpoint.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    async fn chat_complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ChatResponse, LlmError> {
        let request_body = ChatCompletionRequest {
            messages,
            temperature: temperature.clamp(0.0, 1.0),
            max_tokens: max_tokens.clamp(1, MAX_COMPLETION_TOKENS),
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(attempt);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.url)
                .query(&[("api-version", self.api_version.as_str())])
                .header("api-key", &self.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!("LLM transport error: {e}");
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
                Err(e) => return Err(LlmError::Http(e)),
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AzureError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                if status.as_u16() == 401 || status.as_u16() == 403 {
                    return Err(LlmError::Auth {
                        status: status.as_u16(),
                        message,
                    });
                }
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: ChatCompletionBody = response.json().await?;
            let chat_response = body.into_response()?;

            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}, finish_reason={}",
                chat_response.usage.prompt_tokens,
                chat_response.usage.completion_tokens,
                chat_response.finish_reason
            );

            return Ok(chat_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

fn deployment_url(endpoint: &str, deployment: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions",
        endpoint.trim_end_matches('/'),
        deployment
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Output cleanup helpers
// ────────────────────────────────────────────────────────────────────────────

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Normalises free-form LLM output before tag extraction: drops code-fence
/// marker lines and collapses runs of blank lines.
pub fn clean_llm_output(content: &str) -> String {
    let mut cleaned: Vec<&str> = Vec::new();
    let mut blank_run = 0;

    for line in content.lines() {
        if line.trim_start().starts_with("```") {
            continue;
        }
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        cleaned.push(line);
    }

    cleaned.join("\n").trim().to_string()
}

/// Backoff before transport attempt `attempt` (1-based retries): 1s, 2s, ...
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(1000 * (1 << attempt.saturating_sub(1)))
}

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;

    /// Scripted `ChatCompletion`: pops one queued result per call and repeats
    /// `fallback` when the queue is empty.
    pub struct ScriptedLlm {
        queue: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
        fallback: Option<String>,
        delay: Option<Duration>,
        calls: AtomicU32,
        pub seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        pub fn always(content: &str) -> Self {
            Self::new(Vec::new(), Some(content.to_string()))
        }

        pub fn sequence(results: Vec<Result<ChatResponse, LlmError>>) -> Self {
            Self::new(results, None)
        }

        pub fn new(results: Vec<Result<ChatResponse, LlmError>>, fallback: Option<String>) -> Self {
            Self {
                queue: Mutex::new(results.into()),
                fallback,
                delay: None,
                calls: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    pub fn response(content: &str) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            usage: TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 50,
            },
            finish_reason: "stop".to_string(),
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedLlm {
        async fn chat_complete(
            &self,
            messages: &[ChatMessage],
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<ChatResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(messages.to_vec());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.queue.lock().pop_front();
            match next {
                Some(result) => result,
                None => Ok(response(self.fallback.as_deref().unwrap_or_default())),
            }
        }
    }
}
