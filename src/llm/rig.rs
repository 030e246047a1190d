//! rig-core integration for the generative backend.
//!
//! Uses rig-core's provider clients and Agent abstraction for multi-provider
//! support: Anthropic, OpenAI, Gemini, DeepSeek, Groq, and any
//! OpenAI-compatible API. Transient API failures are retried with
//! exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;

use crate::config::LlmConfig;
use crate::models::ModelProvider;

use super::{LlmError, TextGenerator};

/// Maximum tokens per LLM completion response.
///
/// Set high enough to accommodate thinking models that consume part of
/// the budget for internal reasoning tokens.
const MAX_TOKENS: u64 = 16384;

/// Fixed system preamble. The task itself travels in the user prompt.
const PREAMBLE: &str = "You are a pull request review assistant. Answer with a single JSON object.";

/// Maximum number of retry attempts for transient API errors.
pub const MAX_RETRIES: u32 = 5;

/// Initial backoff delay between retries.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(10);

/// Maximum backoff delay between retries.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Build an agent from a rig-core client and prompt it once.
///
/// Always sets `max_tokens`; without it some providers default to a low
/// limit that truncates responses.
macro_rules! prompt_simple {
    ($client:expr, $model:expr, $user:expr, $label:expr) => {{
        let agent = $client
            .agent($model)
            .preamble(PREAMBLE)
            .temperature(0.0)
            .max_tokens(MAX_TOKENS)
            .build();
        agent
            .prompt($user)
            .await
            .map_err(|e| LlmError::ApiError(format!("{} API error: {e}", $label)))
    }};
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key)
            .map_err(|e| LlmError::ApiError(format!("failed to create {} client: {e}", $label)))
    }};
}

/// rig-core based text generator.
///
/// The provider in config selects which rig-core client to use.
pub struct RigGenerator {
    config: LlmConfig,
}

impl RigGenerator {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.is_none() {
            return Err(LlmError::NotConfigured(format!(
                "no API key found for provider '{}'. Set {} or {}.",
                config.provider,
                crate::constants::ENV_API_KEY,
                config.provider.api_key_env_var()
            )));
        }
        Ok(Self { config })
    }

    fn build_openai_client(&self, api_key: &str) -> Result<providers::openai::CompletionsClient, LlmError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(api_key);
        if let Some(ref base_url) = self.config.base_url {
            builder = builder.base_url(base_url);
        }
        builder
            .build()
            .map_err(|e| LlmError::ApiError(format!("failed to create OpenAI client: {e}")))
    }

    /// Require `base_url` for OpenAI-compatible providers.
    fn require_base_url(&self) -> Result<&str, LlmError> {
        self.config.base_url.as_deref().ok_or_else(|| {
            LlmError::NotConfigured("openai-compatible provider requires base_url to be set".to_string())
        })
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::NotConfigured("missing API key".to_string()))
    }

    /// One completion call, no retries.
    async fn call_rig(&self, user_prompt: &str) -> Result<String, LlmError> {
        let api_key = self.api_key()?;
        let model = self.config.model.as_str();

        match self.config.provider {
            ModelProvider::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| LlmError::ApiError(format!("failed to create Anthropic client: {e}")))?;
                prompt_simple!(client, model, user_prompt, "Anthropic")
            }
            ModelProvider::OpenAI => {
                let client = self.build_openai_client(api_key)?;
                prompt_simple!(client, model, user_prompt, "OpenAI")
            }
            ModelProvider::Gemini => {
                let client = new_client!(providers::gemini::Client, api_key, "Gemini")?;
                prompt_simple!(client, model, user_prompt, "Gemini")
            }
            ModelProvider::DeepSeek => {
                let client = new_client!(providers::deepseek::Client, api_key, "DeepSeek")?;
                prompt_simple!(client, model, user_prompt, "DeepSeek")
            }
            ModelProvider::Groq => {
                let client = new_client!(providers::groq::Client, api_key, "Groq")?;
                prompt_simple!(client, model, user_prompt, "Groq")
            }
            ModelProvider::OpenAICompatible => {
                let base_url = self.require_base_url()?;
                let client: providers::openai::CompletionsClient =
                    providers::openai::CompletionsClient::builder()
                        .api_key(api_key)
                        .base_url(base_url)
                        .build()
                        .map_err(|e| {
                            LlmError::ApiError(format!("failed to create OpenAI-compatible client: {e}"))
                        })?;
                prompt_simple!(client, model, user_prompt, "OpenAI-compatible")
            }
        }
    }
}

#[async_trait]
impl TextGenerator for RigGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.call_rig(prompt).await {
                Ok(text) if text.trim().is_empty() => return Err(LlmError::Empty),
                Ok(text) => return Ok(text),
                Err(e) if is_retryable(&e) && attempt < MAX_RETRIES => {
                    let backoff = retry_backoff(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = MAX_RETRIES + 1,
                        backoff_secs = backoff.as_secs(),
                        "{}, retrying",
                        classify_error(&e).unwrap_or("Transient error")
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn describe(&self) -> String {
        format!("provider={} model={}", self.config.provider, self.config.model)
    }
}

/// Check whether an error is transient and worth retrying.
///
/// Matches HTTP status codes commonly used for rate limiting and
/// temporary unavailability: 429, 503, 529, and connection/timeout errors.
pub fn is_retryable(err: &LlmError) -> bool {
    classify_error(err).is_some()
}

/// Classifies an error into a short, user-friendly message.
///
/// Returns `Some(message)` for transient errors, `None` otherwise.
pub fn classify_error(err: &LlmError) -> Option<&'static str> {
    match err {
        LlmError::ApiError(msg) => {
            let msg_lower = msg.to_lowercase();
            if msg_lower.contains("429")
                || msg_lower.contains("rate limit")
                || msg_lower.contains("too many requests")
            {
                Some("Rate limited by API")
            } else if msg_lower.contains("503")
                || msg_lower.contains("service unavailable")
                || msg_lower.contains("high demand")
            {
                Some("High model load")
            } else if msg_lower.contains("529") || msg_lower.contains("overloaded") {
                Some("API overloaded")
            } else if msg_lower.contains("502") {
                Some("API gateway error")
            } else if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
                Some("Request timed out")
            } else if msg_lower.contains("connection") {
                Some("Connection error")
            } else if msg_lower.contains("temporarily") || msg_lower.contains("try again") {
                Some("Temporary API error")
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Compute the backoff duration for a retry attempt using exponential backoff.
pub fn retry_backoff(attempt: u32) -> Duration {
    let backoff = INITIAL_BACKOFF.saturating_mul(2u32.saturating_pow(attempt));
    backoff.min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: ModelProvider, base_url: Option<&str>, key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider,
            model: "some-model".to_string(),
            base_url: base_url.map(String::from),
            api_key: key.map(String::from),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn new_generator_missing_api_key() {
        match RigGenerator::new(config(ModelProvider::Anthropic, None, None)) {
            Err(e) => {
                let msg = e.to_string();
                assert!(msg.contains("API key"), "got: {msg}");
                assert!(msg.contains("ANTHROPIC_API_KEY"), "got: {msg}");
            }
            Ok(_) => panic!("expected error for missing API key"),
        }
    }

    #[test]
    fn describe_names_provider_and_model() {
        let generator = RigGenerator::new(config(ModelProvider::Groq, None, Some("k"))).unwrap();
        assert_eq!(generator.describe(), "provider=groq model=some-model");
    }

    #[test]
    fn retryable_429_rate_limit() {
        let err = LlmError::ApiError(
            "Gemini API error: HttpError: Invalid status code 429 Too Many Requests".into(),
        );
        assert!(is_retryable(&err));
    }

    #[test]
    fn retryable_overloaded_message() {
        let err = LlmError::ApiError("Anthropic API error: overloaded_error".into());
        assert!(is_retryable(&err));
    }

    #[test]
    fn not_retryable_auth_error() {
        let err = LlmError::ApiError("401 Unauthorized: invalid x-api-key".into());
        assert!(!is_retryable(&err));
    }

    #[test]
    fn not_retryable_empty_or_unconfigured() {
        assert!(!is_retryable(&LlmError::Empty));
        assert!(!is_retryable(&LlmError::NotConfigured("x".into())));
    }

    #[test]
    fn classify_error_variants() {
        let cases = [
            ("HTTP 502 Bad Gateway", Some("API gateway error")),
            ("request timed out after 30s", Some("Request timed out")),
            ("connection reset by peer", Some("Connection error")),
            ("please try again later", Some("Temporary API error")),
            ("invalid model name", None),
        ];
        for (msg, expected) in cases {
            assert_eq!(classify_error(&LlmError::ApiError(msg.into())), expected, "{msg}");
        }
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        assert_eq!(retry_backoff(0), Duration::from_secs(10));
        assert_eq!(retry_backoff(1), Duration::from_secs(20));
        assert_eq!(retry_backoff(2), Duration::from_secs(40));
        assert_eq!(retry_backoff(10), MAX_BACKOFF);
    }

    #[test]
    fn require_base_url_for_compatible_provider() {
        let missing = RigGenerator::new(config(ModelProvider::OpenAICompatible, None, Some("k"))).unwrap();
        assert!(missing.require_base_url().unwrap_err().to_string().contains("base_url"));

        let present = RigGenerator::new(config(
            ModelProvider::OpenAICompatible,
            Some("http://localhost:11434/v1"),
            Some("k"),
        ))
        .unwrap();
        assert_eq!(present.require_base_url().unwrap(), "http://localhost:11434/v1");
    }
}
