//! OpenAI chat completions provider
//!
//! # Authentication
//!
//! The API key comes from `providerConfig.apiKey` or, when that is absent,
//! the `OPENAI_API_KEY` environment variable.
//!
//! # Example
//!
//! ```ignore
//! use llm_i18n::provider::{LanguageModel, OpenAiProvider, TranslationRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OpenAiProvider::from_env()?;
//!     let request = TranslationRequest {
//!         source_text: "Hello, world!".to_string(),
//!         source_language: "en".to_string(),
//!         target_language: "fr".to_string(),
//!         ..Default::default()
//!     };
//!     let completion = provider.translate(&request).await?;
//!     println!("{:?}", completion.text);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::provider::ProviderConfig;
use crate::provider::chat::{self, ChatBackend, TEMPERATURE};
use crate::provider::data::{
    BatchOutcome, BatchRequest, Completion, ReviewRequest, ReviewResult, TokenUsage,
    TranslationRequest,
};
use crate::provider::error::{ProviderError, ProviderResult};
use crate::provider::prompt::Prompt;
use crate::provider::retry::RetryPolicy;
use crate::provider::translator::LanguageModel;

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// OpenAI (and OpenAI-compatible) chat completions provider
#[derive(Clone)]
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    /// Create a provider with an explicit API key
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - New provider instance
    /// * `Err(ProviderError)` - If the API key is empty or the HTTP client cannot be built
    pub fn new(api_key: String, model: impl Into<String>) -> ProviderResult<Self> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Config(
                "OpenAI API key cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// Create a provider from `OPENAI_API_KEY` with the default model
    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var(API_KEY_VAR).map_err(|_| {
            ProviderError::Config(format!("{} environment variable not set", API_KEY_VAR))
        })?;
        Self::new(api_key, DEFAULT_MODEL)
    }

    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        let api_key = match &config.api_key {
            Some(key) if !key.trim().is_empty() => key.clone(),
            _ => std::env::var(API_KEY_VAR).map_err(|_| {
                ProviderError::Config(format!(
                    "OpenAI API key is required (set providerConfig.apiKey or {})",
                    API_KEY_VAR
                ))
            })?,
        };
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let provider = Self::new(api_key, model)?;
        Ok(match &config.base_url {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    fn request_body(&self, prompt: &Prompt, json_mode: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "temperature": TEMPERATURE,
        });
        if json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }

    async fn send(&self, body: &Value) -> ProviderResult<(String, TokenUsage)> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::from_status(status.as_u16(), &error_text));
        }

        let json: Value = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse API response: {}", e))
        })?;
        parse_reply(&json)
    }
}

/// Pull the message content and token usage out of a chat completion
fn parse_reply(json: &Value) -> ProviderResult<(String, TokenUsage)> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ProviderError::InvalidResponse(
                "Invalid API response: missing 'choices[0].message.content'".to_string(),
            )
        })?;
    let usage = TokenUsage::new(
        json.pointer("/usage/prompt_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        json.pointer("/usage/completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    );
    Ok((content.to_string(), usage))
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl ChatBackend for OpenAiProvider {
    async fn complete(&self, prompt: &Prompt, json_mode: bool) -> ProviderResult<(String, TokenUsage)> {
        let body = self.request_body(prompt, json_mode);
        let body = &body;
        let (content, usage) = self.retry.run("OpenAI request", move || self.send(body)).await?;
        debug!(
            "OpenAI {} replied with {} characters ({} tokens)",
            self.model,
            content.len(),
            usage.total
        );
        Ok((content, usage))
    }
}

#[async_trait]
impl LanguageModel for OpenAiProvider {
    async fn translate(&self, request: &TranslationRequest) -> ProviderResult<Completion> {
        chat::translate(self, request).await
    }

    async fn translate_batch(&self, request: &BatchRequest) -> ProviderResult<BatchOutcome> {
        chat::translate_batch(self, request).await
    }

    async fn review(&self, request: &ReviewRequest) -> ProviderResult<ReviewResult> {
        chat::review(self, request).await
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== Initialization Tests ==========

    #[test]
    fn test_new_with_valid_key() {
        let provider = OpenAiProvider::new("test-api-key".to_string(), "gpt-4o").unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.model(), "gpt-4o");
    }

    #[test]
    fn test_new_with_empty_key() {
        let result = OpenAiProvider::new("   ".to_string(), DEFAULT_MODEL);
        match result {
            Err(ProviderError::Config(msg)) => assert!(msg.contains("empty")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_from_config_prefers_explicit_values() {
        let config = ProviderConfig {
            provider: "openai".to_string(),
            model: None,
            api_key: Some("sk-test".to_string()),
            base_url: Some("http://localhost:8080/v1/".to_string()),
        };
        let provider = OpenAiProvider::from_config(&config).unwrap();
        assert_eq!(provider.model(), DEFAULT_MODEL);
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_endpoint_default() {
        let provider = OpenAiProvider::new("k".to_string(), DEFAULT_MODEL).unwrap();
        assert_eq!(provider.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    // ========== Wire Format Tests ==========

    #[test]
    fn test_request_body() {
        let provider = OpenAiProvider::new("k".to_string(), "gpt-4.1-nano").unwrap();
        let prompt = Prompt {
            system: "sys".to_string(),
            user: "usr".to_string(),
        };
        let body = provider.request_body(&prompt, true);
        assert_eq!(body["model"], "gpt-4.1-nano");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["response_format"]["type"], "json_object");

        let plain = provider.request_body(&prompt, false);
        assert!(plain.get("response_format").is_none());
    }

    #[test]
    fn test_parse_reply() {
        let json = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Bonjour" } }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 8, "total_tokens": 128 }
        });
        let (content, usage) = parse_reply(&json).unwrap();
        assert_eq!(content, "Bonjour");
        assert_eq!(usage, TokenUsage::new(120, 8));

        assert!(parse_reply(&json!({ "choices": [] })).is_err());
    }

    // ========== Debug Implementation Test ==========

    #[test]
    fn test_debug_output() {
        let provider = OpenAiProvider::new("sk-secret".to_string(), DEFAULT_MODEL).unwrap();
        let debug_str = format!("{:?}", provider);
        assert!(debug_str.contains("***"));
        assert!(!debug_str.contains("sk-secret"));
    }

    // ========== Integration Tests (require real API key) ==========

    #[tokio::test]
    #[ignore] // Run with: cargo test --ignored
    async fn test_real_api_single_translation() {
        if std::env::var(API_KEY_VAR).is_err() {
            eprintln!("Skipping: {} not set", API_KEY_VAR);
            return;
        }

        let provider = OpenAiProvider::from_env().unwrap();
        let request = TranslationRequest {
            source_text: "Hello".to_string(),
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            ..Default::default()
        };
        let completion = provider.translate(&request).await.unwrap();
        println!("Translation: Hello → {:?}", completion.text);
        assert!(completion.usage.total > 0);
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test --ignored
    async fn test_real_api_invalid_key() {
        let provider = OpenAiProvider::new("invalid-key-xyz".to_string(), DEFAULT_MODEL)
            .unwrap()
            .with_retry(RetryPolicy::immediate(1));
        let request = TranslationRequest {
            source_text: "Hello".to_string(),
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            ..Default::default()
        };
        let result = provider.translate(&request).await;
        assert!(matches!(result, Err(ProviderError::Http { status: 401, .. })));
    }
}
