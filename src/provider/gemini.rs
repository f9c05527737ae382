//! Google Gemini provider
//!
//! # Authentication
//!
//! The API key comes from `providerConfig.apiKey`, then `GEMINI_API_KEY`,
//! then `GOOGLE_API_KEY`.

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

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

const MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Clone)]
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: impl Into<String>) -> ProviderResult<Self> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Config(
                "Gemini API key cannot be empty".to_string(),
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

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(env_api_key()?, DEFAULT_MODEL)
    }

    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        let api_key = match &config.api_key {
            Some(key) if !key.trim().is_empty() => key.clone(),
            _ => env_api_key()?,
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

    /// Endpoint without the key, safe to log
    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn request_body(&self, prompt: &Prompt, json_mode: bool) -> Value {
        let mut body = json!({
            "contents": [{ "parts": [{ "text": prompt.user }] }],
            "systemInstruction": { "parts": [{ "text": prompt.system }] },
            "generationConfig": {
                "temperature": TEMPERATURE,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            },
        });
        if json_mode {
            body["generationConfig"]["responseMimeType"] = json!("application/json");
        }
        body
    }

    async fn send(&self, body: &Value) -> ProviderResult<(String, TokenUsage)> {
        let response = self
            .client
            .post(format!("{}?key={}", self.endpoint(), self.api_key))
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

fn env_api_key() -> ProviderResult<String> {
    API_KEY_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| {
            ProviderError::Config(format!(
                "Gemini API key is required (set providerConfig.apiKey, {} or {})",
                API_KEY_VARS[0], API_KEY_VARS[1]
            ))
        })
}

fn parse_reply(json: &Value) -> ProviderResult<(String, TokenUsage)> {
    if let Some(reason) = json
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(ProviderError::InvalidResponse(format!(
            "Prompt was blocked: {}",
            reason
        )));
    }
    let content = json
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ProviderError::InvalidResponse(
                "Invalid API response: missing 'candidates[0].content.parts[0].text'".to_string(),
            )
        })?;
    let usage = TokenUsage::new(
        json.pointer("/usageMetadata/promptTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        json.pointer("/usageMetadata/candidatesTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    );
    Ok((content.to_string(), usage))
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl ChatBackend for GeminiProvider {
    async fn complete(&self, prompt: &Prompt, json_mode: bool) -> ProviderResult<(String, TokenUsage)> {
        let body = self.request_body(prompt, json_mode);
        let body = &body;
        let (content, usage) = self.retry.run("Gemini request", move || self.send(body)).await?;
        debug!(
            "Gemini {} replied with {} characters ({} tokens)",
            self.model,
            content.len(),
            usage.total
        );
        Ok((content, usage))
    }
}

#[async_trait]
impl LanguageModel for GeminiProvider {
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
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
