//! Shared request flow for chat-style HTTP providers
//!
//! OpenAI and Gemini differ only in how a prompt goes over the wire. Both
//! implement `ChatBackend`; prompt building and reply parsing live here.

use async_trait::async_trait;
use serde_json::Value;

use crate::provider::data::{
    BatchOutcome, BatchRequest, Completion, ReviewRequest, ReviewResult, TokenUsage,
    TranslationRequest,
};
use crate::provider::error::{ProviderError, ProviderResult};
use crate::provider::language::validate_locale;
use crate::provider::prompt::{Prompt, batch_prompt, review_prompt, translation_prompt};
use crate::provider::response::{parse_batch_result, parse_completion, parse_json_object};

/// Sampling temperature used for every call
pub const TEMPERATURE: f64 = 0.3;

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one prompt and return the reply text with token usage.
    /// `json_mode` asks the API to constrain the reply to a JSON object.
    async fn complete(&self, prompt: &Prompt, json_mode: bool) -> ProviderResult<(String, TokenUsage)>;
}

pub async fn translate<B: ChatBackend + ?Sized>(
    backend: &B,
    request: &TranslationRequest,
) -> ProviderResult<Completion> {
    validate_locale(&request.source_language)?;
    validate_locale(&request.target_language)?;

    let prompt = translation_prompt(request);
    let (content, usage) = backend.complete(&prompt, request.is_plural).await?;
    let text = parse_completion(
        &content,
        request.is_plural,
        request.max_length,
        &request.source_text,
    )?;
    Ok(Completion { text, usage })
}

pub async fn translate_batch<B: ChatBackend + ?Sized>(
    backend: &B,
    request: &BatchRequest,
) -> ProviderResult<BatchOutcome> {
    if request.items.is_empty() {
        return Ok(BatchOutcome::default());
    }
    validate_locale(&request.source_language)?;
    validate_locale(&request.target_language)?;

    let prompt = batch_prompt(request);
    let (content, usage) = backend.complete(&prompt, true).await?;
    let results = parse_batch_result(&content, request)?;
    Ok(BatchOutcome { results, usage })
}

pub async fn review<B: ChatBackend + ?Sized>(
    backend: &B,
    request: &ReviewRequest,
) -> ProviderResult<ReviewResult> {
    let prompt = review_prompt(request);
    let (content, _) = backend.complete(&prompt, true).await?;
    let obj = parse_json_object(&content)?;
    serde_json::from_value(Value::Object(obj))
        .map_err(|e| ProviderError::InvalidResponse(format!("Invalid review result: {}", e)))
}
