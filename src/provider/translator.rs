//! Language model trait
//!
//! This module defines the `LanguageModel` trait, the single seam between the
//! generation engine and concrete providers (OpenAI-style, Gemini-style, mock).
//! The engine only ever holds a `&dyn LanguageModel`; which provider sits behind
//! it is decided once, at startup, by `create_provider`.
//!
//! # Example
//!
//! ```ignore
//! use llm_i18n::provider::{LanguageModel, MockMode, MockProvider, TranslationRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = MockProvider::new(MockMode::Suffix);
//!     let request = TranslationRequest {
//!         source_text: "Hello".to_string(),
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

use crate::provider::data::{
    BatchOutcome, BatchRequest, Completion, ReviewRequest, ReviewResult, TranslationRequest,
};
use crate::provider::error::{ProviderError, ProviderResult};

/// Generic trait for language model providers
///
/// When a request's source and target language are equal, the provider must
/// generate text from the description instead of translating it.
///
/// Implementations are responsible for:
/// - retrying transient failures (rate limits, 5xx, timeouts) a bounded number
///   of times before returning an error,
/// - returning plural results with exactly the `=0`, `=1` and `>1` forms,
/// - truncating text that exceeds the item's `max_length`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Translate or generate a single entry
    ///
    /// # Returns
    ///
    /// * `Ok(Completion)` - The text (or plural forms) and token usage
    /// * `Err(ProviderError)` - If the call failed after retries
    async fn translate(&self, request: &TranslationRequest) -> ProviderResult<Completion>;

    /// Translate or generate several entries in one call
    ///
    /// Batching is far cheaper than one call per entry. The result is keyed by
    /// `BatchItem::key`; keys the model did not answer are simply absent.
    /// An `Err` means the batch as a whole failed and the caller should fall
    /// back to `translate` per item.
    async fn translate_batch(&self, request: &BatchRequest) -> ProviderResult<BatchOutcome>;

    /// Advisory quality review of one generated text
    ///
    /// Optional; the default implementation reports the operation as
    /// unsupported.
    async fn review(&self, _request: &ReviewRequest) -> ProviderResult<ReviewResult> {
        Err(ProviderError::Unsupported(self.provider_name().to_string()))
    }

    /// Provider identifier used for logging, history and pricing (e.g. "openai")
    fn provider_name(&self) -> &str;

    /// Model identifier (e.g. "gpt-4.1-mini")
    fn model(&self) -> &str;
}
