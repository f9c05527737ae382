//! Language Model Providers
//!
//! This module is the only place that knows about concrete model APIs. The
//! generation engine talks to a `&dyn LanguageModel` and receives normalized
//! results: plural objects with exactly `=0`, `=1` and `>1`, batch keys that
//! match what was sent, and text that respects `maxLength`.
//!
//! # Overview
//!
//! 1. **LanguageModel trait** - single, batch and review operations
//! 2. **Providers** - OpenAI and Gemini over HTTP, plus a deterministic mock
//! 3. **Prompt builder** - persona, glossary, context, plural and length rules
//! 4. **Response normalization** - JSON extraction, key cleanup, truncation
//! 5. **Retry** - bounded exponential backoff for transient failures
//!
//! # Example
//!
//! ```ignore
//! use llm_i18n::provider::{ProviderConfig, create_provider};
//!
//! let config = ProviderConfig {
//!     provider: "gemini".to_string(),
//!     ..Default::default()
//! };
//! let provider = create_provider(&config)?;
//! println!("{} / {}", provider.provider_name(), provider.model());
//! ```

pub mod chat;
pub mod data;
pub mod error;
pub mod gemini;
pub mod language;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod response;
pub mod retry;
pub mod translator;

use serde::Deserialize;

pub use data::{
    BatchItem, BatchOutcome, BatchRequest, Completion, GeneratedText, Operation, PluralForms,
    ReviewRequest, ReviewResult, TokenUsage, TranslationRequest,
};
pub use error::{ProviderError, ProviderResult};
pub use gemini::GeminiProvider;
pub use mock::{MockMode, MockProvider};
pub use openai::OpenAiProvider;
pub use retry::RetryPolicy;
pub use translator::LanguageModel;

pub const SUPPORTED_PROVIDERS: [&str; 2] = ["openai", "gemini"];

/// `providerConfig` section of the configuration file
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, rename = "baseURL", alias = "baseUrl")]
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            base_url: None,
        }
    }
}

impl ProviderConfig {
    /// Model to use, falling back to the provider's default
    pub fn model_or_default(&self) -> &str {
        match (&self.model, self.provider.as_str()) {
            (Some(model), _) => model,
            (None, "gemini") => gemini::DEFAULT_MODEL,
            (None, _) => openai::DEFAULT_MODEL,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Build the provider named in the configuration
///
/// # Returns
///
/// * `Ok(Box<dyn LanguageModel>)` - Ready-to-use provider
/// * `Err(ProviderError::Config)` - Unknown provider or missing API key
pub fn create_provider(config: &ProviderConfig) -> ProviderResult<Box<dyn LanguageModel>> {
    match config.provider.to_lowercase().as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::from_config(config)?)),
        "gemini" => Ok(Box::new(GeminiProvider::from_config(config)?)),
        other => Err(ProviderError::Config(format!(
            "Unknown provider '{}'. Supported providers: {}",
            other,
            SUPPORTED_PROVIDERS.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_by_name() {
        let config = ProviderConfig {
            provider: "Gemini".to_string(),
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.provider_name(), "gemini");
        assert_eq!(provider.model(), gemini::DEFAULT_MODEL);
    }

    #[test]
    fn test_create_provider_unknown() {
        let config = ProviderConfig {
            provider: "claude".to_string(),
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        match create_provider(&config) {
            Err(ProviderError::Config(msg)) => assert!(msg.contains("openai, gemini")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_provider_config_deserialize() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{"model": "gpt-4o", "apiKey": "sk-1", "baseURL": "http://proxy"}"#,
        )
        .unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model_or_default(), "gpt-4o");
        assert_eq!(config.base_url.as_deref(), Some("http://proxy"));
        assert!(!format!("{:?}", config).contains("sk-1"));
    }

    #[test]
    fn test_model_defaults_per_provider() {
        let gemini = ProviderConfig {
            provider: "gemini".to_string(),
            ..Default::default()
        };
        assert_eq!(gemini.model_or_default(), "gemini-2.5-flash");
        assert_eq!(ProviderConfig::default().model_or_default(), "gpt-4.1-mini");
    }
}
