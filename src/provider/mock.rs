//! Mock language model for testing
//!
//! This module provides a deterministic, API-free provider for exercising the
//! generation pipeline without API keys or network access. It is also what the
//! CLI's `--mock` flag runs against.
//!
//! Replies are rendered to JSON and fed through the same response parsing as
//! the HTTP providers, so plural normalization and length enforcement behave
//! exactly as they would with a real model.
//!
//! # Example
//!
//! ```ignore
//! use llm_i18n::provider::{LanguageModel, MockMode, MockProvider, TranslationRequest};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockProvider::new(MockMode::Suffix);
//!     let request = TranslationRequest {
//!         source_text: "Hello".to_string(),
//!         source_language: "en".to_string(),
//!         target_language: "fr".to_string(),
//!         ..Default::default()
//!     };
//!     let completion = mock.translate(&request).await.unwrap();
//!     assert_eq!(completion.text, GeneratedText::Single("Hello_fr".to_string()));
//! }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::provider::data::{
    BatchOutcome, BatchRequest, Completion, ReviewRequest, ReviewResult, TokenUsage,
    TranslationRequest,
};
use crate::provider::error::{ProviderError, ProviderResult};
use crate::provider::response::{parse_batch_result, parse_completion};
use crate::provider::translator::LanguageModel;

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append the target language: "Hello" → "Hello_fr"
    Suffix,

    /// Use predefined mappings for realistic output
    /// (source text, target language) → text. Unmapped input falls back to
    /// the suffix behavior.
    Mappings(HashMap<(String, String), String>),

    /// Every call fails with this message
    Error(String),
}

/// A batch call as the mock received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBatch {
    pub target_language: String,
    pub context: Option<String>,
    pub keys: Vec<String>,
}

/// Mock provider that simulates model output and failure scenarios
#[derive(Debug)]
pub struct MockProvider {
    mode: MockMode,
    /// Optional simulated network delay (in milliseconds)
    delay_ms: u64,
    fail_batches: bool,
    /// Source texts whose calls fail; batches silently drop them
    failing_texts: BTreeSet<String>,
    /// Batch keys the mock "forgets" to answer
    omitted_keys: BTreeSet<String>,
    /// Add a stray `other` form to plural replies
    extra_plural_form: bool,
    translate_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    batches: Mutex<Vec<RecordedBatch>>,
}

impl MockProvider {
    /// Create a new MockProvider with the given mode
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay_ms: 0,
            fail_batches: false,
            failing_texts: BTreeSet::new(),
            omitted_keys: BTreeSet::new(),
            extra_plural_form: false,
            translate_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockProvider with simulated network delay
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::new(mode)
        }
    }

    /// Make every batch call fail, forcing per-item fallback
    pub fn failing_batches(mut self) -> Self {
        self.fail_batches = true;
        self
    }

    /// Make calls for this source text fail
    pub fn failing_text(mut self, source_text: impl Into<String>) -> Self {
        self.failing_texts.insert(source_text.into());
        self
    }

    /// Leave this key out of batch results
    pub fn omitting_key(mut self, key: impl Into<String>) -> Self {
        self.omitted_keys.insert(key.into());
        self
    }

    /// Return an extra `other` form alongside the three plural forms
    pub fn with_extra_plural_form(mut self) -> Self {
        self.extra_plural_form = true;
        self
    }

    pub fn translate_calls(&self) -> usize {
        self.translate_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn recorded_batches(&self) -> Vec<RecordedBatch> {
        self.batches
            .lock()
            .map(|b| b.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn render_text(&self, text: &str, target: &str) -> ProviderResult<String> {
        match &self.mode {
            MockMode::Suffix => Ok(format!("{}_{}", text, target)),
            MockMode::Mappings(map) => {
                let key = (text.to_string(), target.to_string());
                Ok(map
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| format!("{}_{}", text, target)))
            }
            MockMode::Error(msg) => Err(ProviderError::Network(msg.clone())),
        }
    }

    /// JSON reply a well-behaved model would give for one item
    fn render_reply(&self, text: &str, target: &str, is_plural: bool) -> ProviderResult<Value> {
        let base = self.render_text(text, target)?;
        if !is_plural {
            return Ok(Value::String(base));
        }
        let mut forms = json!({
            "=0": format!("{}_zero", base),
            "=1": format!("{}_one", base),
            ">1": format!("{}_{{count}}", base),
        });
        if self.extra_plural_form {
            forms["other"] = Value::String(format!("{}_other", base));
        }
        Ok(forms)
    }

    fn record(&self, request: &BatchRequest) {
        let entry = RecordedBatch {
            target_language: request.target_language.clone(),
            context: request.context.clone(),
            keys: request.items.iter().map(|i| i.key.clone()).collect(),
        };
        match self.batches.lock() {
            Ok(mut batches) => batches.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

#[async_trait]
impl LanguageModel for MockProvider {
    async fn translate(&self, request: &TranslationRequest) -> ProviderResult<Completion> {
        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;

        if self.failing_texts.contains(&request.source_text) {
            return Err(ProviderError::Network(format!(
                "simulated failure for '{}'",
                request.source_text
            )));
        }

        let reply = self.render_reply(
            &request.source_text,
            &request.target_language,
            request.is_plural,
        )?;
        let content = match reply {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let text = parse_completion(&content, request.is_plural, request.max_length, "mock")?;
        Ok(Completion {
            text,
            usage: TokenUsage::new(10, 5),
        })
    }

    async fn translate_batch(&self, request: &BatchRequest) -> ProviderResult<BatchOutcome> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.record(request);
        // Simulated delay is per batch, not per item
        self.apply_delay().await;

        if self.fail_batches {
            return Err(ProviderError::InvalidResponse(
                "simulated batch failure".to_string(),
            ));
        }

        let mut reply = Map::new();
        for item in &request.items {
            if self.omitted_keys.contains(&item.key) || self.failing_texts.contains(&item.source_text)
            {
                continue;
            }
            let value = self.render_reply(&item.source_text, &request.target_language, item.is_plural)?;
            reply.insert(item.key.clone(), value);
        }

        let results = parse_batch_result(&Value::Object(reply).to_string(), request)?;
        let count = request.items.len() as u64;
        Ok(BatchOutcome {
            results,
            usage: TokenUsage::new(10 * count, 5 * count),
        })
    }

    async fn review(&self, request: &ReviewRequest) -> ProviderResult<ReviewResult> {
        self.apply_delay().await;
        if let MockMode::Error(msg) = &self.mode {
            return Err(ProviderError::Network(msg.clone()));
        }

        let too_long = request
            .max_length
            .is_some_and(|max| request.translated_text.chars().count() > max);
        let empty = request.translated_text.trim().is_empty();
        let comment = if too_long {
            "Text exceeds the maximum length".to_string()
        } else if empty {
            "Text is empty".to_string()
        } else {
            String::new()
        };
        Ok(ReviewResult {
            tone_ok: true,
            grammar_ok: !empty,
            length_ok: !too_long,
            comment,
            schema_suggestion: String::new(),
        })
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::data::{BatchItem, GeneratedText, PluralForms};

    fn request(text: &str, target: &str) -> TranslationRequest {
        TranslationRequest {
            source_text: text.to_string(),
            source_language: "en".to_string(),
            target_language: target.to_string(),
            ..Default::default()
        }
    }

    fn batch(keys: &[(&str, bool)]) -> BatchRequest {
        BatchRequest {
            items: keys
                .iter()
                .map(|(key, is_plural)| BatchItem {
                    key: key.to_string(),
                    source_text: format!("text of {}", key),
                    is_plural: *is_plural,
                    max_length: None,
                    context: None,
                    category: None,
                })
                .collect(),
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            ..Default::default()
        }
    }

    // ========== Suffix Mode Tests ==========

    #[tokio::test]
    async fn test_suffix_single_translation() {
        let mock = MockProvider::new(MockMode::Suffix);
        let completion = mock.translate(&request("Hello", "fr")).await.unwrap();
        assert_eq!(completion.text, GeneratedText::Single("Hello_fr".to_string()));
        assert_eq!(completion.usage, TokenUsage::new(10, 5));
        assert_eq!(mock.translate_calls(), 1);
    }

    #[tokio::test]
    async fn test_suffix_plural_translation() {
        let mock = MockProvider::new(MockMode::Suffix);
        let mut req = request("Messages", "de");
        req.is_plural = true;
        let completion = mock.translate(&req).await.unwrap();
        assert_eq!(
            completion.text,
            GeneratedText::Plural(PluralForms::new(
                "Messages_de_zero",
                "Messages_de_one",
                "Messages_de_{count}"
            ))
        );
    }

    #[tokio::test]
    async fn test_max_length_is_enforced() {
        let mock = MockProvider::new(MockMode::Suffix);
        let mut req = request("Welcome back friend", "fr");
        req.max_length = Some(12);
        let completion = mock.translate(&req).await.unwrap();
        assert_eq!(completion.text, GeneratedText::Single("Welcome back".to_string()));
    }

    // ========== Batch Tests ==========

    #[tokio::test]
    async fn test_batch_answers_every_key() {
        let mock = MockProvider::new(MockMode::Suffix);
        let outcome = mock
            .translate_batch(&batch(&[("user.greeting", false), ("user.messages", true)]))
            .await
            .unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(
            outcome.results["user.greeting"],
            GeneratedText::Single("text of user.greeting_fr".to_string())
        );
        assert!(outcome.results["user.messages"].is_plural());
        assert_eq!(outcome.usage, TokenUsage::new(20, 10));
        assert_eq!(mock.batch_calls(), 1);
        assert_eq!(
            mock.recorded_batches()[0].keys,
            vec!["user.greeting", "user.messages"]
        );
    }

    #[tokio::test]
    async fn test_extra_plural_form_is_stripped() {
        let mock = MockProvider::new(MockMode::Suffix).with_extra_plural_form();
        let outcome = mock
            .translate_batch(&batch(&[("user.messages", true)]))
            .await
            .unwrap();
        let value = outcome.results["user.messages"].to_value();
        assert_eq!(value.as_object().unwrap().len(), 3);
        assert!(value.get("other").is_none());
    }

    #[tokio::test]
    async fn test_omitted_and_failing_keys_are_absent() {
        let mock = MockProvider::new(MockMode::Suffix)
            .omitting_key("a.one")
            .failing_text("text of a.two");
        let outcome = mock
            .translate_batch(&batch(&[("a.one", false), ("a.two", false), ("a.three", false)]))
            .await
            .unwrap();
        let keys: Vec<&String> = outcome.results.keys().collect();
        assert_eq!(keys, vec!["a.three"]);

        assert!(mock.translate(&request("text of a.two", "fr")).await.is_err());
        assert!(mock.translate(&request("text of a.one", "fr")).await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_batches() {
        let mock = MockProvider::new(MockMode::Suffix).failing_batches();
        assert!(mock.translate_batch(&batch(&[("a.b", false)])).await.is_err());
        assert!(mock.translate(&request("x", "fr")).await.is_ok());
    }

    // ========== Mappings / Error Mode Tests ==========

    #[tokio::test]
    async fn test_mappings_mode() {
        let mut map = HashMap::new();
        map.insert(("Hello".to_string(), "fr".to_string()), "Bonjour".to_string());
        let mock = MockProvider::new(MockMode::Mappings(map));
        let hit = mock.translate(&request("Hello", "fr")).await.unwrap();
        assert_eq!(hit.text, GeneratedText::Single("Bonjour".to_string()));
        let miss = mock.translate(&request("Hello", "de")).await.unwrap();
        assert_eq!(miss.text, GeneratedText::Single("Hello_de".to_string()));
    }

    #[tokio::test]
    async fn test_error_mode() {
        let mock = MockProvider::new(MockMode::Error("API down".to_string()));
        let err = mock.translate(&request("Hello", "fr")).await.unwrap_err();
        assert_eq!(err, ProviderError::Network("API down".to_string()));
        assert!(mock.translate_batch(&batch(&[("a.b", false)])).await.is_err());
        assert!(mock.review(&ReviewRequest::default()).await.is_err());
    }

    // ========== Review Tests ==========

    #[tokio::test]
    async fn test_review_flags_length() {
        let mock = MockProvider::new(MockMode::Suffix);
        let ok = mock
            .review(&ReviewRequest {
                source_text: "Save".to_string(),
                translated_text: "Sauver".to_string(),
                language: "fr".to_string(),
                max_length: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(ok.passed());

        let long = mock
            .review(&ReviewRequest {
                translated_text: "Enregistrer les modifications".to_string(),
                max_length: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!long.length_ok);
        assert!(!long.passed());
    }

    #[tokio::test]
    async fn test_with_delay() {
        let mock = MockProvider::with_delay(MockMode::Suffix, 10);
        let start = std::time::Instant::now();
        mock.translate(&request("Hello", "fr")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
