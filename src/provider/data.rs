//! Request and response types shared by every language model provider
//!
//! These types are the contract between the generation engine and the
//! concrete providers. The engine builds requests from pending work items and
//! consumes `GeneratedText` values; it never sees provider wire formats.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{Glossary, Persona};

/// The three forms of a pluralized entry.
///
/// Serialized with exactly the keys `=0`, `=1` and `>1`. The `>1` form
/// carries a `{count}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluralForms {
    #[serde(rename = "=0")]
    pub zero: String,
    #[serde(rename = "=1")]
    pub one: String,
    #[serde(rename = ">1")]
    pub many: String,
}

impl PluralForms {
    pub const KEYS: [&'static str; 3] = ["=0", "=1", ">1"];

    pub fn new(zero: impl Into<String>, one: impl Into<String>, many: impl Into<String>) -> Self {
        Self {
            zero: zero.into(),
            one: one.into(),
            many: many.into(),
        }
    }

    pub fn forms(&self) -> [(&'static str, &str); 3] {
        [
            ("=0", self.zero.as_str()),
            ("=1", self.one.as_str()),
            (">1", self.many.as_str()),
        ]
    }

    /// Read forms back from an output document value.
    ///
    /// Only accepts an object holding all three forms as strings; anything
    /// else yields `None`.
    pub fn from_document_value(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            zero: obj.get("=0")?.as_str()?.to_string(),
            one: obj.get("=1")?.as_str()?.to_string(),
            many: obj.get(">1")?.as_str()?.to_string(),
        })
    }
}

/// Text produced for one entry in one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneratedText {
    Single(String),
    Plural(PluralForms),
}

impl GeneratedText {
    pub fn is_plural(&self) -> bool {
        matches!(self, GeneratedText::Plural(_))
    }

    pub fn to_value(&self) -> serde_json::Value {
        match self {
            GeneratedText::Single(text) => serde_json::Value::String(text.clone()),
            GeneratedText::Plural(forms) => serde_json::json!({
                "=0": forms.zero,
                "=1": forms.one,
                ">1": forms.many,
            }),
        }
    }
}

/// Whether a call translates existing text or writes new text from a description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Translate,
    Generate,
}

impl Operation {
    pub fn for_languages(source_language: &str, target_language: &str) -> Self {
        if source_language == target_language {
            Operation::Generate
        } else {
            Operation::Translate
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Translate => "translated",
            Operation::Generate => "generated",
        }
    }
}

/// Parameters for a single translate/generate call
#[derive(Debug, Clone, Default)]
pub struct TranslationRequest {
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
    pub persona: Option<Persona>,
    pub glossary: Option<Glossary>,
    pub context: Option<String>,
    pub category: Option<String>,
    pub is_plural: bool,
    pub max_length: Option<usize>,
}

impl TranslationRequest {
    pub fn operation(&self) -> Operation {
        Operation::for_languages(&self.source_language, &self.target_language)
    }
}

/// One item inside a batch call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    pub key: String,
    pub source_text: String,
    pub is_plural: bool,
    pub max_length: Option<usize>,
    pub context: Option<String>,
    pub category: Option<String>,
}

/// Parameters for a batch call: items plus metadata shared by all of them
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
    pub source_language: String,
    pub target_language: String,
    pub persona: Option<Persona>,
    pub glossary: Option<Glossary>,
    pub context: Option<String>,
    pub category: Option<String>,
}

impl BatchRequest {
    pub fn operation(&self) -> Operation {
        Operation::for_languages(&self.source_language, &self.target_language)
    }
}

/// Token counts reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.input += other.input;
        self.output += other.output;
        self.total += other.total;
    }
}

/// Result of a single translate/generate call
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: GeneratedText,
    pub usage: TokenUsage,
}

/// Result of a successful batch call, keyed by `BatchItem::key`.
///
/// May hold fewer keys than were sent; the scheduler treats absent keys as
/// misses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub results: BTreeMap<String, GeneratedText>,
    pub usage: TokenUsage,
}

/// Parameters for an advisory review of one generated text
#[derive(Debug, Clone, Default)]
pub struct ReviewRequest {
    pub source_text: String,
    pub translated_text: String,
    pub language: String,
    pub persona: Option<Persona>,
    pub context: Option<String>,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    #[serde(default, alias = "isToneConsistent")]
    pub tone_ok: bool,
    #[serde(default, alias = "isGrammaticallyCorrect")]
    pub grammar_ok: bool,
    #[serde(default, alias = "obeysLengthConstraint")]
    pub length_ok: bool,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub schema_suggestion: String,
}

impl ReviewResult {
    pub fn passed(&self) -> bool {
        self.tone_ok && self.grammar_ok && self.length_ok
    }
}
