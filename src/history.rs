//! Generation history: token usage and estimated cost per run and language

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::persist::{to_pretty_json, write_atomic};
use crate::provider::TokenUsage;

pub const DEFAULT_HISTORY_FILE: &str = ".i18n-llm-history.json";

/// USD per one million tokens: (provider, model, input, output)
const PRICING: &[(&str, &str, f64, f64)] = &[
    ("openai", "gpt-4.1-mini", 0.15, 0.60),
    ("openai", "gpt-4.1-nano", 0.10, 0.40),
    ("openai", "gpt-4o", 2.50, 10.00),
    ("openai", "gpt-4-turbo", 10.00, 30.00),
    ("gemini", "gemini-2.5-flash", 0.075, 0.30),
    ("gemini", "gemini-1.5-pro", 1.25, 5.00),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub input: f64,
    pub output: f64,
    pub total: f64,
    pub currency: Currency,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "USD")]
    Usd,
}

impl Cost {
    pub fn zero() -> Self {
        Self {
            input: 0.0,
            output: 0.0,
            total: 0.0,
            currency: Currency::Usd,
        }
    }
}

/// Per-million-token prices for a model, if known
pub fn pricing(provider: &str, model: &str) -> Option<(f64, f64)> {
    PRICING
        .iter()
        .find(|(p, m, _, _)| *p == provider && *m == model)
        .map(|(_, _, input, output)| (*input, *output))
}

/// Every (provider, model) pair with known pricing
pub fn priced_models() -> impl Iterator<Item = (&'static str, &'static str)> {
    PRICING.iter().map(|(provider, model, _, _)| (*provider, *model))
}

/// Estimated cost of `usage`; zero for models without pricing
pub fn calculate_cost(provider: &str, model: &str, usage: TokenUsage) -> Cost {
    let Some((input_price, output_price)) = pricing(provider, model) else {
        debug!("No pricing for {}/{}, recording zero cost", provider, model);
        return Cost::zero();
    };
    let input = usage.input as f64 / 1_000_000.0 * input_price;
    let output = usage.output as f64 / 1_000_000.0 * output_price;
    Cost {
        input,
        output,
        total: input + output,
        currency: Currency::Usd,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    /// RFC 3339, UTC
    pub timestamp: String,
    pub provider: String,
    pub model: String,
    pub keys_generated: usize,
    pub keys_updated: usize,
    pub tokens: TokenUsage,
    pub cost: Cost,
}

impl GenerationRecord {
    pub fn new(
        provider: &str,
        model: &str,
        keys_generated: usize,
        keys_updated: usize,
        tokens: TokenUsage,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            provider: provider.to_string(),
            model: model.to_string(),
            keys_generated,
            keys_updated,
            tokens,
            cost: calculate_cost(provider, model, tokens),
        }
    }
}

/// Records keyed by language
pub type History = BTreeMap<String, Vec<GenerationRecord>>;

/// Load the history file; missing or unreadable files yield an empty history
pub fn load_history(path: &Path) -> History {
    let Ok(content) = fs::read_to_string(path) else {
        return History::new();
    };
    match serde_json::from_str(&content) {
        Ok(history) => history,
        Err(e) => {
            warn!("Failed to load history from {}, starting fresh: {}", path.display(), e);
            History::new()
        }
    }
}

/// Append records and save. Failures are logged, never returned.
pub fn append_records(path: &Path, records: Vec<(String, GenerationRecord)>) {
    if records.is_empty() {
        return;
    }
    let mut history = load_history(path);
    for (lang, record) in records {
        history.entry(lang).or_default().push(record);
    }
    let result = to_pretty_json(&history)
        .map_err(|e| e.to_string())
        .and_then(|json| write_atomic(path, json.as_bytes()).map_err(|e| e.to_string()));
    if let Err(e) = result {
        warn!("Failed to save history to {}: {}", path.display(), e);
    }
}

/// Total recorded cost per language
pub fn cost_by_language(history: &History) -> BTreeMap<String, f64> {
    history
        .iter()
        .map(|(lang, records)| (lang.clone(), records.iter().map(|r| r.cost.total).sum()))
        .collect()
}

/// Recorded cost aggregated over a whole history
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub total_cost: f64,
    pub total_generations: usize,
    /// Keys generated plus keys updated
    pub total_keys: usize,
    pub total_tokens: u64,
    pub by_language: BTreeMap<String, f64>,
    /// Keyed by the UTC date (`YYYY-MM-DD`) of each record
    pub by_date: BTreeMap<String, f64>,
    /// Keyed by `provider/model`
    pub by_provider: BTreeMap<String, f64>,
    pub currency: Currency,
}

impl CostSummary {
    pub fn from_history(history: &History) -> Self {
        let mut summary = Self {
            by_language: cost_by_language(history),
            ..Self::default()
        };
        for record in history.values().flatten() {
            summary.total_cost += record.cost.total;
            summary.total_generations += 1;
            summary.total_keys += record.keys_generated + record.keys_updated;
            summary.total_tokens += record.tokens.total;

            let date = record
                .timestamp
                .split_once('T')
                .map_or(record.timestamp.as_str(), |(date, _)| date);
            *summary.by_date.entry(date.to_string()).or_default() += record.cost.total;
            *summary
                .by_provider
                .entry(format!("{}/{}", record.provider, record.model))
                .or_default() += record.cost.total;
        }
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.total_generations == 0
    }
}
