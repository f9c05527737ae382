//! Up-front estimate of token usage and cost for a full generation
//!
//! Counts are taken from the schema descriptions alone, at roughly 0.75
//! tokens per word, and priced against every model with known pricing.
//! Prompt overhead is not included, so real runs cost more.

use std::fmt::{self, Write as _};

use serde::Serialize;

use crate::history::{Cost, calculate_cost, priced_models, pricing};
use crate::provider::TokenUsage;
use crate::schema::Schema;

pub const TOKENS_PER_WORD: f64 = 0.75;

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn estimate_tokens(text: &str) -> u64 {
    (count_words(text) as f64 * TOKENS_PER_WORD).ceil() as u64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub provider: String,
    pub model: String,
    #[serde(rename = "inputCostPer1M")]
    pub input_cost_per_million: f64,
    #[serde(rename = "outputCostPer1M")]
    pub output_cost_per_million: f64,
    pub cost: Cost,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEstimate {
    pub total_keys: usize,
    pub source_words: usize,
    pub source_chars: usize,
    /// Tokens of every description, counted once
    pub source_tokens: u64,
    pub target_languages: Vec<String>,
    /// (key, language) pairs a forced run would generate
    pub total_translations: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Cheapest first
    pub cost_estimates: Vec<CostEstimate>,
}

/// Estimate what regenerating every key in every language would take.
///
/// Each translation sends its description once and gets back about as many
/// tokens per form; plural entries return three forms.
pub fn estimate_usage(schemas: &[Schema]) -> UsageEstimate {
    let mut estimate = UsageEstimate::default();

    for schema in schemas {
        let languages = schema.target_languages.len() as u64;
        for leaf in schema.leaves() {
            let description = &leaf.entry.description;
            let tokens = estimate_tokens(description);
            let forms = if leaf.entry.is_plural { 3 } else { 1 };

            estimate.total_keys += 1;
            estimate.source_words += count_words(description);
            estimate.source_chars += description.chars().count();
            estimate.source_tokens += tokens;
            estimate.input_tokens += tokens * languages;
            estimate.output_tokens += tokens * forms * languages;
        }
        estimate.total_translations += schema.leaves().count() * schema.target_languages.len();
        for lang in &schema.target_languages {
            if !estimate.target_languages.contains(lang) {
                estimate.target_languages.push(lang.clone());
            }
        }
    }

    let usage = TokenUsage::new(estimate.input_tokens, estimate.output_tokens);
    estimate.cost_estimates = priced_models()
        .filter_map(|(provider, model)| {
            let (input_price, output_price) = pricing(provider, model)?;
            Some(CostEstimate {
                provider: provider.to_string(),
                model: model.to_string(),
                input_cost_per_million: input_price,
                output_cost_per_million: output_price,
                cost: calculate_cost(provider, model, usage),
            })
        })
        .collect();
    estimate
        .cost_estimates
        .sort_by(|a, b| a.cost.total.total_cmp(&b.cost.total));
    estimate
}

impl UsageEstimate {
    pub fn render_markdown(&self, generated_at: &str) -> String {
        let mut md = String::new();
        // Writing into a String cannot fail
        let _ = self.render(&mut md, generated_at);
        md
    }

    fn render(&self, md: &mut String, generated_at: &str) -> fmt::Result {
        writeln!(md, "# Consumption Report\n")?;
        writeln!(md, "**Generated:** {}\n", generated_at)?;
        writeln!(md, "## Project Statistics\n")?;
        writeln!(md, "- **Total Keys:** {}", self.total_keys)?;
        writeln!(md, "- **Source Words:** {}", self.source_words)?;
        writeln!(md, "- **Target Languages:** {}", self.target_languages.join(", "))?;
        writeln!(md, "- **Total Translations:** {}\n", self.total_translations)?;
        writeln!(md, "## Token Estimates\n")?;
        writeln!(md, "- **Estimated Input Tokens:** {}", self.input_tokens)?;
        writeln!(md, "- **Estimated Output Tokens:** {}\n", self.output_tokens)?;
        writeln!(md, "## Cost Estimates by Provider\n")?;
        writeln!(
            md,
            "| Provider | Model | Input Tokens | Output Tokens | Input Cost | Output Cost | **Total Cost** |"
        )?;
        writeln!(
            md,
            "|----------|-------|-------------:|--------------:|-----------:|------------:|---------------:|"
        )?;
        for estimate in &self.cost_estimates {
            writeln!(
                md,
                "| {} | {} | {} | {} | ${:.4} | ${:.4} | **${:.4}** |",
                estimate.provider.to_uppercase(),
                estimate.model,
                self.input_tokens,
                self.output_tokens,
                estimate.cost.input,
                estimate.cost.output,
                estimate.cost.total
            )?;
        }
        writeln!(md, "\n### Notes\n")?;
        writeln!(md, "- Token estimates are approximate (~{} tokens/word)", TOKENS_PER_WORD)?;
        writeln!(md, "- Prompt instructions are not counted; actual costs are higher")
    }
}
