//! Advisory review of generated output
//!
//! Every generated value in the output documents is sent back to the model
//! together with its source description. Results never change output or
//! state; they are collected into a Markdown report.

use std::fmt::{self, Write as _};
use std::path::Path;

use tracing::{info, warn};

use crate::output::{OutputDocument, output_file};
use crate::persist::write_atomic;
use crate::provider::{LanguageModel, PluralForms, ProviderError, ProviderResult, ReviewRequest, ReviewResult};
use crate::schema::Schema;

pub const DEFAULT_REPORT_FILE: &str = "i18n-review-report.md";

/// Which languages a review covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageSelection {
    One(String),
    /// Every target language of every schema
    All,
}

impl LanguageSelection {
    pub fn resolve(&self, schemas: &[Schema]) -> Vec<String> {
        match self {
            LanguageSelection::One(lang) => vec![lang.clone()],
            LanguageSelection::All => {
                let mut langs: Vec<String> = Vec::new();
                for lang in schemas.iter().flat_map(|s| &s.target_languages) {
                    if !langs.contains(lang) {
                        langs.push(lang.clone());
                    }
                }
                langs
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewedItem {
    /// `prefix:entity.key.path`, with the plural form appended for plurals
    pub key: String,
    pub source_text: String,
    pub translated_text: String,
    pub result: ReviewResult,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageReview {
    pub language: String,
    pub items: Vec<ReviewedItem>,
    /// Values whose review call failed
    pub errors: usize,
}

impl LanguageReview {
    pub fn passed(&self) -> usize {
        self.items.iter().filter(|i| i.result.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.passed()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewReport {
    pub languages: Vec<LanguageReview>,
}

impl ReviewReport {
    pub fn render_markdown(&self, generated_at: &str) -> String {
        let mut md = String::new();
        // Writing into a String cannot fail
        let _ = self.render(&mut md, generated_at);
        md
    }

    fn render(&self, md: &mut String, generated_at: &str) -> fmt::Result {
        writeln!(md, "# Translation Review Report\n")?;
        writeln!(md, "**Generated:** {}\n", generated_at)?;
        writeln!(md, "---\n")?;

        for lang in &self.languages {
            writeln!(md, "## {}\n", lang.language)?;
            writeln!(md, "### Summary\n")?;
            writeln!(md, "- **Total translations:** {}", lang.items.len())?;
            writeln!(md, "- **Passed:** {} ✅", lang.passed())?;
            writeln!(md, "- **Failed:** {} ❌", lang.failed())?;
            if lang.errors > 0 {
                writeln!(md, "- **Not reviewed (errors):** {}", lang.errors)?;
            }
            md.push('\n');

            let failed: Vec<&ReviewedItem> =
                lang.items.iter().filter(|i| !i.result.passed()).collect();
            if failed.is_empty() {
                writeln!(md, "### ✨ All translations passed!\n")?;
                continue;
            }

            writeln!(md, "### Issues Found\n")?;
            for item in failed {
                render_issue(md, item)?;
            }
        }
        Ok(())
    }

    pub fn write(&self, path: &Path, generated_at: &str) -> std::io::Result<()> {
        write_atomic(path, self.render_markdown(generated_at).as_bytes())
    }
}

fn render_issue(md: &mut String, item: &ReviewedItem) -> fmt::Result {
    writeln!(md, "#### `{}`\n", item.key)?;
    writeln!(md, "**Source:** {}\n", item.source_text)?;
    writeln!(md, "**Translation:** {}\n", item.translated_text)?;
    writeln!(md, "| Criterion | Status |")?;
    writeln!(md, "|-----------|--------|")?;
    writeln!(md, "| Tone Consistent | {} |", mark(item.result.tone_ok))?;
    writeln!(md, "| Grammatically Correct | {} |", mark(item.result.grammar_ok))?;
    writeln!(md, "| Length Constraint | {} |\n", mark(item.result.length_ok))?;
    if !item.result.comment.is_empty() {
        writeln!(md, "**Comment:** {}\n", item.result.comment)?;
    }
    if !item.result.schema_suggestion.is_empty() {
        writeln!(md, "**💡 Schema Suggestion:** {}\n", item.result.schema_suggestion)?;
    }
    writeln!(md, "---\n")
}

fn mark(ok: bool) -> &'static str {
    if ok { "✅ Yes" } else { "❌ No" }
}

/// Review every generated value of the selected languages.
///
/// Missing documents are skipped with a warning. A failed review call is
/// logged and counted; only `Unsupported` aborts, since no later call can
/// succeed either.
pub async fn review_outputs(
    schemas: &[Schema],
    output_dir: &Path,
    selection: &LanguageSelection,
    provider: &dyn LanguageModel,
) -> ProviderResult<ReviewReport> {
    let mut report = ReviewReport::default();

    for lang in selection.resolve(schemas) {
        info!("Reviewing {}", lang);
        let mut review = LanguageReview {
            language: lang.clone(),
            ..Default::default()
        };

        for schema in schemas.iter().filter(|s| s.target_languages.contains(&lang)) {
            let path = output_file(output_dir, &schema.prefix, &lang);
            let Some(doc) = OutputDocument::load(&path) else {
                warn!("Output file {} not found, skipping", path.display());
                continue;
            };

            for leaf in schema.leaves() {
                let out_path = leaf.output_path();
                let Some(value) = doc.get(&out_path) else {
                    continue;
                };
                let key = format!("{}:{}", schema.prefix, out_path);
                let texts: Vec<(String, String)> = if leaf.entry.is_plural {
                    match PluralForms::from_document_value(value) {
                        Some(forms) => forms
                            .forms()
                            .into_iter()
                            .map(|(form, text)| (format!("{}.{}", key, form), text.to_string()))
                            .collect(),
                        None => continue,
                    }
                } else {
                    match value.as_str() {
                        Some(text) => vec![(key, text.to_string())],
                        None => continue,
                    }
                };

                let context = match (leaf.entity_context, &leaf.entry.context) {
                    (Some(entity), Some(own)) => Some(format!("{} / {}", entity, own)),
                    (Some(one), None) => Some(one.to_string()),
                    (None, own) => own.clone(),
                };

                for (key, translated_text) in texts {
                    let request = ReviewRequest {
                        source_text: leaf.entry.description.clone(),
                        translated_text: translated_text.clone(),
                        language: lang.clone(),
                        persona: schema.persona.clone(),
                        context: context.clone(),
                        max_length: leaf.entry.constraints.max_length,
                    };
                    match provider.review(&request).await {
                        Ok(result) => review.items.push(ReviewedItem {
                            key,
                            source_text: leaf.entry.description.clone(),
                            translated_text,
                            result,
                        }),
                        Err(e @ ProviderError::Unsupported(_)) => return Err(e),
                        Err(e) => {
                            warn!("Review of {} failed: {}", key, e);
                            review.errors += 1;
                        }
                    }
                }
            }
        }

        info!(
            "{}: {} passed, {} failed, {} error(s)",
            lang,
            review.passed(),
            review.failed(),
            review.errors
        );
        report.languages.push(review);
    }

    Ok(report)
}
