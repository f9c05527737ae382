//! Batch scheduling of pending work
//!
//! Pending items are grouped by (target language, schema, entity context),
//! in the order detection produced them, and each group is sent to the
//! provider as one batch. A failed batch falls back to one call per item.
//! After every batch the state is checkpointed to disk so an interrupted run
//! loses at most one batch of work.

use std::collections::BTreeMap;

use tracing::{debug, error, info, warn};

use crate::detect::{PendingItem, PendingReason};
use crate::hash::text_hash;
use crate::output::GeneratedTexts;
use crate::provider::response::conform;
use crate::provider::{
    BatchItem, BatchRequest, GeneratedText, LanguageModel, TokenUsage, TranslationRequest,
};
use crate::schema::Schema;
use crate::state::StateStore;

/// Outcome counts for one target language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LanguageTally {
    /// Items generated for entries that had no state yet
    pub created: usize,
    /// Items regenerated because they changed, were missing or were forced
    pub updated: usize,
    pub failed: usize,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    pub generated: GeneratedTexts,
    pub batches: usize,
    /// Batches that failed as a whole and were retried item by item
    pub fallbacks: usize,
    /// Items a successful batch did not answer
    pub misses: usize,
    /// Items whose individual fallback call failed
    pub failed: usize,
    pub checkpoint_failures: usize,
    pub by_language: BTreeMap<String, LanguageTally>,
}

impl ScheduleReport {
    pub fn succeeded(&self) -> usize {
        self.generated.len()
    }

    pub fn usage(&self) -> TokenUsage {
        let mut total = TokenUsage::default();
        for tally in self.by_language.values() {
            total.add(tally.usage);
        }
        total
    }

    fn tally(&mut self, lang: &str) -> &mut LanguageTally {
        self.by_language.entry(lang.to_string()).or_default()
    }
}

pub struct BatchScheduler<'a> {
    provider: &'a dyn LanguageModel,
    max_batch_size: Option<usize>,
}

impl<'a> BatchScheduler<'a> {
    pub fn new(provider: &'a dyn LanguageModel) -> Self {
        Self {
            provider,
            max_batch_size: None,
        }
    }

    /// Split groups larger than `size` into consecutive chunks
    pub fn with_max_batch_size(mut self, size: Option<usize>) -> Self {
        self.max_batch_size = size.filter(|s| *s > 0);
        self
    }

    /// Group items into batches. Group order is first-seen order; item order
    /// within a group is preserved.
    pub fn plan<'i>(&self, items: &'i [PendingItem]) -> Vec<Vec<&'i PendingItem>> {
        let mut index: BTreeMap<(&str, usize, Option<&str>), usize> = BTreeMap::new();
        let mut groups: Vec<Vec<&PendingItem>> = Vec::new();
        for item in items {
            let key = (
                item.target_language.as_str(),
                item.schema_index,
                item.entity_context.as_deref(),
            );
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(item);
        }

        match self.max_batch_size {
            Some(size) => groups
                .into_iter()
                .flat_map(|group| {
                    group
                        .chunks(size)
                        .map(|chunk| chunk.to_vec())
                        .collect::<Vec<_>>()
                })
                .collect(),
            None => groups,
        }
    }

    /// Generate every pending item, recording successes in `state`
    pub async fn run(
        &self,
        items: &[PendingItem],
        schemas: &[Schema],
        state: &mut StateStore,
    ) -> ScheduleReport {
        let mut report = ScheduleReport::default();
        let batches = self.plan(items);
        let total = batches.len();

        for (n, batch) in batches.iter().enumerate() {
            let Some(first) = batch.first() else {
                continue;
            };
            let schema = &schemas[first.schema_index];
            info!(
                "Batch {}/{}: {} item(s) for {} from {}",
                n + 1,
                total,
                batch.len(),
                first.target_language,
                schema.prefix
            );
            report.batches += 1;

            let request = batch_request(batch, schema);
            match self.provider.translate_batch(&request).await {
                Ok(mut outcome) => {
                    report.tally(&first.target_language).usage.add(outcome.usage);
                    for item in batch {
                        match outcome.results.remove(&item.output_path()) {
                            Some(text) => apply(&mut report, state, item, text),
                            None => {
                                warn!(
                                    "No result for {} [{}] in batch response; it stays pending",
                                    item.state_key, item.target_language
                                );
                                report.misses += 1;
                                report.tally(&item.target_language).failed += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Batch for {} failed ({}); falling back to {} individual call(s)",
                        first.target_language,
                        e,
                        batch.len()
                    );
                    report.fallbacks += 1;
                    for item in batch {
                        let request = translation_request(item, schema);
                        match self.provider.translate(&request).await {
                            Ok(completion) => {
                                report.tally(&item.target_language).usage.add(completion.usage);
                                apply(&mut report, state, item, completion.text);
                            }
                            Err(e) => {
                                error!(
                                    "Failed to generate {} [{}]: {}",
                                    item.state_key, item.target_language, e
                                );
                                report.failed += 1;
                                report.tally(&item.target_language).failed += 1;
                            }
                        }
                    }
                }
            }

            if let Err(e) = state.save() {
                warn!("Failed to save state checkpoint: {}", e);
                report.checkpoint_failures += 1;
            }
        }

        report
    }
}

fn apply(report: &mut ScheduleReport, state: &mut StateStore, item: &PendingItem, text: GeneratedText) {
    if text.is_plural() != item.is_plural {
        warn!(
            "Result for {} [{}] has the wrong shape; it stays pending",
            item.state_key, item.target_language
        );
        report.failed += 1;
        report.tally(&item.target_language).failed += 1;
        return;
    }

    let text = conform(text, item.max_length, &item.state_key);
    state.record_text(&item.state_key, &item.target_language, text_hash(&text));
    debug!("Generated {} [{}]", item.state_key, item.target_language);

    let tally = report.tally(&item.target_language);
    if item.reason == PendingReason::New {
        tally.created += 1;
    } else {
        tally.updated += 1;
    }
    report
        .generated
        .insert((item.state_key.clone(), item.target_language.clone()), text);
}

/// Entity and item context joined, most general first
fn combined_context(item: &PendingItem) -> Option<String> {
    match (&item.entity_context, &item.context) {
        (Some(entity), Some(own)) => Some(format!("{} / {}", entity, own)),
        (Some(one), None) | (None, Some(one)) => Some(one.clone()),
        (None, None) => None,
    }
}

fn batch_request(batch: &[&PendingItem], schema: &Schema) -> BatchRequest {
    let first = batch[0];
    let shared_category = first
        .category
        .as_ref()
        .filter(|c| batch.iter().all(|i| i.category.as_ref() == Some(*c)))
        .cloned();

    BatchRequest {
        items: batch
            .iter()
            .map(|item| BatchItem {
                key: item.output_path(),
                source_text: item.description.clone(),
                is_plural: item.is_plural,
                max_length: item.max_length,
                context: item.context.clone(),
                category: item.category.clone(),
            })
            .collect(),
        source_language: first.source_language.clone(),
        target_language: first.target_language.clone(),
        persona: schema.persona.clone(),
        glossary: schema.glossary.clone(),
        context: first.entity_context.clone(),
        category: shared_category,
    }
}

fn translation_request(item: &PendingItem, schema: &Schema) -> TranslationRequest {
    TranslationRequest {
        source_text: item.description.clone(),
        source_language: item.source_language.clone(),
        target_language: item.target_language.clone(),
        persona: schema.persona.clone(),
        glossary: schema.glossary.clone(),
        context: combined_context(item),
        category: item.category.clone(),
        is_plural: item.is_plural,
        max_length: item.max_length,
    }
}
