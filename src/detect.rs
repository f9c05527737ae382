//! Change detection: which (entry, language) pairs need generating

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, info};

use crate::hash::content_hash;
use crate::output::{DocumentCache, is_well_shaped};
use crate::schema::Schema;
use crate::state::{StateStore, state_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PendingReason {
    /// No state entry existed
    New,
    /// The content hash differs from the stored one
    Changed,
    /// Hash matches but the output value is absent, malformed or unrecorded
    Missing,
    /// Regeneration was requested for everything
    Forced,
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PendingReason::New => "new",
            PendingReason::Changed => "changed",
            PendingReason::Missing => "missing",
            PendingReason::Forced => "forced",
        };
        f.write_str(name)
    }
}

/// One entry that needs generating for one language
#[derive(Debug, Clone, PartialEq)]
pub struct PendingItem {
    pub schema_index: usize,
    pub state_key: String,
    pub entity: String,
    pub key_path: String,
    pub source_language: String,
    pub target_language: String,
    pub description: String,
    pub is_plural: bool,
    pub context: Option<String>,
    pub entity_context: Option<String>,
    pub category: Option<String>,
    pub max_length: Option<usize>,
    pub reason: PendingReason,
}

impl PendingItem {
    /// `entity.key.path`, the item's position in its output document
    pub fn output_path(&self) -> String {
        format!("{}.{}", self.entity, self.key_path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Ordered by schema, then leaf, then target language
    pub items: Vec<PendingItem>,
    /// State keys swept because no schema produces them anymore
    pub orphans: Vec<String>,
    pub counts: BTreeMap<PendingReason, usize>,
    pub total_leaves: usize,
}

impl Detection {
    pub fn count(&self, reason: PendingReason) -> usize {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Every state key the current schemas produce
pub fn valid_state_keys(schemas: &[Schema]) -> BTreeSet<String> {
    schemas
        .iter()
        .flat_map(|schema| {
            schema
                .leaves()
                .map(|leaf| state_key(&schema.prefix, leaf.entity, leaf.key_path))
        })
        .collect()
}

/// Find the minimal set of pending work and bring the state's content hashes
/// up to date.
///
/// Orphaned state keys are swept first. Then, per leaf: a missing state
/// entry makes every language `New`, a changed hash makes every language
/// `Changed` (clearing recorded text), `force` makes every language `Forced`.
/// Otherwise a language is `Missing` when its document lacks a well-shaped
/// value or the state has no text recorded for it.
pub fn detect_pending(
    schemas: &[Schema],
    state: &mut StateStore,
    cache: &mut DocumentCache,
    force: bool,
) -> Detection {
    let mut detection = Detection {
        orphans: state.cleanup(&valid_state_keys(schemas)),
        ..Default::default()
    };
    for orphan in &detection.orphans {
        debug!("Removed orphaned state key {}", orphan);
    }

    for (schema_index, schema) in schemas.iter().enumerate() {
        for leaf in schema.leaves() {
            detection.total_leaves += 1;
            let key = state_key(&schema.prefix, leaf.entity, leaf.key_path);
            let hash = content_hash(&leaf, schema.persona.as_ref(), schema.glossary.as_ref());

            let leaf_reason = match state.get(&key).map(|entry| entry.hash == hash) {
                None => Some(PendingReason::New),
                Some(_) if force => Some(PendingReason::Forced),
                Some(false) => Some(PendingReason::Changed),
                Some(true) => None,
            };
            match leaf_reason {
                Some(PendingReason::Forced) => state.clear_text_hashes(&key),
                Some(_) => state.set_hash(&key, &hash),
                None => {}
            }

            let output_path = leaf.output_path();
            for lang in &schema.target_languages {
                let reason = leaf_reason.or_else(|| {
                    let recorded = state.has_text(&key, lang);
                    let present = cache
                        .get(&schema.prefix, lang)
                        .and_then(|doc| doc.get(&output_path))
                        .is_some_and(|value| is_well_shaped(value, leaf.entry.is_plural));
                    (!recorded || !present).then_some(PendingReason::Missing)
                });
                let Some(reason) = reason else {
                    continue;
                };

                debug!("{} [{}] is pending ({})", key, lang, reason);
                *detection.counts.entry(reason).or_insert(0) += 1;
                detection.items.push(PendingItem {
                    schema_index,
                    state_key: key.clone(),
                    entity: leaf.entity.to_string(),
                    key_path: leaf.key_path.to_string(),
                    source_language: schema.source_language.clone(),
                    target_language: lang.clone(),
                    description: leaf.entry.description.clone(),
                    is_plural: leaf.entry.is_plural,
                    context: leaf.entry.context.clone(),
                    entity_context: leaf.entity_context.map(str::to_string),
                    category: leaf.entry.category.clone(),
                    max_length: leaf.entry.constraints.max_length,
                    reason,
                });
            }
        }
    }

    info!(
        "Detected {} pending item(s) across {} entries: {} new, {} changed, {} missing, {} forced; {} orphan(s) removed",
        detection.items.len(),
        detection.total_leaves,
        detection.count(PendingReason::New),
        detection.count(PendingReason::Changed),
        detection.count(PendingReason::Missing),
        detection.count(PendingReason::Forced),
        detection.orphans.len()
    );
    detection
}
