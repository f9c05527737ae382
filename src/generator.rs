//! One generation run: detect, schedule, write, save

use std::collections::BTreeMap;

use tracing::info;

use crate::config::Config;
use crate::detect::{PendingReason, detect_pending};
use crate::error::Result;
use crate::history::{GenerationRecord, append_records};
use crate::output::{DocumentCache, WriteReport, write_outputs};
use crate::provider::{LanguageModel, TokenUsage};
use crate::scheduler::{BatchScheduler, LanguageTally};
use crate::schema::Schema;
use crate::state::StateStore;

/// What a run did, for the CLI summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total_entries: usize,
    pub pending: usize,
    pub reasons: BTreeMap<PendingReason, usize>,
    pub generated: usize,
    /// Pending items left ungenerated (batch misses and failed fallbacks)
    pub failed: usize,
    pub batches: usize,
    pub fallbacks: usize,
    pub orphans_removed: usize,
    pub checkpoint_failures: usize,
    pub writes: WriteReport,
    pub usage: TokenUsage,
    pub by_language: BTreeMap<String, LanguageTally>,
}

impl RunSummary {
    pub fn is_up_to_date(&self) -> bool {
        self.pending == 0
    }
}

/// Run the pipeline once over `schemas`.
///
/// Item failures leave their keys pending for the next run and do not fail
/// the run. Outputs are still written and state saved. Only output write
/// failures and the final state save are fatal.
pub async fn run_generation(
    config: &Config,
    schemas: &[Schema],
    provider: &dyn LanguageModel,
    force: bool,
) -> Result<RunSummary> {
    let mut state = StateStore::load(&config.state_path);
    let mut cache = DocumentCache::new(&config.output_dir);

    let detection = detect_pending(schemas, &mut state, &mut cache, force);
    let mut summary = RunSummary {
        total_entries: detection.total_leaves,
        pending: detection.items.len(),
        reasons: detection.counts.clone(),
        orphans_removed: detection.orphans.len(),
        ..Default::default()
    };

    let report = BatchScheduler::new(provider)
        .with_max_batch_size(config.max_batch_size)
        .run(&detection.items, schemas, &mut state)
        .await;

    summary.writes = write_outputs(
        schemas,
        &state,
        &report.generated,
        &detection.orphans,
        &mut cache,
    )?;
    state.save()?;

    summary.generated = report.succeeded();
    summary.failed = report.misses + report.failed;
    summary.batches = report.batches;
    summary.fallbacks = report.fallbacks;
    summary.checkpoint_failures = report.checkpoint_failures;
    summary.usage = report.usage();
    summary.by_language = report.by_language;

    if let Some(history_path) = &config.history_path {
        let records = summary
            .by_language
            .iter()
            .filter(|(_, tally)| tally.created + tally.updated > 0)
            .map(|(lang, tally)| {
                let record = GenerationRecord::new(
                    provider.provider_name(),
                    provider.model(),
                    tally.created,
                    tally.updated,
                    tally.usage,
                );
                (lang.clone(), record)
            })
            .collect();
        append_records(history_path, records);
    }

    info!(
        "Run finished: {} generated, {} failed, {} file(s) written",
        summary.generated, summary.failed, summary.writes.files_written
    );
    Ok(summary)
}
