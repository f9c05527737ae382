//! Incremental LLM-powered localization.
//!
//! Schemas describe translatable entries. Each run detects which
//! (entry, language) pairs changed or are missing, asks a language model for
//! just those in batches, merges the results into per-language JSON files and
//! records content hashes so the next run can skip everything unchanged.

pub mod config;
pub mod detect;
pub mod error;
pub mod generator;
pub mod hash;
pub mod history;
pub mod output;
pub mod persist;
pub mod provider;
pub mod review;
pub mod scheduler;
pub mod schema;
pub mod state;
pub mod usage;

#[cfg(test)]
mod integration_tests;

pub use config::Config;
pub use detect::{Detection, PendingItem, PendingReason, detect_pending};
pub use error::{I18nError, Result};
pub use generator::{RunSummary, run_generation};
pub use history::{CostSummary, load_history};
pub use output::{DocumentCache, OutputDocument, write_outputs};
pub use provider::{LanguageModel, ProviderConfig, create_provider};
pub use review::{LanguageSelection, ReviewReport, review_outputs};
pub use scheduler::{BatchScheduler, ScheduleReport};
pub use schema::{Schema, load_schemas};
pub use state::{StateStats, StateStore};
pub use usage::{UsageEstimate, estimate_usage};
