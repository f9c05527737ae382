//! Persisted record of what has been generated
//!
//! The state file maps a state key (`{prefix}::{entity}.{key.path}`) to the
//! content hash the entry had when it was last generated and, per language,
//! the hash of the text that was written.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StateError;
use crate::persist::{to_pretty_json, write_atomic};

const KEY_SEPARATOR: &str = "::";

/// `app`, `user`, `settings.title` → `app::user.settings.title`
pub fn state_key(prefix: &str, entity: &str, key_path: &str) -> String {
    format!("{}{}{}.{}", prefix, KEY_SEPARATOR, entity, key_path)
}

/// `app::user.greeting` → (`app`, `user.greeting`)
pub fn split_state_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(KEY_SEPARATOR)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEntry {
    pub hash: String,
    #[serde(default)]
    pub text_hashes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateStats {
    pub total_keys: usize,
    pub total_texts: usize,
    pub by_language: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    entries: BTreeMap<String, StateEntry>,
}

impl StateStore {
    /// Empty store that will be saved to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the state file.
    ///
    /// A missing file yields an empty store. An unreadable or structurally
    /// invalid file also yields an empty store, with a warning, so the next
    /// run regenerates everything instead of failing.
    pub fn load(path: &Path) -> Self {
        let mut store = Self::new(path);
        if !path.exists() {
            debug!("No state file at {}, starting fresh", path.display());
            return store;
        }

        let data = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to read state file {}: {}", path.display(), e);
                return store;
            }
        };

        match serde_json::from_str::<BTreeMap<String, StateEntry>>(&data) {
            Ok(entries) => {
                debug!("Loaded {} state entries from {}", entries.len(), path.display());
                store.entries = entries;
            }
            Err(e) => {
                warn!(
                    "Ignoring invalid state file {}: {}. All keys will be regenerated.",
                    path.display(),
                    e
                );
            }
        }
        store
    }

    pub fn save(&self) -> Result<(), StateError> {
        let json = to_pretty_json(&self.entries)?;
        write_atomic(&self.path, json.as_bytes()).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&StateEntry> {
        self.entries.get(key)
    }

    /// Store a new content hash for `key`. Text hashes recorded under a
    /// different content hash are dropped.
    pub fn set_hash(&mut self, key: &str, hash: &str) {
        let entry = self.entries.entry(key.to_string()).or_default();
        if entry.hash != hash {
            entry.hash = hash.to_string();
            entry.text_hashes.clear();
        }
    }

    pub fn clear_text_hashes(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.text_hashes.clear();
        }
    }

    /// Record that text for `lang` was written for `key`.
    ///
    /// Ignored when the key has no entry; detection always creates one first.
    pub fn record_text(&mut self, key: &str, lang: &str, text_hash: String) {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.text_hashes.insert(lang.to_string(), text_hash);
            }
            None => warn!("Cannot record text for unknown state key '{}'", key),
        }
    }

    pub fn has_text(&self, key: &str, lang: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.text_hashes.contains_key(lang))
    }

    /// Remove every entry whose key is not in `valid`, returning the removed
    /// keys in sorted order
    pub fn cleanup(&mut self, valid: &BTreeSet<String>) -> Vec<String> {
        let removed: Vec<String> = self
            .entries
            .keys()
            .filter(|key| !valid.contains(*key))
            .cloned()
            .collect();
        for key in &removed {
            self.entries.remove(key);
        }
        removed
    }

    pub fn stats(&self) -> StateStats {
        let mut stats = StateStats {
            total_keys: self.entries.len(),
            ..Default::default()
        };
        for entry in self.entries.values() {
            for lang in entry.text_hashes.keys() {
                stats.total_texts += 1;
                *stats.by_language.entry(lang.clone()).or_insert(0) += 1;
            }
        }
        stats
    }
}
