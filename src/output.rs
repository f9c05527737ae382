//! Per-language output documents and the merging writer
//!
//! Each (schema, language) pair has one nested JSON document at
//! `{outputDir}/{prefix}.{lang}.json`. Writing merges into what is already
//! on disk: values produced in this run are inserted, previously generated
//! values that are still valid are kept, stale values are removed, and keys
//! that no schema knows about are left alone.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::OutputError;
use crate::persist::{to_pretty_json, write_atomic};
use crate::provider::{GeneratedText, PluralForms};
use crate::schema::Schema;
use crate::state::{StateStore, split_state_key, state_key};

/// Generated values keyed by (state key, language)
pub type GeneratedTexts = BTreeMap<(String, String), GeneratedText>;

pub fn output_file(output_dir: &Path, prefix: &str, lang: &str) -> PathBuf {
    output_dir.join(format!("{}.{}.json", prefix, lang))
}

/// Whether a document value has the shape the entry needs
pub fn is_well_shaped(value: &Value, is_plural: bool) -> bool {
    if is_plural {
        PluralForms::from_document_value(value).is_some()
    } else {
        value.is_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputDocument {
    root: Map<String, Value>,
}

impl OutputDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a document; `None` when the file is missing or is not a JSON
    /// object (the latter with a warning)
    pub fn load(path: &Path) -> Option<Self> {
        let data = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read output file {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<Value>(&data) {
            Ok(Value::Object(root)) => Some(Self { root }),
            Ok(_) => {
                warn!("Output file {} is not a JSON object, ignoring it", path.display());
                None
            }
            Err(e) => {
                warn!("Failed to parse output file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        segments.try_fold(self.root.get(first)?, |node, segment| {
            node.as_object()?.get(segment)
        })
    }

    /// Set the value at a dotted path, creating (or replacing non-object)
    /// intermediate nodes
    pub fn set(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut node = &mut self.root;
        for segment in parents {
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            node = match child {
                Value::Object(map) => map,
                _ => return,
            };
        }
        node.insert(last.to_string(), value);
    }

    /// Remove the value at a dotted path. Groups left empty by the removal
    /// are removed too. Returns whether anything was removed.
    pub fn remove(&mut self, path: &str) -> bool {
        let segments: Vec<&str> = path.split('.').collect();
        remove_in(&mut self.root, &segments)
    }

    pub fn to_json(&self) -> Result<String, OutputError> {
        Ok(to_pretty_json(&self.root)?)
    }
}

fn remove_in(map: &mut Map<String, Value>, segments: &[&str]) -> bool {
    match segments {
        [] => false,
        [last] => map.remove(*last).is_some(),
        [first, rest @ ..] => {
            let Some(Value::Object(child)) = map.get_mut(*first) else {
                return false;
            };
            let removed = remove_in(child, rest);
            if removed && child.is_empty() {
                map.remove(*first);
            }
            removed
        }
    }
}

/// Output documents loaded at most once per run, keyed by (prefix, language)
#[derive(Debug)]
pub struct DocumentCache {
    output_dir: PathBuf,
    documents: BTreeMap<(String, String), Option<OutputDocument>>,
}

impl DocumentCache {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            documents: BTreeMap::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The document on disk, or `None` when it is missing or malformed
    pub fn get(&mut self, prefix: &str, lang: &str) -> Option<&OutputDocument> {
        let output_dir = &self.output_dir;
        self.documents
            .entry((prefix.to_string(), lang.to_string()))
            .or_insert_with(|| OutputDocument::load(&output_file(output_dir, prefix, lang)))
            .as_ref()
    }

    /// Remove a document from the cache for editing
    pub fn take(&mut self, prefix: &str, lang: &str) -> Option<OutputDocument> {
        match self.documents.remove(&(prefix.to_string(), lang.to_string())) {
            Some(doc) => doc,
            None => OutputDocument::load(&output_file(&self.output_dir, prefix, lang)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub files_written: usize,
    pub files_unchanged: usize,
    pub values_removed: usize,
}

/// Merge this run's results into every output document and write them.
///
/// For each leaf of each schema and each target language:
/// - a value generated this run is inserted,
/// - otherwise an existing well-shaped value is kept if the state records
///   text for that language,
/// - otherwise the path is removed.
///
/// Paths of `orphans` (state keys swept this run) are removed from the
/// documents of their prefix before any leaf is merged. An orphan path that
/// now holds a group of live leaves is left to the leaf pass. Everything
/// else in a document is untouched.
pub fn write_outputs(
    schemas: &[Schema],
    state: &StateStore,
    generated: &GeneratedTexts,
    orphans: &[String],
    cache: &mut DocumentCache,
) -> Result<WriteReport, OutputError> {
    let mut report = WriteReport::default();
    let mut written: BTreeSet<PathBuf> = BTreeSet::new();

    for schema in schemas {
        for lang in &schema.target_languages {
            let path = output_file(cache.output_dir(), &schema.prefix, lang);
            if !written.insert(path.clone()) {
                warn!(
                    "Output file {} is produced by more than one schema; later schemas overwrite earlier ones",
                    path.display()
                );
            }
            let mut doc = cache.take(&schema.prefix, lang).unwrap_or_default();

            for orphan in orphans {
                let Some((prefix, out_path)) = split_state_key(orphan) else {
                    continue;
                };
                if prefix != schema.prefix {
                    continue;
                }
                let holds_live_group = doc.get(out_path).is_some_and(|value| {
                    value.is_object()
                        && PluralForms::from_document_value(value).is_none()
                        && covers_live_leaf(schema, out_path)
                });
                if holds_live_group {
                    continue;
                }
                if doc.remove(out_path) {
                    debug!("Removed orphaned value {} from {}", out_path, path.display());
                    report.values_removed += 1;
                }
            }

            for leaf in schema.leaves() {
                let key = state_key(&schema.prefix, leaf.entity, leaf.key_path);
                let out_path = leaf.output_path();
                if let Some(text) = generated.get(&(key.clone(), lang.clone())) {
                    doc.set(&out_path, text.to_value());
                    continue;
                }
                let keep = state.has_text(&key, lang)
                    && doc
                        .get(&out_path)
                        .is_some_and(|v| is_well_shaped(v, leaf.entry.is_plural));
                if !keep && doc.remove(&out_path) {
                    debug!("Removed stale value {} from {}", out_path, path.display());
                    report.values_removed += 1;
                }
            }

            let json = doc.to_json()?;
            if fs::read_to_string(&path).is_ok_and(|existing| existing == json) {
                report.files_unchanged += 1;
                continue;
            }
            write_atomic(&path, json.as_bytes()).map_err(|source| OutputError::Write {
                path: path.clone(),
                source,
            })?;
            info!("Wrote {}", path.display());
            report.files_written += 1;
        }
    }

    Ok(report)
}

/// Whether some leaf of `schema` lives at or below `out_path`
fn covers_live_leaf(schema: &Schema, out_path: &str) -> bool {
    schema.leaves().any(|leaf| {
        let live = leaf.output_path();
        live == out_path
            || live
                .strip_prefix(out_path)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> OutputDocument {
        match value {
            Value::Object(root) => OutputDocument { root },
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_get_nested() {
        let d = doc(json!({"user": {"settings": {"title": "Réglages"}}}));
        assert_eq!(d.get("user.settings.title"), Some(&json!("Réglages")));
        assert_eq!(d.get("user.settings"), Some(&json!({"title": "Réglages"})));
        assert_eq!(d.get("user.missing"), None);
        assert_eq!(d.get("user.settings.title.deeper"), None);
    }

    #[test]
    fn test_set_creates_and_replaces_intermediates() {
        let mut d = doc(json!({"user": "flat string"}));
        d.set("user.greeting", json!("Bonjour"));
        d.set("common.ok", json!("OK"));
        assert_eq!(
            d,
            doc(json!({"user": {"greeting": "Bonjour"}, "common": {"ok": "OK"}}))
        );
    }

    #[test]
    fn test_remove_prunes_empty_groups() {
        let mut d = doc(json!({
            "user": {"settings": {"title": "x"}, "greeting": "y"},
            "manual": {}
        }));
        assert!(d.remove("user.settings.title"));
        assert_eq!(d, doc(json!({"user": {"greeting": "y"}, "manual": {}})));
        assert!(d.remove("user.greeting"));
        assert_eq!(d, doc(json!({"manual": {}})));
        assert!(!d.remove("user.greeting"));
    }

    #[test]
    fn test_is_well_shaped() {
        assert!(is_well_shaped(&json!("x"), false));
        assert!(!is_well_shaped(&json!({"=0": "a"}), false));
        assert!(is_well_shaped(&json!({"=0": "a", "=1": "b", ">1": "c"}), true));
        assert!(!is_well_shaped(&json!({"=0": "a", "=1": "b"}), true));
        assert!(!is_well_shaped(&json!("x"), true));
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.fr.json");
        assert!(OutputDocument::load(&path).is_none());
        fs::write(&path, "not json").unwrap();
        assert!(OutputDocument::load(&path).is_none());
        fs::write(&path, "[]").unwrap();
        assert!(OutputDocument::load(&path).is_none());
        fs::write(&path, r#"{"a": {"b": "c"}}"#).unwrap();
        assert_eq!(
            OutputDocument::load(&path).unwrap().get("a.b"),
            Some(&json!("c"))
        );
    }

    #[test]
    fn test_document_cache_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_file(dir.path(), "app", "fr");
        fs::write(&path, r#"{"a": {"b": "first"}}"#).unwrap();

        let mut cache = DocumentCache::new(dir.path());
        assert!(cache.get("app", "fr").is_some());
        fs::write(&path, r#"{"a": {"b": "second"}}"#).unwrap();
        assert_eq!(
            cache.get("app", "fr").unwrap().get("a.b"),
            Some(&json!("first"))
        );
        assert!(cache.get("app", "de").is_none());
    }

    #[test]
    fn test_to_json_is_sorted_and_pretty() {
        let mut d = OutputDocument::new();
        d.set("z.b", json!("2"));
        d.set("a.c", json!("1"));
        assert_eq!(
            d.to_json().unwrap(),
            "{\n  \"a\": {\n    \"c\": \"1\"\n  },\n  \"z\": {\n    \"b\": \"2\"\n  }\n}\n"
        );
    }
}
