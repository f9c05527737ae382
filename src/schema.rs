//! Schema model: translatable keys grouped into entities
//!
//! A schema file looks like:
//!
//! ```json
//! {
//!     "sourceLanguage": "en",
//!     "targetLanguages": ["fr", "de"],
//!     "persona": { "role": "friendly assistant", "tone": "casual" },
//!     "glossary": { "Dashboard": "Dashboard" },
//!     "entities": {
//!         "user": {
//!             "_context": "Account screens",
//!             "greeting": { "description": "Hello, {name}!" },
//!             "messages": {
//!                 "description": "Unread message counter",
//!                 "pluralization": true,
//!                 "constraints": { "maxLength": 40 }
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! Objects carrying a `description` string are leaves. Every other object is a
//! group. Keys starting with `_` are metadata and never become entries.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::provider::language::validate_locale;

/// Term → required rendering
pub type Glossary = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaExample {
    pub input: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Voice the model should write in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<PersonaExample>,
    /// Free-form fields (name, description, ...) kept so they still count
    /// towards the content hash.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

/// One translatable unit
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub description: String,
    pub is_plural: bool,
    pub context: Option<String>,
    pub category: Option<String>,
    pub constraints: Constraints,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupNode {
    /// `_context` declared on this group
    pub context: Option<String>,
    pub children: BTreeMap<String, EntryNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryNode {
    Leaf(SchemaEntry),
    Group(GroupNode),
}

/// A leaf together with its position in the schema
#[derive(Debug, Clone, Copy)]
pub struct LeafRef<'a> {
    pub entity: &'a str,
    pub key_path: &'a str,
    pub entry: &'a SchemaEntry,
    /// Nearest enclosing `_context`
    pub entity_context: Option<&'a str>,
}

impl LeafRef<'_> {
    /// Dotted path of this leaf inside an output document
    pub fn output_path(&self) -> String {
        format!("{}.{}", self.entity, self.key_path)
    }
}

#[derive(Debug, Clone)]
struct FlatLeaf {
    entity: String,
    key_path: String,
    entry: SchemaEntry,
    entity_context: Option<String>,
}

/// A parsed and validated schema document
#[derive(Debug, Clone)]
pub struct Schema {
    pub path: PathBuf,
    /// File name stem without `.schema`, used for state keys and output names
    pub prefix: String,
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub persona: Option<Persona>,
    pub glossary: Option<Glossary>,
    pub entities: BTreeMap<String, GroupNode>,
    leaves: Vec<FlatLeaf>,
}

impl Schema {
    /// Build a schema from already-parsed JSON
    pub fn from_value(path: &Path, value: &Value) -> Result<Self, SchemaError> {
        let invalid = |message: String| SchemaError::Validation {
            path: path.to_path_buf(),
            message,
        };

        let obj = value
            .as_object()
            .ok_or_else(|| invalid("Schema must be a valid JSON object".to_string()))?;

        let source_language = obj
            .get("sourceLanguage")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| invalid("Schema must have \"sourceLanguage\" as a string".to_string()))?
            .to_string();

        let targets = obj
            .get("targetLanguages")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("Schema must have \"targetLanguages\" as an array".to_string()))?;
        if targets.is_empty() {
            return Err(invalid(
                "Schema must have at least one target language".to_string(),
            ));
        }
        let mut target_languages = Vec::with_capacity(targets.len());
        for target in targets {
            let lang = target
                .as_str()
                .ok_or_else(|| invalid("All target languages must be strings".to_string()))?;
            validate_locale(lang).map_err(|e| invalid(e.to_string()))?;
            if !target_languages.iter().any(|l: &String| l == lang) {
                target_languages.push(lang.to_string());
            }
        }
        validate_locale(&source_language).map_err(|e| invalid(e.to_string()))?;

        let persona = match obj.get("persona") {
            None | Some(Value::Null) => None,
            Some(v @ Value::Object(_)) => Some(
                serde_json::from_value::<Persona>(v.clone())
                    .map_err(|e| invalid(format!("Invalid \"persona\": {}", e)))?,
            ),
            Some(_) => {
                return Err(invalid(
                    "Schema \"persona\" must be an object if provided".to_string(),
                ));
            }
        };

        let glossary = match obj.get("glossary") {
            None | Some(Value::Null) => None,
            Some(v @ Value::Object(_)) => Some(
                serde_json::from_value::<Glossary>(v.clone())
                    .map_err(|e| invalid(format!("Invalid \"glossary\": {}", e)))?,
            ),
            Some(_) => {
                return Err(invalid(
                    "Schema \"glossary\" must be an object if provided".to_string(),
                ));
            }
        };

        let raw_entities = obj
            .get("entities")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("Schema must have \"entities\" as an object".to_string()))?;
        if raw_entities.is_empty() {
            return Err(invalid("Schema must have at least one entity".to_string()));
        }

        let mut entities = BTreeMap::new();
        for (name, raw) in raw_entities {
            if name.starts_with('_') {
                continue;
            }
            let group = match parse_node(raw, name).map_err(invalid)? {
                EntryNode::Group(group) => group,
                EntryNode::Leaf(_) => {
                    return Err(invalid(format!(
                        "Entity \"{}\" must be an object of keys, not a single entry",
                        name
                    )));
                }
            };
            entities.insert(name.clone(), group);
        }

        let mut schema = Schema {
            path: path.to_path_buf(),
            prefix: schema_prefix(path),
            source_language,
            target_languages,
            persona,
            glossary,
            entities,
            leaves: Vec::new(),
        };
        schema.leaves = flatten(&schema.entities);
        Ok(schema)
    }

    /// All leaves in deterministic (sorted) order
    pub fn leaves(&self) -> impl Iterator<Item = LeafRef<'_>> {
        self.leaves.iter().map(|leaf| LeafRef {
            entity: &leaf.entity,
            key_path: &leaf.key_path,
            entry: &leaf.entry,
            entity_context: leaf.entity_context.as_deref(),
        })
    }

    /// Fill in persona and glossary from the configuration when the schema
    /// declares none
    pub fn apply_defaults(&mut self, persona: Option<&Persona>, glossary: Option<&Glossary>) {
        if self.persona.is_none() {
            self.persona = persona.cloned();
        }
        if self.glossary.is_none() {
            self.glossary = glossary.cloned();
        }
    }
}

/// `locales/app.schema.json` → `app`; `i18n.json` → `i18n`
pub fn schema_prefix(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("schema");
    let name = name.strip_suffix(".json").unwrap_or(name);
    let name = name.strip_suffix(".schema").unwrap_or(name);
    name.to_string()
}

fn parse_node(value: &Value, path: &str) -> Result<EntryNode, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| format!("\"{}\" must be an object", path))?;

    if let Some(description) = obj.get("description").and_then(Value::as_str) {
        return parse_leaf(obj, description, path).map(EntryNode::Leaf);
    }

    let mut group = GroupNode {
        context: obj
            .get("_context")
            .and_then(Value::as_str)
            .map(str::to_string),
        children: BTreeMap::new(),
    };
    for (key, child) in obj {
        if key.starts_with('_') {
            continue;
        }
        let child_path = format!("{}.{}", path, key);
        group.children.insert(key.clone(), parse_node(child, &child_path)?);
    }
    Ok(EntryNode::Group(group))
}

fn parse_leaf(obj: &Map<String, Value>, description: &str, path: &str) -> Result<SchemaEntry, String> {
    if description.trim().is_empty() {
        return Err(format!("\"{}\" has an empty description", path));
    }

    let is_plural = obj
        .get("pluralization")
        .or_else(|| obj.get("isPlural"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let max_length = match obj.get("constraints").and_then(|c| c.get("maxLength")) {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_u64() {
            Some(n) if n > 0 => Some(n as usize),
            _ => {
                return Err(format!(
                    "\"{}\" constraints.maxLength must be a positive integer",
                    path
                ));
            }
        },
    };

    Ok(SchemaEntry {
        description: description.to_string(),
        is_plural,
        context: obj.get("context").and_then(Value::as_str).map(str::to_string),
        category: obj.get("category").and_then(Value::as_str).map(str::to_string),
        constraints: Constraints { max_length },
    })
}

fn flatten(entities: &BTreeMap<String, GroupNode>) -> Vec<FlatLeaf> {
    fn walk(
        entity: &str,
        group: &GroupNode,
        prefix: &str,
        inherited: Option<&str>,
        out: &mut Vec<FlatLeaf>,
    ) {
        let context = group.context.as_deref().or(inherited);
        for (key, node) in &group.children {
            let key_path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            match node {
                EntryNode::Leaf(entry) => out.push(FlatLeaf {
                    entity: entity.to_string(),
                    key_path,
                    entry: entry.clone(),
                    entity_context: context.map(str::to_string),
                }),
                EntryNode::Group(child) => walk(entity, child, &key_path, context, out),
            }
        }
    }

    let mut out = Vec::new();
    for (name, group) in entities {
        walk(name, group, "", None, &mut out);
    }
    out
}

/// Load and validate one schema file
pub fn load_schema(path: &Path) -> Result<Schema, SchemaError> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SchemaError::NotFound(path.to_path_buf())
        } else {
            SchemaError::Validation {
                path: path.to_path_buf(),
                message: format!("Failed to read file: {}", e),
            }
        }
    })?;

    let value: Value = serde_json::from_str(&content).map_err(|e| SchemaError::InvalidJson {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Schema::from_value(path, &value)
}

/// Load every schema file, in order. The position in the returned vector is
/// the schema index used for batching.
pub fn load_schemas(paths: &[PathBuf]) -> Result<Vec<Schema>, SchemaError> {
    paths.iter().map(|p| load_schema(p)).collect()
}
