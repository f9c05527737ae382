//! Configuration file loading
//!
//! ```json
//! {
//!     "schemaFiles": ["./i18n/app.schema.json"],
//!     "outputDir": "./locales",
//!     "sourceLanguage": "en",
//!     "statePath": ".i18n-llm-state.json",
//!     "historyPath": ".i18n-llm-history.json",
//!     "providerConfig": { "provider": "openai", "model": "gpt-4.1-mini" },
//!     "maxBatchSize": 50
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the config file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{ConfigError, SchemaError};
use crate::provider::ProviderConfig;
use crate::provider::language::validate_locale;
use crate::schema::{Glossary, Persona, Schema, load_schemas};

pub const DEFAULT_CONFIG_FILE: &str = "i18n-llm.config.json";
pub const DEFAULT_STATE_PATH: &str = ".i18n-llm-state.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default, alias = "schemaPaths")]
    schema_files: Option<Vec<String>>,
    #[serde(default)]
    output_dir: Option<String>,
    #[serde(default)]
    source_language: Option<String>,
    #[serde(default)]
    state_path: Option<String>,
    #[serde(default)]
    history_path: Option<String>,
    #[serde(default)]
    persona: Option<Persona>,
    #[serde(default)]
    glossary: Option<Glossary>,
    #[serde(default)]
    provider_config: Option<ProviderConfig>,
    #[serde(default)]
    max_batch_size: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub schema_files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub source_language: String,
    pub state_path: PathBuf,
    /// Generation history is only recorded when this is set
    pub history_path: Option<PathBuf>,
    /// Used for schemas that declare no persona
    pub persona: Option<Persona>,
    /// Used for schemas that declare no glossary
    pub glossary: Option<Glossary>,
    pub provider: ProviderConfig,
    pub max_batch_size: Option<usize>,
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Validation(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                ))
            }
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| ConfigError::InvalidJson {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let base_dir = path.parent().unwrap_or(Path::new(""));
        Self::from_value(base_dir, &value)
    }

    /// Validate an already-parsed config, resolving paths against `base_dir`
    pub fn from_value(base_dir: &Path, value: &Value) -> Result<Self, ConfigError> {
        if !value.is_object() {
            return Err(ConfigError::Validation(
                "Config must be a valid object".to_string(),
            ));
        }
        let raw: RawConfig = serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        let schema_files = raw.schema_files.ok_or_else(|| {
            ConfigError::Validation(
                "Config must have \"schemaFiles\" or \"schemaPaths\" as an array".to_string(),
            )
        })?;
        if schema_files.is_empty() {
            return Err(ConfigError::Validation(
                "Config must have at least one schema file".to_string(),
            ));
        }

        let output_dir = raw
            .output_dir
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::Validation("Config must have \"outputDir\" as a string".to_string())
            })?;

        let source_language = raw
            .source_language
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::Validation(
                    "Config must have \"sourceLanguage\" as a string".to_string(),
                )
            })?;
        validate_locale(&source_language).map_err(|e| ConfigError::Validation(e.to_string()))?;

        if raw.max_batch_size == Some(0) {
            return Err(ConfigError::Validation(
                "Config \"maxBatchSize\" must be a positive integer".to_string(),
            ));
        }

        let resolve = |p: &str| base_dir.join(p);
        Ok(Config {
            schema_files: schema_files.iter().map(|p| resolve(p.as_str())).collect(),
            output_dir: resolve(output_dir.as_str()),
            source_language,
            state_path: resolve(raw.state_path.as_deref().unwrap_or(DEFAULT_STATE_PATH)),
            history_path: raw.history_path.as_deref().map(resolve),
            persona: raw.persona,
            glossary: raw.glossary,
            provider: raw.provider_config.unwrap_or_default(),
            max_batch_size: raw.max_batch_size,
        })
    }

    /// Load every configured schema, filling in the config-wide persona and
    /// glossary where a schema has none
    pub fn load_schemas(&self) -> Result<Vec<Schema>, SchemaError> {
        let mut schemas = load_schemas(&self.schema_files)?;
        for schema in &mut schemas {
            if schema.source_language != self.source_language {
                warn!(
                    "Schema {} uses source language '{}' but the config says '{}'; using the schema's",
                    schema.path.display(),
                    schema.source_language,
                    self.source_language
                );
            }
            schema.apply_defaults(self.persona.as_ref(), self.glossary.as_ref());
        }
        Ok(schemas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = Config::from_value(
            Path::new("/project"),
            &json!({
                "schemaPaths": ["i18n/app.schema.json"],
                "outputDir": "locales",
                "sourceLanguage": "en"
            }),
        )
        .unwrap();
        assert_eq!(
            config.schema_files,
            vec![PathBuf::from("/project/i18n/app.schema.json")]
        );
        assert_eq!(config.output_dir, PathBuf::from("/project/locales"));
        assert_eq!(config.state_path, PathBuf::from("/project/.i18n-llm-state.json"));
        assert_eq!(config.history_path, None);
        assert_eq!(config.provider.provider, "openai");
        assert_eq!(config.provider.model_or_default(), "gpt-4.1-mini");
        assert_eq!(config.max_batch_size, None);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_value(
            Path::new("/project"),
            &json!({
                "schemaFiles": ["a.schema.json", "/abs/b.schema.json"],
                "outputDir": "out",
                "sourceLanguage": "en-US",
                "statePath": "state/i18n.json",
                "historyPath": "history.json",
                "persona": { "role": "guide", "tone": "warm" },
                "glossary": { "Inbox": "Inbox" },
                "providerConfig": { "provider": "gemini", "apiKey": "g" },
                "maxBatchSize": 25
            }),
        )
        .unwrap();
        assert_eq!(config.schema_files[1], PathBuf::from("/abs/b.schema.json"));
        assert_eq!(config.state_path, PathBuf::from("/project/state/i18n.json"));
        assert_eq!(config.history_path, Some(PathBuf::from("/project/history.json")));
        assert_eq!(config.persona.unwrap().tone.as_deref(), Some("warm"));
        assert_eq!(config.glossary.unwrap()["Inbox"], "Inbox");
        assert_eq!(config.provider.model_or_default(), "gemini-2.5-flash");
        assert_eq!(config.max_batch_size, Some(25));
    }

    #[test]
    fn test_validation_errors() {
        let cases = vec![
            json!([]),
            json!({"outputDir": "o", "sourceLanguage": "en"}),
            json!({"schemaFiles": [], "outputDir": "o", "sourceLanguage": "en"}),
            json!({"schemaFiles": [1], "outputDir": "o", "sourceLanguage": "en"}),
            json!({"schemaFiles": ["a"], "sourceLanguage": "en"}),
            json!({"schemaFiles": ["a"], "outputDir": "o"}),
            json!({"schemaFiles": ["a"], "outputDir": "o", "sourceLanguage": "en", "persona": "x"}),
            json!({"schemaFiles": ["a"], "outputDir": "o", "sourceLanguage": "en", "maxBatchSize": 0}),
            json!({"schemaFiles": ["a"], "outputDir": "o", "sourceLanguage": "en",
                   "providerConfig": {"model": 5}}),
        ];
        for case in cases {
            assert!(
                matches!(
                    Config::from_value(Path::new("."), &case),
                    Err(ConfigError::Validation(_))
                ),
                "expected validation error for {}",
                case
            );
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        assert!(matches!(Config::load(&path), Err(ConfigError::NotFound(_))));

        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::InvalidJson { .. })));

        fs::write(
            &path,
            r#"{"schemaFiles": ["app.schema.json"], "outputDir": "locales", "sourceLanguage": "en"}"#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.output_dir, dir.path().join("locales"));
    }

    #[test]
    fn test_load_schemas_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("app.schema.json"),
            json!({
                "sourceLanguage": "en",
                "targetLanguages": ["fr"],
                "entities": { "user": { "greeting": { "description": "Hi" } } }
            })
            .to_string(),
        )
        .unwrap();
        let config = Config::from_value(
            dir.path(),
            &json!({
                "schemaFiles": ["app.schema.json"],
                "outputDir": "locales",
                "sourceLanguage": "en",
                "persona": { "role": "butler" }
            }),
        )
        .unwrap();
        let schemas = config.load_schemas().unwrap();
        assert_eq!(
            schemas[0].persona.as_ref().unwrap().role.as_deref(),
            Some("butler")
        );
    }
}
