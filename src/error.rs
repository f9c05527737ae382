//! Error types for the localization pipeline
use std::path::PathBuf;

use thiserror::Error;

use crate::provider::ProviderError;

/// Failure to load or validate a schema file. Always fatal for a run.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Invalid JSON in schema file '{}': {message}", .path.display())]
    InvalidJson { path: PathBuf, message: String },
    #[error("Invalid schema '{}': {message}", .path.display())]
    Validation { path: PathBuf, message: String },
}

/// Failure to load or validate the configuration file. Always fatal for a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Invalid JSON in config file '{}': {message}", .path.display())]
    InvalidJson { path: PathBuf, message: String },
    #[error("Invalid config: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to write state file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize output document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Top-level error returned by the generator, review pass and CLI
#[derive(Debug, Error)]
pub enum I18nError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, I18nError>;
