//! Configuration loading.
//!
//! [`load_config`] reads and decodes a configuration file, fills defaults,
//! and validates it. [`load_env`] resolves the file location from the
//! `CONFIG_FILEPATH` environment variable, deriving the format from the file
//! extension. Both return a single diagnostic on the first failure — the
//! entrypoint logs it and exits without listening.

use super::{GatewayConfig, ValidationError};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable naming the configuration file.
pub const CONFIG_FILEPATH_VAR: &str = "CONFIG_FILEPATH";

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Yaml,
    Json,
}

impl FileType {
    /// Derive the file type from a path's extension. Extensions are matched
    /// case-sensitively: only `.yaml` and `.json` are recognised.
    pub fn from_path(path: &str) -> Result<Self, LoadError> {
        if path.ends_with(".yaml") {
            Ok(FileType::Yaml)
        } else if path.ends_with(".json") {
            Ok(FileType::Json)
        } else {
            Err(LoadError::UnsupportedExtension(path.to_string()))
        }
    }
}

impl FromStr for FileType {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yaml" => Ok(FileType::Yaml),
            "json" => Ok(FileType::Json),
            other => Err(LoadError::UnsupportedFileType(other.to_string())),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Yaml => f.write_str("yaml"),
            FileType::Json => f.write_str("json"),
        }
    }
}

/// Failure to produce a usable configuration.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("could not decode config file '{path}': {reason}")]
    Decode { path: String, reason: String },

    #[error("unsupported config file type '{0}', expected 'yaml' or 'json'")]
    UnsupportedFileType(String),

    #[error("unsupported config file extension for '{0}', expected '.yaml' or '.json'")]
    UnsupportedExtension(String),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(&'static str),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Location and format of the configuration file, resolved from the
/// environment.
#[derive(Debug, Clone)]
pub struct EnvFile {
    pub path: String,
    pub file_type: FileType,
}

/// Resolve the configuration file from `CONFIG_FILEPATH`.
pub fn load_env() -> Result<EnvFile, LoadError> {
    let path = std::env::var(CONFIG_FILEPATH_VAR)
        .map_err(|_| LoadError::MissingEnvVar(CONFIG_FILEPATH_VAR))?;
    let file_type = FileType::from_path(&path)?;
    Ok(EnvFile { path, file_type })
}

/// Read, decode, default-fill, and validate a configuration file.
///
/// Validation stops at the first failure and never aggregates. Route-level
/// methods are propagated down to method-less paths only after validation
/// succeeds, so compiled routes always carry an effective method.
pub fn load_config(path: &str, file_type: FileType) -> Result<GatewayConfig, LoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_string(),
        source,
    })?;

    let mut cfg: GatewayConfig = match file_type {
        FileType::Yaml => serde_yaml::from_str(&raw).map_err(|e| LoadError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?,
        FileType::Json => serde_json::from_str(&raw).map_err(|e| LoadError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?,
    };

    cfg.fill_defaults();
    cfg.validate()?;
    cfg.inherit_path_methods();
    Ok(cfg)
}

// =============================================================================
// Tests
// =============================================================================
