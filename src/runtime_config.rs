//! # Runtime Configuration Module
//!
//! Settings that shape how an application routes and dispatches.
//!
//! ## Sources
//!
//! Lowest precedence first:
//!
//! 1. [`RuntimeConfig::default`]
//! 2. A YAML (`.yaml` / `.yml`) or TOML (`.toml`) file
//! 3. `ROUTEWEAVE_*` environment variables
//!
//! Keys passed in the exclusion list of [`RuntimeConfig::apply_env`] are
//! never taken from the environment.
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |---|---|
//! | `ROUTEWEAVE_NAME` | `name` |
//! | `ROUTEWEAVE_ALLOW_OVERRIDE` | `allow_override` |
//! | `ROUTEWEAVE_ERROR_STATUS_THRESHOLD` | `error_status_threshold` |
//! | `ROUTEWEAVE_BODY_CHUNK_LIMIT` | `body_chunk_limit` |
//! | `ROUTEWEAVE_DEFAULT_DOMAIN` | `default_domain` |
//! | `ROUTEWEAVE_LOG_LEVEL` | `log.level` |
//! | `ROUTEWEAVE_LOG_FORMAT` | `log.format` |
//!
//! ## Usage
//!
//! ```rust
//! use routeweave::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::default();
//! assert_eq!(config.error_status_threshold, 400);
//! assert_eq!(config.body_chunk_limit, 1024);
//! ```

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::otel::{LogConfig, LogFormat};

/// Prefix of every environment variable read by [`RuntimeConfig::apply_env`].
pub const ENV_PREFIX: &str = "ROUTEWEAVE_";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unsupported config file extension for {0}, expected .yaml, .yml or .toml")]
    UnsupportedFormat(PathBuf),

    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Application-wide routing and dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Name of the root router. Never part of route names.
    pub name: String,
    /// Accept routes whose identity is already registered. The earliest one still answers.
    pub allow_override: bool,
    /// Statuses at or above this run error handlers instead of after-callbacks.
    pub error_status_threshold: u16,
    /// Largest chunk a handler may request from `body_read`.
    pub body_chunk_limit: usize,
    /// Domain given to routes registered without one.
    pub default_domain: Option<String>,
    pub log: LogConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            allow_override: false,
            error_status_threshold: 400,
            body_chunk_limit: 1024,
            default_domain: None,
            log: LogConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overlaid with the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(&[])?;
        Ok(config)
    }

    /// Parse a YAML or TOML file, picked by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?,
            Some("toml") => toml::from_str(&text).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then the optional file, then the environment minus `exclude`.
    pub fn load(path: Option<&Path>, exclude: &[&str]) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(exclude)?;
        Ok(config)
    }

    /// Overlay `ROUTEWEAVE_*` variables.
    ///
    /// `exclude` lists unprefixed keys (`"name"`, `"log_level"`, ...) to
    /// leave untouched.
    pub fn apply_env(&mut self, exclude: &[&str]) -> Result<(), ConfigError> {
        self.apply_vars(exclude, |key| env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    fn apply_vars<F>(&mut self, exclude: &[&str], lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            if exclude.iter().any(|e| e.eq_ignore_ascii_case(key)) {
                None
            } else {
                lookup(&key.to_ascii_uppercase())
            }
        };

        if let Some(v) = read("name") {
            self.name = v;
        }
        if let Some(v) = read("allow_override") {
            self.allow_override = parse_bool("allow_override", &v)?;
        }
        if let Some(v) = read("error_status_threshold") {
            self.error_status_threshold = parse_num("error_status_threshold", &v)?;
        }
        if let Some(v) = read("body_chunk_limit") {
            self.body_chunk_limit = parse_num("body_chunk_limit", &v)?;
        }
        if let Some(v) = read("default_domain") {
            self.default_domain = (!v.is_empty()).then_some(v);
        }
        if let Some(v) = read("log_level") {
            self.log.level = v;
        }
        if let Some(v) = read("log_format") {
            self.log.format = LogFormat::parse(&v);
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=999).contains(&self.error_status_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "error_status_threshold".into(),
                value: self.error_status_threshold.to_string(),
                reason: "must be a status code between 100 and 999".into(),
            });
        }
        if self.body_chunk_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "body_chunk_limit".into(),
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".into(),
        }),
    }
}

fn parse_num<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
