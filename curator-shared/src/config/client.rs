//! Layered client configuration: defaults, file, then environment.

use crate::models::RolePolicy;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised while resolving a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file {path}: {message}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The file extension is not one we know how to read.
    #[error("unsupported configuration format for {0}. Use 'yaml', 'json' or 'toml'.")]
    UnsupportedFormat(PathBuf),

    /// An environment variable held an unusable value.
    #[error("invalid {name} value: {message}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// What was wrong with its value.
        message: String,
    },

    /// The resolved configuration failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Text or JSON output.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Configuration for the session core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL every API path is resolved against.
    pub api_base_url: Url,

    /// Location of the persisted token file. `None` uses the platform config dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,

    /// Role derivation policy.
    #[serde(default)]
    pub role_policy: RolePolicy,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_API_BASE_URL).expect("default API base URL is valid")
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ClientConfig {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            api_base_url: default_base_url(),
            token_path: None,
            role_policy: RolePolicy::Legacy,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            logging: LoggingConfig::default(),
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Environment variables only apply to values the file left at their defaults.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when the file cannot be read or parsed, an
    /// environment variable is malformed, or validation fails.
    pub fn load_config(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::with_defaults(),
        };

        config.apply_env_overrides_from(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file, choosing the format from its extension.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when the file is unreadable, malformed, or of
    /// an unsupported format.
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "loading configuration file");
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let parse_error = |message: String| ConfigError::Parse {
            path: path.clone(),
            message,
        };

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => {
                serde_yml::from_str(&content).map_err(|err| parse_error(err.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|err| parse_error(err.to_string()))
            }
            Some("toml") => toml::from_str(&content).map_err(|err| parse_error(err.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.clone())),
        }
    }

    /// Apply `CURATOR_*` overrides using `lookup` to read variables.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEnv`] when a variable cannot be parsed.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::with_defaults();

        if self.api_base_url == defaults.api_base_url {
            if let Some(value) = lookup("CURATOR_API_BASE_URL") {
                self.api_base_url =
                    Url::parse(&value).map_err(|err| ConfigError::InvalidEnv {
                        name: "CURATOR_API_BASE_URL",
                        message: err.to_string(),
                    })?;
            }
        }
        if self.token_path.is_none() {
            if let Some(value) = lookup("CURATOR_TOKEN_PATH") {
                self.token_path = Some(PathBuf::from(value));
            }
        }
        if self.role_policy == defaults.role_policy {
            if let Some(value) = lookup("CURATOR_ROLE_POLICY") {
                self.role_policy = value.parse().map_err(|message: &str| {
                    ConfigError::InvalidEnv {
                        name: "CURATOR_ROLE_POLICY",
                        message: message.to_string(),
                    }
                })?;
            }
        }
        if self.request_timeout_secs == defaults.request_timeout_secs {
            if let Some(value) = lookup("CURATOR_REQUEST_TIMEOUT_SECS") {
                self.request_timeout_secs =
                    value.parse().map_err(|_| ConfigError::InvalidEnv {
                        name: "CURATOR_REQUEST_TIMEOUT_SECS",
                        message: "must be a whole number of seconds".to_string(),
                    })?;
            }
        }
        if self.logging.level == defaults.logging.level {
            if let Some(value) = lookup("CURATOR_LOG_LEVEL") {
                self.logging.level = value;
            }
        }
        if self.logging.format == defaults.logging.format {
            if let Some(value) = lookup("CURATOR_LOG_FORMAT") {
                self.logging.format = match value.trim().to_ascii_lowercase().as_str() {
                    "text" => LogFormat::Text,
                    "json" => LogFormat::Json,
                    other => {
                        return Err(ConfigError::InvalidEnv {
                            name: "CURATOR_LOG_FORMAT",
                            message: format!("unknown log format '{other}'"),
                        });
                    }
                };
            }
        }

        Ok(())
    }

    /// Validate the resolved configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "api_base_url '{}' cannot be used as a base URL",
                self.api_base_url
            )));
        }
        if !matches!(self.api_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "api_base_url must use http or https, got '{}'",
                self.api_base_url.scheme()
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved location of the token file.
    #[must_use]
    pub fn resolved_token_path(&self) -> PathBuf {
        self.token_path.clone().unwrap_or_else(default_token_path)
    }
}

/// Platform default for the token file.
#[must_use]
pub fn default_token_path() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("curator").join("tokens.json"))
        .unwrap_or_else(|| PathBuf::from("./curator-tokens.json"))
}
