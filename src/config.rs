use std::collections::HashSet;
use std::fs;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::collector::retry::{PolicyError, RetryPolicy};
use crate::sources;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// This is the top-level configuration structure loaded from
// `config.json`.
//
// It defines:
// - Retry policy shared by every source
// - Optional run deadline
// - HTTP client settings
// - The list of sources to collect
// - Optional debug configuration
//
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub retry: RetryConfig,

    /// Cancels still-running sources once elapsed (milliseconds)
    #[serde(default)]
    pub deadline_ms: Option<u64>,

    #[serde(default)]
    pub http: HttpConfig,

    /// Sources in collection order
    pub sources: Vec<SourceConfig>,

    pub debug: Option<DebugConfig>,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid retry policy: {0}")]
    Retry(#[from] PolicyError),

    #[error("no sources configured")]
    NoSources,

    #[error("duplicate source name '{0}'")]
    DuplicateSource(String),

    #[error("source '{name}' has unsupported kind '{kind}'")]
    UnknownKind { name: String, kind: String },

    #[error("source '{0}' needs a url, its kind has no default endpoint")]
    MissingUrl(String),
}

// ------------------------------------------------------------
// Retry configuration
// ------------------------------------------------------------
//
// Notes:
// - `max_retries` counts every attempt, including the first.
// - Backoff after attempt i is `base_delay_ms * 2^i`.
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: RetryPolicy::DEFAULT_MAX_RETRIES,
            base_delay_ms: RetryPolicy::DEFAULT_BASE_DELAY.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy, PolicyError> {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
    }
}

// ------------------------------------------------------------
// HTTP configuration
// ------------------------------------------------------------
//
// Applies to every HTTP-backed source. The per-request timeout
// bounds a single attempt, not the whole retry loop.
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_ms: u64,

    /// Some public APIs (api.weather.gov) reject requests without one
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: concat!("status-snapshot-collector/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// ------------------------------------------------------------
// Source configuration
// ------------------------------------------------------------
//
// One entry per external feed.
//
// - `name` is the key in the collection result
// - `kind` selects the adapter ("weather", "alerts", "traffic", "gauges")
// - `url` overrides the adapter's default endpoint
//
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,

    pub kind: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

// ------------------------------------------------------------
// Debug configuration
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DebugConfig {
    /// Raises the default log filter to `debug`
    pub log: Option<bool>,
}

impl Config {
    /// Parses and validates a JSON document.
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_json::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.policy()?;

        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::DuplicateSource(source.name.clone()));
            }
            let Some(adapter) = sources::get_adapter(&source.kind) else {
                return Err(ConfigError::UnknownKind {
                    name: source.name.clone(),
                    kind: source.kind.clone(),
                });
            };
            if source.url.is_none() && adapter.default_url().is_none() {
                return Err(ConfigError::MissingUrl(source.name.clone()));
            }
        }

        Ok(())
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn debug_log(&self) -> bool {
        self.debug
            .as_ref()
            .is_some_and(|d| d.log.unwrap_or(false))
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// Reads a JSON configuration file from disk and validates it.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    Config::from_json(&data)
}
