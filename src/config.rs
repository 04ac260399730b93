//! Configuration management for insight computation
//!
//! TOML file support, environment variable overrides, and defaults.
//!
//! ```toml
//! [execution]
//! max_concurrency = 8
//! search_timeout_secs = 60
//! invocation_timeout_secs = 600
//! aggregation_capacity = 100000000
//! max_buckets = 1000
//! compression = "historical"
//!
//! [search]
//! pattern_type = "regexp"
//! case_sensitive = false
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::aggregation::DEFAULT_AGGREGATION_CAPACITY;
use crate::collaborators::QueryDefaults;
use crate::error::{InsightsError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InsightsConfig {
    /// Worker pool, deadlines and limits
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Defaults applied to scoped queries
    #[serde(default)]
    pub search: SearchConfig,
}

/// Which sampling compression strategy the executor applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Every sample point is searched
    None,
    /// Sample points resolving to the same commit share one search
    Historical,
}

/// Execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Maximum concurrent (repository, sample point) searches
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Budget for a single search in seconds
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,

    /// Budget for a whole invocation in seconds
    #[serde(default = "default_invocation_timeout_secs")]
    pub invocation_timeout_secs: u64,

    /// Total count cap per search aggregation
    #[serde(default = "default_aggregation_capacity")]
    pub aggregation_capacity: u64,

    /// Largest accepted window bucket count
    #[serde(default = "default_max_buckets")]
    pub max_buckets: i64,

    /// Sampling compression strategy
    #[serde(default = "default_compression")]
    pub compression: CompressionMode,
}

/// Search defaults
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Pattern type of submitted queries
    #[serde(default = "default_pattern_type")]
    pub pattern_type: String,

    /// Case sensitive matching and capture extraction
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Longest accepted search or invocation timeout (one week)
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

// Default value functions
fn default_max_concurrency() -> usize { 4 }
fn default_search_timeout_secs() -> u64 { 60 }
fn default_invocation_timeout_secs() -> u64 { 600 }
fn default_aggregation_capacity() -> u64 { DEFAULT_AGGREGATION_CAPACITY }
fn default_max_buckets() -> i64 { 1000 }
fn default_compression() -> CompressionMode { CompressionMode::None }
fn default_pattern_type() -> String { "regexp".to_string() }

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            search_timeout_secs: default_search_timeout_secs(),
            invocation_timeout_secs: default_invocation_timeout_secs(),
            aggregation_capacity: default_aggregation_capacity(),
            max_buckets: default_max_buckets(),
            compression: default_compression(),
        }
    }
}

impl ExecutionConfig {
    /// Per-search budget
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    /// Whole-invocation budget
    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(self.invocation_timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            pattern_type: default_pattern_type(),
            case_sensitive: false,
        }
    }
}

impl SearchConfig {
    /// Query defaults derived from this section
    pub fn query_defaults(&self) -> QueryDefaults {
        QueryDefaults {
            pattern_type: self.pattern_type.clone(),
            case_sensitive: self.case_sensitive,
            timeout: None,
        }
    }
}

impl InsightsConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            InsightsError::Configuration(format!("Failed to read config file {}: {}", path, e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            InsightsError::Configuration(format!("Failed to parse config file {}: {}", path, e))
        })
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("INSIGHTS_MAX_CONCURRENCY") {
            if let Ok(n) = v.parse() {
                self.execution.max_concurrency = n;
            }
        }
        if let Ok(v) = std::env::var("INSIGHTS_SEARCH_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.execution.search_timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("INSIGHTS_INVOCATION_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.execution.invocation_timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("INSIGHTS_AGGREGATION_CAPACITY") {
            if let Ok(n) = v.parse() {
                self.execution.aggregation_capacity = n;
            }
        }
        if let Ok(v) = std::env::var("INSIGHTS_COMPRESSION") {
            match v.to_ascii_lowercase().as_str() {
                "none" => self.execution.compression = CompressionMode::None,
                "historical" => self.execution.compression = CompressionMode::Historical,
                _ => {}
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(InsightsError::Configuration(msg.to_string()));

        if self.execution.max_concurrency == 0 {
            return invalid("max_concurrency must be > 0");
        }
        if self.execution.max_concurrency > Semaphore::MAX_PERMITS {
            return invalid("max_concurrency exceeds the maximum number of permits");
        }
        if self.execution.search_timeout_secs == 0 {
            return invalid("search_timeout_secs must be > 0");
        }
        if self.execution.search_timeout_secs > MAX_TIMEOUT_SECS {
            return invalid("search_timeout_secs must be <= one week");
        }
        if self.execution.invocation_timeout_secs > MAX_TIMEOUT_SECS {
            return invalid("invocation_timeout_secs must be <= one week");
        }
        if self.execution.invocation_timeout_secs < self.execution.search_timeout_secs {
            return invalid("invocation_timeout_secs must be >= search_timeout_secs");
        }
        if self.execution.max_buckets <= 0 {
            return invalid("max_buckets must be > 0");
        }
        if self.search.pattern_type.trim().is_empty() {
            return invalid("pattern_type cannot be empty");
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let contents = toml::to_string_pretty(self).map_err(|e| {
            InsightsError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents).map_err(|e| {
            InsightsError::Configuration(format!("Failed to write config file {}: {}", path, e))
        })
    }
}
