//! Configuration loading for Concord.
//! Reads concord.toml from the current directory or path in CONCORD_CONFIG env var.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use concord_common::{ConcordError, Result};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CONCORD_CONFIG";

/// File read when `CONCORD_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "concord.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcordConfig {
    pub engine: EngineConfig,
    pub search: Option<SearchConfig>,
    pub store: Option<StoreConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_num_results")]
    pub num_results: usize,
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,
    #[serde(default)]
    pub weighting: WeightingKind,
    #[serde(default = "default_exact_link_key")]
    pub exact_link_key: String,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

fn default_num_results()      -> usize  { 25 }
fn default_stage_timeout_ms() -> u64    { 5_000 }
fn default_exact_link_key()   -> String { "exact_link".to_string() }

impl EngineConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingKind {
    Sum,
    #[default]
    SumWithOverride,
}

/// One configured stage. `args` is passed to the stage factory untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub base_url: String,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_index()        -> String { "identities".to_string() }
fn default_timeout_secs() -> u64    { 10 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String { "concord=info,warn".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_log_filter() }
    }
}


impl ConcordConfig {
    /// Load configuration from concord.toml.
    /// Checks CONCORD_CONFIG env var first, then current directory.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConcordError::Config(format!(
                "Config file not found: {}\n\
                 Copy concord.example.toml to concord.toml and edit it.",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConcordError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ConcordConfig = toml::from_str(content)
            .map_err(|e| ConcordError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if engine.num_results == 0 {
            return Err(ConcordError::Config("engine.num_results must be at least 1".into()));
        }
        if engine.stage_timeout_ms == 0 {
            return Err(ConcordError::Config("engine.stage_timeout_ms must be non-zero".into()));
        }
        if engine.stages.is_empty() {
            return Err(ConcordError::Config("engine.stages must name at least one stage".into()));
        }
        if let Some(i) = engine.stages.iter().position(|s| s.name.trim().is_empty()) {
            return Err(ConcordError::Config(format!("engine.stages[{i}] has an empty name")));
        }
        if engine.exact_link_key.trim().is_empty() {
            return Err(ConcordError::Config("engine.exact_link_key must not be empty".into()));
        }
        if let Some(search) = &self.search {
            if search.base_url.trim().is_empty() || search.index.trim().is_empty() {
                return Err(ConcordError::Config("search.base_url and search.index are required".into()));
            }
            if search.timeout_secs == 0 {
                return Err(ConcordError::Config("search.timeout_secs must be non-zero".into()));
            }
        }
        if let Some(store) = &self.store {
            if store.base_url.trim().is_empty() {
                return Err(ConcordError::Config("store.base_url is required".into()));
            }
            if store.timeout_secs == 0 {
                return Err(ConcordError::Config("store.timeout_secs must be non-zero".into()));
            }
        }
        Ok(())
    }
}
