//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (e.g. a `--config <path>` CLI flag)
//! 2. `~/.cubecache/config.toml` (user)
//! 3. `/etc/cubecache/config.toml` (system)
//!
//! The result limit can be overridden per process with the
//! `CUBECACHE_RESULT_LIMIT` environment variable.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::executor::DEFAULT_QUEUE_CAPACITY;
use crate::smart::{SoftConfig, StrategyKind};
use crate::{CubeError, Result};

/// Environment variable overriding `limits.result_limit`.
pub const RESULT_LIMIT_ENV: &str = "CUBECACHE_RESULT_LIMIT";

/// Engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Cache pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Total cost above which unpinning triggers eviction (default: 64 MiB).
    #[serde(default = "default_max_cost")]
    pub max_cost: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_cost: default_max_cost(),
        }
    }
}

fn default_max_cost() -> u64 {
    64 * 1024 * 1024
}

/// Resource limits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitsConfig {
    /// Maximum tuples in a materialized result; 0 or negative disables the
    /// check (default: 0).
    #[serde(default)]
    pub result_limit: i64,
}

/// Backing strategy names accepted in `[cache] strategy`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyName {
    #[default]
    Strong,
    Soft,
}

/// Smart cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub strategy: StrategyName,
    /// Soft strategy only: maximum resident entries (default: 10,000).
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    /// Soft strategy only: idle seconds before an entry is reclaimed.
    #[serde(default)]
    pub time_to_idle_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyName::default(),
            max_entries: default_max_entries(),
            time_to_idle_secs: None,
        }
    }
}

fn default_max_entries() -> u64 {
    SoftConfig::default().max_entries
}

impl CacheConfig {
    /// The strategy these settings describe.
    pub fn strategy_kind(&self) -> StrategyKind {
        match self.strategy {
            StrategyName::Strong => StrategyKind::Strong,
            StrategyName::Soft => {
                let mut soft = SoftConfig::new().max_entries(self.max_entries);
                if let Some(secs) = self.time_to_idle_secs {
                    soft = soft.time_to_idle(Duration::from_secs(secs));
                }
                StrategyKind::Soft(soft)
            }
        }
    }
}

/// Caller-runs executor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Jobs queued before callers run them inline (default: 64).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl EngineConfig {
    /// Load configuration from the standard locations, then apply
    /// environment overrides.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.cubecache/config.toml`
    /// 3. `/etc/cubecache/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let mut config = Self::load_from_file(&path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but falls back to defaults (plus
    /// environment overrides) when no config file exists and none was
    /// requested explicitly.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        if explicit_path.is_some() {
            return Self::load(explicit_path);
        }
        match Self::resolve_config_path(None) {
            Ok(_) => Self::load(None),
            Err(_) => {
                let mut config = Self::default();
                config.apply_env_overrides(|name| std::env::var(name).ok())?;
                Ok(config)
            }
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CubeError::Configuration(format!("Failed to parse config: {e}")))
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CubeError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            CubeError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Apply overrides looked up through `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(raw) = lookup(RESULT_LIMIT_ENV) {
            self.limits.result_limit = raw.trim().parse().map_err(|e| {
                CubeError::Configuration(format!("Invalid {RESULT_LIMIT_ENV} value {raw:?}: {e}"))
            })?;
        }
        Ok(())
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(CubeError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".cubecache").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/cubecache/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(CubeError::Configuration(
            "No config file found. Create ~/.cubecache/config.toml or /etc/cubecache/config.toml"
                .to_string(),
        ))
    }
}
