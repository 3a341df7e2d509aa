//! Scheduler configuration.
//!
//! 優先順位: 環境変数 > TOML ファイル > デフォルト値

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ENV_WORKER_COUNT: &str = "SCRIBE_WORKER_COUNT";
pub const ENV_DISPATCH_INTERVAL_MS: &str = "SCRIBE_DISPATCH_INTERVAL_MS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of concurrent execution slots.
    pub worker_count: usize,

    /// Dispatch tick. The loop also wakes early on submit and on idle workers.
    pub dispatch_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            dispatch_interval_ms: 100,
        }
    }
}

impl SchedulerConfig {
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Load `path` if given (defaults otherwise), then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `SCRIBE_*` overrides from `lookup` (usually the process env).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup(ENV_WORKER_COUNT).filter(|v| !v.trim().is_empty()) {
            self.worker_count = v.trim().parse().map_err(|e| ConfigError::Invalid {
                key: ENV_WORKER_COUNT,
                message: format!("{e}"),
            })?;
        }
        if let Some(v) = lookup(ENV_DISPATCH_INTERVAL_MS).filter(|v| !v.trim().is_empty()) {
            self.dispatch_interval_ms = v.trim().parse().map_err(|e| ConfigError::Invalid {
                key: ENV_DISPATCH_INTERVAL_MS,
                message: format!("{e}"),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid {
                key: "worker_count",
                message: "must be at least 1".to_string(),
            });
        }
        if self.dispatch_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "dispatch_interval_ms",
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
